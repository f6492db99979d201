//! Firefly III CSV exports.
//!
//! The export is newest first, so rows are replayed in reverse. Source and
//! destination are referenced by account name and must exist.

use chrono::{DateTime, Utc};
use engine::{DepositCmd, ImportItem, TransferCmd, TxMeta, WithdrawalCmd};
use rust_decimal::Decimal;

use crate::{
    ImportError, Importer, ParseRequest, ParseResponse, ResultImport,
    util::{csv_reader, dedup_key, field, parse_amount, parse_optional_amount},
};

pub const SOURCE: &str = "firefly";

const JOURNAL_ID: usize = 2;
const TYPE: usize = 6;
const CURRENCY: usize = 7;
const AMOUNT: usize = 8;
const FOREIGN_CURRENCY: usize = 9;
const FOREIGN_AMOUNT: usize = 10;
const DESCRIPTION: usize = 12;
const DATE: usize = 13;
const SOURCE_NAME: usize = 14;
const DESTINATION_NAME: usize = 17;
const CATEGORY: usize = 21;
const TAGS: usize = 24;
const NOTES: usize = 25;

#[derive(Clone, Copy, Debug, Default)]
pub struct FireflyImporter;

impl FireflyImporter {
    fn meta(
        request: &ParseRequest<'_>,
        record: &csv::StringRecord,
        date: DateTime<Utc>,
        row: usize,
    ) -> ResultImport<TxMeta> {
        let mut meta = TxMeta::new(date)
            .title(field(record, DESCRIPTION, row)?)
            .notes(record.get(NOTES).unwrap_or_default())
            .extra("firefly_journal_id", field(record, JOURNAL_ID, row)?);
        if let Some(category) = record.get(CATEGORY).filter(|c| !c.is_empty()) {
            match request.categories.get(category) {
                Some(id) => meta = meta.category(*id),
                None => meta = meta.extra("firefly_category", category),
            }
        }
        for tag in record
            .get(TAGS)
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            match request.tags.get(tag) {
                Some(id) => meta = meta.tag(*id),
                None => tracing::debug!(row, tag, "firefly tag not found"),
            }
        }
        Ok(meta)
    }
}

impl Importer for FireflyImporter {
    fn source(&self) -> &'static str {
        SOURCE
    }

    fn parse(&self, request: &ParseRequest<'_>) -> ResultImport<ParseResponse> {
        let mut records = Vec::new();
        let mut reader = csv_reader(request.data);
        for (index, record) in reader.records().enumerate().skip(1) {
            let record = record?;
            if !record.iter().all(str::is_empty) {
                records.push((index + 1, record));
            }
        }
        records.reverse();

        let mut response = ParseResponse::default();
        for (row, record) in records {
            let kind = field(&record, TYPE, row)?;
            let currency = field(&record, CURRENCY, row)?.to_uppercase();
            let raw_amount = field(&record, AMOUNT, row)?;
            let amount = parse_amount(raw_amount, row)?.abs();
            if amount == Decimal::ZERO {
                return Err(ImportError::row(row, "amount must not be zero"));
            }
            let foreign_currency = record
                .get(FOREIGN_CURRENCY)
                .map(str::to_uppercase)
                .filter(|c| !c.is_empty());
            let foreign_amount = parse_optional_amount(
                record.get(FOREIGN_AMOUNT).unwrap_or_default(),
                row,
            )?
            .map(|a| a.abs());
            let raw_date = field(&record, DATE, row)?;
            let date = DateTime::parse_from_rfc3339(raw_date)
                .map_err(|err| ImportError::row(row, format!("invalid date \"{raw_date}\": {err}")))?
                .with_timezone(&Utc);
            let source = request
                .accounts
                .by_name(field(&record, SOURCE_NAME, row)?, row)?;
            let destination = request
                .accounts
                .by_name(field(&record, DESTINATION_NAME, row)?, row)?;
            let meta = Self::meta(request, &record, date, row)?;

            let create = match kind {
                "Withdrawal" => {
                    let mut cmd = WithdrawalCmd::new(source.id, -amount, currency.as_str(), meta)
                        .destination(destination.id);
                    if let (Some(fx_amount), Some(fx_currency)) = (foreign_amount, &foreign_currency) {
                        cmd = cmd.fx(-fx_amount, fx_currency.as_str());
                    }
                    cmd.into()
                }
                "Deposit" | "Opening balance" => {
                    DepositCmd::new(destination.id, amount, currency.as_str(), meta)
                        .source(source.id)
                        .into()
                }
                "Transfer" => {
                    let (received, received_currency) = match (foreign_amount, &foreign_currency) {
                        (Some(fx_amount), Some(fx_currency)) => (fx_amount, fx_currency.as_str()),
                        _ => (amount, currency.as_str()),
                    };
                    TransferCmd::new(
                        (source.id, -amount, currency.as_str()),
                        (destination.id, received, received_currency),
                        meta,
                    )
                    .into()
                }
                other => {
                    return Err(ImportError::row(
                        row,
                        format!("unsupported transaction type \"{other}\""),
                    ));
                }
            };
            response.items.push(ImportItem {
                request: create,
                dedup_keys: vec![dedup_key(&[
                    field(&record, JOURNAL_ID, row)?,
                    raw_date,
                    raw_amount,
                ])],
            });
        }
        tracing::debug!(rows = response.items.len(), "firefly export parsed");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use engine::{Account, AccountType, CreateTransactionRequest};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::AccountMap;

    const HEADER: &str = "user_id,group_id,journal_id,created_at,updated_at,group_title,type,currency_code,amount,foreign_currency_code,foreign_amount,primary_currency_code,description,date,source_name,source_iban,source_type,destination_name,destination_iban,destination_type,reconciled,category,budget,bill,tags,notes\n";

    fn accounts() -> AccountMap {
        let list = [
            (1, "Checking", "EUR", AccountType::Asset),
            (2, "Savings", "USD", AccountType::Asset),
            (3, "Groceries", "EUR", AccountType::ExpenseCategory),
            (4, "Employer", "EUR", AccountType::IncomeCategory),
        ]
        .map(|(id, name, currency, kind)| {
            let mut account = Account::new(name, currency, kind);
            account.id = id;
            account
        });
        AccountMap::new(list).unwrap()
    }

    fn parse(body: &str) -> ResultImport<ParseResponse> {
        let data = format!("{HEADER}{body}");
        let accounts = accounts();
        let tags = HashMap::from([("food".to_string(), 11)]);
        let categories = HashMap::from([("Household".to_string(), 5)]);
        FireflyImporter.parse(&ParseRequest {
            data: data.as_bytes(),
            accounts: &accounts,
            tags: &tags,
            categories: &categories,
        })
    }

    #[test]
    fn rows_are_replayed_oldest_first() {
        let response = parse(concat!(
            "1,2,2,,,,Deposit,EUR,1500.00,,,EUR,Salary,2024-03-02T09:00:00+01:00,Employer,,Revenue account,Checking,,Asset account,false,,,,,\n",
            "1,1,1,,,,Withdrawal,EUR,-12.40,,,EUR,Bread,2024-03-01T18:00:00+01:00,Checking,,Asset account,Groceries,,Expense account,false,Household,,,\"food,weekly\",\n",
        ))
        .unwrap();
        assert_eq!(response.items.len(), 2);
        let CreateTransactionRequest::Withdrawal(cmd) = &response.items[0].request else {
            panic!("expected withdrawal first");
        };
        assert_eq!(cmd.source_amount, dec!(-12.40));
        assert_eq!(cmd.destination_account_id, Some(3));
        assert_eq!(cmd.meta.category_id, Some(5));
        assert!(cmd.meta.tag_ids.contains(&11));
        assert_eq!(
            cmd.meta.transaction_date.map(|d| d.to_rfc3339()),
            Some("2024-03-01T17:00:00+00:00".to_string())
        );
        assert!(matches!(
            response.items[1].request,
            CreateTransactionRequest::Deposit(_)
        ));
    }

    #[test]
    fn foreign_transfer_uses_foreign_amount() {
        let response = parse(
            "1,3,3,,,,Transfer,EUR,-100.00,USD,108.50,EUR,Move,2024-03-03T10:00:00+00:00,Checking,,Asset account,Savings,,Asset account,false,,,,,\n",
        )
        .unwrap();
        let CreateTransactionRequest::Transfer(cmd) = &response.items[0].request else {
            panic!("expected transfer");
        };
        assert_eq!(cmd.source_amount, dec!(-100.00));
        assert_eq!(cmd.destination_amount, dec!(108.50));
        assert_eq!(cmd.destination_currency, "USD");
    }

    #[test]
    fn unknown_account_fails_the_parse() {
        let err = parse(
            "1,4,4,,,,Withdrawal,EUR,-3.00,,,EUR,Tea,2024-03-04T10:00:00+00:00,Wallet,,Asset account,Groceries,,Expense account,false,,,,,\n",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "row 2: no account named \"Wallet\"");
    }
}

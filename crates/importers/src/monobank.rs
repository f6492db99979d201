//! Monobank CSV statements.
//!
//! Columns: date (`DD.MM.YYYY HH:MM:SS`), description, MCC, card amount
//! (signed, UAH), operation amount, operation currency, rate, and the
//! balance after the operation as the last column. Only spending is
//! supported. The card is the account carrying the `monobank_UAH`
//! identifier. The destination is the account carrying `expense_<CCY>` for
//! the operation currency, or the default expense account when none does.

use chrono::NaiveDateTime;
use engine::{ImportItem, TxMeta, WithdrawalCmd};
use rust_decimal::Decimal;

use crate::{
    ImportError, Importer, ParseRequest, ParseResponse, ResultImport,
    util::{csv_reader, dedup_key, field, parse_amount},
};

pub const SOURCE: &str = "monobank";
pub const CARD_IDENTIFIER: &str = "monobank_UAH";
const CARD_CURRENCY: &str = "UAH";
const DESTINATION_PREFIX: &str = "expense_";
const DATE_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

#[derive(Clone, Copy, Debug, Default)]
pub struct MonobankImporter;

impl Importer for MonobankImporter {
    fn source(&self) -> &'static str {
        SOURCE
    }

    fn parse(&self, request: &ParseRequest<'_>) -> ResultImport<ParseResponse> {
        let mut response = ParseResponse::default();
        let mut reader = csv_reader(request.data);
        for (index, record) in reader.records().enumerate().skip(1) {
            let record = record?;
            let row = index + 1;
            if record.iter().all(str::is_empty) {
                continue;
            }

            let raw_date = field(&record, 0, row)?;
            let date = NaiveDateTime::parse_from_str(raw_date, DATE_FORMAT)
                .map_err(|err| ImportError::row(row, format!("invalid date \"{raw_date}\": {err}")))?
                .and_utc();
            let description = field(&record, 1, row)?;
            let mcc = field(&record, 2, row)?;
            let raw_card_amount = field(&record, 3, row)?;
            let card_amount = parse_amount(raw_card_amount, row)?;
            if card_amount > Decimal::ZERO {
                return Err(ImportError::row(row, "income not supported"));
            }
            if card_amount.is_zero() {
                continue;
            }
            let operation_amount = parse_amount(field(&record, 4, row)?, row)?;
            let operation_currency = field(&record, 5, row)?.to_uppercase();
            let balance = record.get(record.len().saturating_sub(1)).unwrap_or_default();

            let card = request.accounts.require(CARD_IDENTIFIER, row)?;
            let mut meta = TxMeta::new(date).title(description);
            if !mcc.is_empty() {
                meta = meta.extra("mcc", mcc);
            }
            let mut cmd = WithdrawalCmd::new(card.id, card_amount, CARD_CURRENCY, meta);
            if !operation_currency.is_empty() && operation_currency != CARD_CURRENCY {
                cmd = cmd.fx(-operation_amount.abs(), operation_currency.as_str());
            }
            let spent_in = if operation_currency.is_empty() {
                CARD_CURRENCY
            } else {
                operation_currency.as_str()
            };
            if let Some(destination) = request
                .accounts
                .get(&format!("{DESTINATION_PREFIX}{spent_in}"))
            {
                cmd = cmd.destination(destination.id);
            }

            response.items.push(ImportItem {
                request: cmd.into(),
                dedup_keys: vec![dedup_key(&[
                    raw_date,
                    description,
                    raw_card_amount,
                    balance,
                ])],
            });
        }
        tracing::debug!(rows = response.items.len(), "monobank statement parsed");
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

    const HEADER: &str = "Дата i час операції,Деталі операції,MCC,Сума в валюті картки (UAH),Сума в валюті операції,Валюта,Курс,Сума комісій (UAH),Сума кешбеку (UAH),Залишок після операції\n";

    fn card() -> Account {
        let mut card = Account::new("Mono", "UAH", AccountType::Asset).account_number(CARD_IDENTIFIER);
        card.id = 7;
        card
    }

    fn parse(body: &str) -> ResultImport<ParseResponse> {
        parse_with(body, AccountMap::new([card()]).unwrap())
    }

    fn parse_with(body: &str, accounts: AccountMap) -> ResultImport<ParseResponse> {
        let data = format!("{HEADER}{body}");
        let empty = HashMap::new();
        MonobankImporter.parse(&ParseRequest {
            data: data.as_bytes(),
            accounts: &accounts,
            tags: &empty,
            categories: &empty,
        })
    }

    #[test]
    fn local_spending_is_a_plain_withdrawal() {
        let response =
            parse("15.01.2024 12:30:00,Сільпо,5411,-245.60,-245.60,UAH,—,0.00,0.00,10254.40\n")
                .unwrap();
        assert_eq!(response.items.len(), 1);
        let CreateTransactionRequest::Withdrawal(cmd) = &response.items[0].request else {
            panic!("expected withdrawal");
        };
        assert_eq!(cmd.source_account_id, 7);
        assert_eq!(cmd.source_amount, dec!(-245.60));
        assert_eq!(cmd.destination_account_id, None);
        assert_eq!(cmd.fx_source_currency, None);
        assert_eq!(cmd.meta.title, "Сільпо");
        assert_eq!(cmd.meta.extra.get("mcc").map(String::as_str), Some("5411"));
    }

    #[test]
    fn foreign_spending_carries_the_operation_amount() {
        let response =
            parse("16.01.2024 08:00:00,Netflix,4899,-420.50,-10.99,USD,38.26,0.00,0.00,9833.90\n")
                .unwrap();
        let CreateTransactionRequest::Withdrawal(cmd) = &response.items[0].request else {
            panic!("expected withdrawal");
        };
        assert_eq!(cmd.fx_source_amount, Some(dec!(-10.99)));
        assert_eq!(cmd.fx_source_currency.as_deref(), Some("USD"));
    }

    #[test]
    fn destination_follows_the_operation_currency() {
        let mut travel = Account::new("Travel USD", "USD", AccountType::ExpenseCategory)
            .account_number("expense_USD");
        travel.id = 9;
        let accounts = AccountMap::new([card(), travel]).unwrap();
        let body = "16.01.2024 08:00:00,Netflix,4899,-420.50,-10.99,USD,38.26,0.00,0.00,9833.90\n\
            16.01.2024 09:00:00,Сільпо,5411,-100.00,-100.00,UAH,—,0.00,0.00,9733.90\n";
        let response = parse_with(body, accounts).unwrap();

        let CreateTransactionRequest::Withdrawal(foreign) = &response.items[0].request else {
            panic!("expected withdrawal");
        };
        assert_eq!(foreign.destination_account_id, Some(9));
        assert_eq!(foreign.fx_source_currency.as_deref(), Some("USD"));

        let CreateTransactionRequest::Withdrawal(local) = &response.items[1].request else {
            panic!("expected withdrawal");
        };
        assert_eq!(local.destination_account_id, None);
    }

    #[test]
    fn income_is_rejected() {
        let err = parse("17.01.2024 09:00:00,Зарплата,4829,1000.00,1000.00,UAH,—,0.00,0.00,10833.90\n")
            .unwrap_err();
        assert_eq!(err.to_string(), "row 2: income not supported");
    }

    #[test]
    fn same_row_gives_the_same_key() {
        let row = "15.01.2024 12:30:00,Сільпо,5411,-245.60,-245.60,UAH,—,0.00,0.00,10254.40\n";
        let first = parse(row).unwrap();
        let second = parse(row).unwrap();
        assert_eq!(first.items[0].dedup_keys, second.items[0].dedup_keys);
    }
}

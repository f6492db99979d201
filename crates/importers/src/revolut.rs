//! Revolut CSV statements.
//!
//! Columns: type, product, started date, completed date, description,
//! amount, fee, currency, state, balance. Each currency pocket is the
//! account carrying the `revolut_<CCY>` identifier. The two halves of a
//! currency exchange are merged into one transfer.

use chrono::{DateTime, NaiveDateTime, Utc};
use engine::{ImportItem, TransferCmd, TxMeta, WithdrawalCmd};
use rust_decimal::Decimal;

use crate::{
    AccountMap, ImportError, Importer, ParseRequest, ParseResponse, ResultImport,
    util::{csv_reader, dedup_key, field, parse_amount, parse_optional_amount},
};

pub const SOURCE: &str = "revolut";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const EXCHANGE: &str = "EXCHANGE";

fn pocket(currency: &str) -> String {
    format!("revolut_{currency}")
}

#[derive(Clone, Debug)]
struct Row {
    row: usize,
    kind: String,
    started: DateTime<Utc>,
    description: String,
    /// Amount with the fee taken out.
    amount: Decimal,
    currency: String,
    key: String,
}

impl Row {
    fn is_exchange(&self) -> bool {
        self.kind == EXCHANGE
    }
}

fn read_rows(data: &[u8]) -> ResultImport<Vec<Row>> {
    let mut rows = Vec::new();
    let mut reader = csv_reader(data);
    for (index, record) in reader.records().enumerate().skip(1) {
        let record = record?;
        let row = index + 1;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let state = field(&record, 8, row)?;
        if !matches!(state, "COMPLETED" | "PENDING") {
            tracing::debug!(row, state, "revolut row skipped");
            continue;
        }

        let kind = field(&record, 0, row)?.to_string();
        let raw_started = field(&record, 2, row)?;
        let started = NaiveDateTime::parse_from_str(raw_started, DATE_FORMAT)
            .map_err(|err| ImportError::row(row, format!("invalid date \"{raw_started}\": {err}")))?
            .and_utc();
        let description = field(&record, 4, row)?.to_string();
        let raw_amount = field(&record, 5, row)?;
        let amount = parse_amount(raw_amount, row)?;
        let fee = parse_optional_amount(field(&record, 6, row)?, row)?.unwrap_or_default();
        let currency = field(&record, 7, row)?.to_uppercase();

        let key = dedup_key(&[
            kind.as_str(),
            raw_started,
            raw_amount,
            currency.as_str(),
            description.as_str(),
        ]);
        rows.push(Row {
            row,
            kind,
            started,
            description,
            amount: amount - fee.abs(),
            currency,
            key,
        });
    }
    Ok(rows)
}

fn withdrawal(row: &Row, accounts: &AccountMap) -> ResultImport<ImportItem> {
    if row.amount > Decimal::ZERO {
        return Err(ImportError::row(
            row.row,
            format!("{} income not supported", row.kind),
        ));
    }
    let account = accounts.require(&pocket(&row.currency), row.row)?;
    let meta = TxMeta::new(row.started)
        .title(row.description.as_str())
        .extra("revolut_type", row.kind.as_str());
    Ok(ImportItem {
        request: WithdrawalCmd::new(account.id, row.amount, row.currency.as_str(), meta).into(),
        dedup_keys: vec![row.key.clone()],
    })
}

fn exchange(out: &Row, incoming: &Row, accounts: &AccountMap) -> ResultImport<ImportItem> {
    let source = accounts.require(&pocket(&out.currency), out.row)?;
    let destination = accounts.require(&pocket(&incoming.currency), incoming.row)?;
    let meta = TxMeta::new(out.started.min(incoming.started))
        .title(out.description.as_str())
        .extra("revolut_type", EXCHANGE);
    Ok(ImportItem {
        request: TransferCmd::new(
            (source.id, out.amount, out.currency.as_str()),
            (destination.id, incoming.amount, incoming.currency.as_str()),
            meta,
        )
        .into(),
        dedup_keys: vec![out.key.clone(), incoming.key.clone()],
    })
}

/// Index of the unused exchange half that completes `rows[at]`: same start
/// time, opposite sign.
fn counterpart(rows: &[Row], used: &[bool], at: usize) -> Option<usize> {
    let half = &rows[at];
    rows.iter().enumerate().position(|(index, other)| {
        index != at
            && !used[index]
            && other.is_exchange()
            && other.started == half.started
            && other.amount.is_sign_negative() != half.amount.is_sign_negative()
    })
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RevolutImporter;

impl Importer for RevolutImporter {
    fn source(&self) -> &'static str {
        SOURCE
    }

    fn parse(&self, request: &ParseRequest<'_>) -> ResultImport<ParseResponse> {
        let rows = read_rows(request.data)?;
        let mut used = vec![false; rows.len()];
        let mut response = ParseResponse::default();

        for at in 0..rows.len() {
            if used[at] {
                continue;
            }
            used[at] = true;
            let row = &rows[at];
            if row.amount.is_zero() {
                continue;
            }
            if !row.is_exchange() {
                response.items.push(withdrawal(row, request.accounts)?);
                continue;
            }

            let other = counterpart(&rows, &used, at).ok_or_else(|| {
                ImportError::row(row.row, "exchange without its counterpart")
            })?;
            used[other] = true;
            let (out, incoming) = if row.amount.is_sign_negative() {
                (row, &rows[other])
            } else {
                (&rows[other], row)
            };
            response.items.push(exchange(out, incoming, request.accounts)?);
            response.merged += 1;
        }
        tracing::debug!(
            rows = response.items.len(),
            merged = response.merged,
            "revolut statement parsed"
        );
        Ok(response)
    }
}

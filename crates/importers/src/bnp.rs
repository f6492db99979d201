//! BNP Paribas Polska XLSX statements.
//!
//! Two layouts exist. The newer one has sender and recipient columns and is
//! recognised by `Nadawca` in the sixth header cell:
//!
//! | layout | date | amount | currency | own account | description | type | counterparty |
//! |--------|------|--------|----------|-------------|-------------|------|--------------|
//! | v1     | 0    | 2      | 3        | 5           | 4           | 6    | none         |
//! | v2     | 0    | 2      | 3        | 4           | 7           | 8    | 5 / 6        |
//!
//! Both halves of a move between two own accounts appear in the same
//! statement; they are merged into one transfer.

use std::io::Cursor;

use calamine::{Data, DataType, Reader, Xlsx};
use chrono::{DateTime, NaiveDate, Utc};
use engine::{CreateTransactionRequest, DepositCmd, ImportItem, TransferCmd, TxMeta, WithdrawalCmd};
use rust_decimal::Decimal;

use crate::{
    AccountMap, ImportError, Importer, ParseRequest, ParseResponse, ResultImport,
    util::{KeyCounter, dedup_key, parse_amount},
};

pub const SOURCE: &str = "bnp";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Layout {
    V1,
    V2,
}

impl Layout {
    fn detect(header: &[Data]) -> Self {
        match header.get(5) {
            Some(cell) if cell.to_string().contains("Nadawca") => Self::V2,
            _ => Self::V1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Expense,
    Income,
    RemoteTransfer,
    CardRepayment,
}

impl Kind {
    fn from_label(label: &str, row: usize) -> ResultImport<Self> {
        match label.trim() {
            "Transakcja kartą" | "Transakcja BLIK" | "Płatność BLIK" | "Prowizje i opłaty"
            | "Opłata" | "Wypłata z bankomatu" | "Płatność kartą" => Ok(Self::Expense),
            "Przelew przychodzący" | "Przelew przychodzący natychmiastowy" | "Wpłata"
            | "Zwrot" => Ok(Self::Income),
            "Przelew wychodzący" | "Przelew na telefon" | "Przelew natychmiastowy"
            | "Zlecenie stałe" | "Przelew własny" => Ok(Self::RemoteTransfer),
            "Spłata karty" => Ok(Self::CardRepayment),
            other => Err(ImportError::row(
                row,
                format!("unknown transaction type \"{other}\""),
            )),
        }
    }
}

/// One statement row in either layout.
#[derive(Clone, Debug)]
struct Entry {
    row: usize,
    date: NaiveDate,
    amount: Decimal,
    currency: String,
    account: String,
    counterparty: String,
    description: String,
    kind: Kind,
    key: String,
}

impl Entry {
    fn at(&self) -> DateTime<Utc> {
        self.date.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    fn meta(&self) -> TxMeta {
        let meta = TxMeta::new(self.at()).title(self.description.as_str());
        if self.counterparty.is_empty() {
            meta
        } else {
            meta.extra("counterparty", self.counterparty.as_str())
        }
    }
}

fn text(row: &[Data], index: usize) -> String {
    row.get(index)
        .map(|cell| cell.to_string().trim().to_string())
        .unwrap_or_default()
}

fn date(cell: Option<&Data>, row: usize) -> ResultImport<NaiveDate> {
    let cell = cell.ok_or_else(|| ImportError::row(row, "missing date"))?;
    if let Some(at) = cell.as_datetime() {
        return Ok(at.date());
    }
    let raw = cell.to_string();
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d.%m.%Y"))
        .map_err(|err| ImportError::row(row, format!("invalid date \"{raw}\": {err}")))
}

fn amount(cell: Option<&Data>, row: usize) -> ResultImport<Decimal> {
    match cell {
        Some(Data::Float(value)) => Decimal::try_from(*value)
            .map(|d| d.round_dp(2))
            .map_err(|err| ImportError::row(row, format!("invalid amount {value}: {err}"))),
        Some(Data::Int(value)) => Ok(Decimal::from(*value)),
        Some(Data::String(raw)) => parse_amount(raw, row),
        _ => Err(ImportError::row(row, "missing amount")),
    }
}

fn read_entry(layout: Layout, cells: &[Data], row: usize) -> ResultImport<Entry> {
    let (account, description, label) = match layout {
        Layout::V1 => (text(cells, 5), text(cells, 4), text(cells, 6)),
        Layout::V2 => (text(cells, 4), text(cells, 7), text(cells, 8)),
    };
    let date = date(cells.first(), row)?;
    let amount = amount(cells.get(2), row)?;
    let currency = text(cells, 3).to_uppercase();
    let mut kind = Kind::from_label(&label, row)?;
    if kind == Kind::Expense && amount > Decimal::ZERO {
        kind = Kind::Income;
    }
    let incoming = kind == Kind::Income;
    if incoming != (amount > Decimal::ZERO) {
        return Err(ImportError::row(
            row,
            format!("amount {amount} does not fit \"{label}\""),
        ));
    }
    let counterparty = match (layout, incoming) {
        (Layout::V1, _) => String::new(),
        (Layout::V2, true) => text(cells, 5),
        (Layout::V2, false) => text(cells, 6),
    };
    let key = dedup_key(&[
        date.to_string().as_str(),
        account.as_str(),
        amount.to_string().as_str(),
        currency.as_str(),
        description.as_str(),
    ]);
    Ok(Entry {
        row,
        date,
        amount,
        currency,
        account,
        counterparty,
        description,
        kind,
        key,
    })
}

fn read_entries<'a>(mut rows: impl Iterator<Item = &'a [Data]>) -> ResultImport<Vec<Entry>> {
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let layout = Layout::detect(header);
    tracing::debug!(?layout, "bnp layout detected");
    let mut entries = Vec::new();
    let mut keys = KeyCounter::default();
    for (index, cells) in rows.enumerate() {
        if cells.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }
        let mut entry = read_entry(layout, cells, index + 2)?;
        entry.key = keys.unique(std::mem::take(&mut entry.key));
        entries.push(entry);
    }
    Ok(entries)
}

/// An outgoing entry and the incoming one on another own account that
/// completes it.
fn is_pair(out: &Entry, incoming: &Entry) -> bool {
    let same_value = out.currency != incoming.currency || out.amount.abs() == incoming.amount;
    let matched = match out.kind {
        Kind::RemoteTransfer => out.description == incoming.description,
        Kind::CardRepayment => true,
        Kind::Expense | Kind::Income => false,
    };
    incoming.kind == Kind::Income
        && out.date == incoming.date
        && out.account != incoming.account
        && same_value
        && matched
}

fn transfer(out: &Entry, incoming: &Entry, accounts: &AccountMap) -> ResultImport<ImportItem> {
    let source = accounts.require(&out.account, out.row)?;
    let destination = accounts.require(&incoming.account, incoming.row)?;
    Ok(ImportItem {
        request: TransferCmd::new(
            (source.id, out.amount, out.currency.as_str()),
            (destination.id, incoming.amount, incoming.currency.as_str()),
            out.meta(),
        )
        .into(),
        dedup_keys: vec![out.key.clone(), incoming.key.clone()],
    })
}

fn single(entry: &Entry, accounts: &AccountMap) -> ResultImport<ImportItem> {
    let own = accounts.require(&entry.account, entry.row)?;
    let request: CreateTransactionRequest = match entry.kind {
        Kind::Income => {
            DepositCmd::new(own.id, entry.amount, entry.currency.as_str(), entry.meta()).into()
        }
        Kind::CardRepayment => match accounts.get(&entry.counterparty) {
            Some(card) => TransferCmd::new(
                (own.id, entry.amount, entry.currency.as_str()),
                (card.id, -entry.amount, entry.currency.as_str()),
                entry.meta(),
            )
            .into(),
            None => {
                WithdrawalCmd::new(own.id, entry.amount, entry.currency.as_str(), entry.meta())
                    .into()
            }
        },
        Kind::Expense | Kind::RemoteTransfer => {
            WithdrawalCmd::new(own.id, entry.amount, entry.currency.as_str(), entry.meta()).into()
        }
    };
    Ok(ImportItem {
        request,
        dedup_keys: vec![entry.key.clone()],
    })
}

fn build(entries: &[Entry], accounts: &AccountMap) -> ResultImport<ParseResponse> {
    let mut used = vec![false; entries.len()];
    let mut response = ParseResponse::default();

    // Card repayments first so a plain transfer cannot take their counterpart.
    for kind in [Kind::CardRepayment, Kind::RemoteTransfer] {
        for at in 0..entries.len() {
            if used[at] || entries[at].kind != kind {
                continue;
            }
            let out = &entries[at];
            let found = entries
                .iter()
                .enumerate()
                .position(|(index, other)| !used[index] && index != at && is_pair(out, other));
            if let Some(index) = found {
                used[at] = true;
                used[index] = true;
                response.items.push(transfer(out, &entries[index], accounts)?);
                response.merged += 1;
            }
        }
    }
    for (at, entry) in entries.iter().enumerate() {
        if !used[at] {
            response.items.push(single(entry, accounts)?);
        }
    }
    Ok(response)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BnpImporter;

impl Importer for BnpImporter {
    fn source(&self) -> &'static str {
        SOURCE
    }

    fn parse(&self, request: &ParseRequest<'_>) -> ResultImport<ParseResponse> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(request.data))?;
        let sheet = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ImportError::row(0, "workbook has no sheets"))??;
        let entries = read_entries(sheet.rows())?;
        let response = build(&entries, request.accounts)?;
        tracing::debug!(
            rows = response.items.len(),
            merged = response.merged,
            "bnp statement parsed"
        );
        Ok(response)
    }
}

//! Command structs for engine operations.
//!
//! A [`CreateTransactionRequest`] is what callers (HTTP handlers, importers,
//! scheduled rules) hand to the orchestrator. Amounts follow the ledger sign
//! convention: the source side is negative, the destination side positive.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Common metadata for transaction creation.
///
/// `transaction_date` is optional only so that a missing date can be
/// reported; the orchestrator rejects requests without it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TxMeta {
    pub transaction_date: Option<DateTime<Utc>>,
    pub title: String,
    pub notes: String,
    pub extra: BTreeMap<String, String>,
    pub tag_ids: BTreeSet<i32>,
    pub category_id: Option<i32>,
    pub reference_number: Option<String>,
    pub internal_reference_number: Option<String>,
}

impl TxMeta {
    #[must_use]
    pub fn new(transaction_date: DateTime<Utc>) -> Self {
        Self {
            transaction_date: Some(transaction_date),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag_id: i32) -> Self {
        self.tag_ids.insert(tag_id);
        self
    }

    #[must_use]
    pub fn category(mut self, category_id: i32) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn reference_number(mut self, value: impl Into<String>) -> Self {
        self.reference_number = Some(value.into());
        self
    }

    #[must_use]
    pub fn internal_reference_number(mut self, value: impl Into<String>) -> Self {
        self.internal_reference_number = Some(value.into());
        self
    }
}

/// Money coming in. Without a source the default income account is used.
#[derive(Clone, Debug, PartialEq)]
pub struct DepositCmd {
    pub destination_account_id: i32,
    pub destination_amount: Decimal,
    pub destination_currency: String,
    pub source_account_id: Option<i32>,
    pub source_amount: Option<Decimal>,
    pub source_currency: Option<String>,
    pub meta: TxMeta,
}

impl DepositCmd {
    #[must_use]
    pub fn new(
        destination_account_id: i32,
        destination_amount: Decimal,
        destination_currency: impl Into<String>,
        meta: TxMeta,
    ) -> Self {
        Self {
            destination_account_id,
            destination_amount,
            destination_currency: destination_currency.into(),
            source_account_id: None,
            source_amount: None,
            source_currency: None,
            meta,
        }
    }

    #[must_use]
    pub fn source(mut self, account_id: i32) -> Self {
        self.source_account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn source_amount(mut self, amount: Decimal, currency: impl Into<String>) -> Self {
        self.source_amount = Some(amount);
        self.source_currency = Some(currency.into());
        self
    }
}

/// Money going out. Without a destination the default expense account is used.
#[derive(Clone, Debug, PartialEq)]
pub struct WithdrawalCmd {
    pub source_account_id: i32,
    pub source_amount: Decimal,
    pub source_currency: String,
    pub destination_account_id: Option<i32>,
    pub destination_amount: Option<Decimal>,
    pub destination_currency: Option<String>,
    pub fx_source_amount: Option<Decimal>,
    pub fx_source_currency: Option<String>,
    pub meta: TxMeta,
}

impl WithdrawalCmd {
    #[must_use]
    pub fn new(
        source_account_id: i32,
        source_amount: Decimal,
        source_currency: impl Into<String>,
        meta: TxMeta,
    ) -> Self {
        Self {
            source_account_id,
            source_amount,
            source_currency: source_currency.into(),
            destination_account_id: None,
            destination_amount: None,
            destination_currency: None,
            fx_source_amount: None,
            fx_source_currency: None,
            meta,
        }
    }

    #[must_use]
    pub fn destination(mut self, account_id: i32) -> Self {
        self.destination_account_id = Some(account_id);
        self
    }

    #[must_use]
    pub fn destination_amount(mut self, amount: Decimal, currency: impl Into<String>) -> Self {
        self.destination_amount = Some(amount);
        self.destination_currency = Some(currency.into());
        self
    }

    /// Amount actually charged in the operation currency.
    #[must_use]
    pub fn fx(mut self, amount: Decimal, currency: impl Into<String>) -> Self {
        self.fx_source_amount = Some(amount);
        self.fx_source_currency = Some(currency.into());
        self
    }
}

/// Money moving between two of the user's own accounts.
#[derive(Clone, Debug, PartialEq)]
pub struct TransferCmd {
    pub source_account_id: i32,
    pub source_amount: Decimal,
    pub source_currency: String,
    pub destination_account_id: i32,
    pub destination_amount: Decimal,
    pub destination_currency: String,
    pub meta: TxMeta,
}

impl TransferCmd {
    #[must_use]
    pub fn new(
        source: (i32, Decimal, &str),
        destination: (i32, Decimal, &str),
        meta: TxMeta,
    ) -> Self {
        Self {
            source_account_id: source.0,
            source_amount: source.1,
            source_currency: source.2.to_string(),
            destination_account_id: destination.0,
            destination_amount: destination.1,
            destination_currency: destination.2.to_string(),
            meta,
        }
    }
}

/// Balance correction of one account against the default adjustment account.
#[derive(Clone, Debug, PartialEq)]
pub struct AdjustmentCmd {
    pub destination_account_id: i32,
    pub destination_amount: Decimal,
    pub destination_currency: String,
    pub meta: TxMeta,
}

impl AdjustmentCmd {
    #[must_use]
    pub fn new(
        destination_account_id: i32,
        destination_amount: Decimal,
        destination_currency: impl Into<String>,
        meta: TxMeta,
    ) -> Self {
        Self {
            destination_account_id,
            destination_amount,
            destination_currency: destination_currency.into(),
            meta,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CreateTransactionRequest {
    Deposit(DepositCmd),
    Withdrawal(WithdrawalCmd),
    Transfer(TransferCmd),
    Adjustment(AdjustmentCmd),
}

impl CreateTransactionRequest {
    pub fn meta(&self) -> &TxMeta {
        match self {
            Self::Deposit(cmd) => &cmd.meta,
            Self::Withdrawal(cmd) => &cmd.meta,
            Self::Transfer(cmd) => &cmd.meta,
            Self::Adjustment(cmd) => &cmd.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut TxMeta {
        match self {
            Self::Deposit(cmd) => &mut cmd.meta,
            Self::Withdrawal(cmd) => &mut cmd.meta,
            Self::Transfer(cmd) => &mut cmd.meta,
            Self::Adjustment(cmd) => &mut cmd.meta,
        }
    }
}

impl From<DepositCmd> for CreateTransactionRequest {
    fn from(value: DepositCmd) -> Self {
        Self::Deposit(value)
    }
}

impl From<WithdrawalCmd> for CreateTransactionRequest {
    fn from(value: WithdrawalCmd) -> Self {
        Self::Withdrawal(value)
    }
}

impl From<TransferCmd> for CreateTransactionRequest {
    fn from(value: TransferCmd) -> Self {
        Self::Transfer(value)
    }
}

impl From<AdjustmentCmd> for CreateTransactionRequest {
    fn from(value: AdjustmentCmd) -> Self {
        Self::Adjustment(value)
    }
}

/// Filter for listing transactions. Unset fields do not filter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransactionListFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub account_id: Option<i32>,
    pub transaction_type: Option<crate::TransactionType>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

//! Transaction primitives.
//!
//! A `Transaction` is a plain value: decimals, strings, sets of ids and
//! timestamps. Rule scripts work on clones of it, so copying must stay cheap
//! and must never share state with the original.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    TransferBetweenAccounts,
    #[default]
    Expense,
    Income,
    Adjustment,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TransferBetweenAccounts => "transfer_between_accounts",
            Self::Expense => "expense",
            Self::Income => "income",
            Self::Adjustment => "adjustment",
        }
    }
}

/// Name used in user facing messages, e.g. `TRANSACTION_TYPE_EXPENSE`.
impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "TRANSACTION_TYPE_{}", self.as_str().to_ascii_uppercase())
    }
}

impl TryFrom<&str> for TransactionType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "transfer_between_accounts" => Ok(Self::TransferBetweenAccounts),
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            "adjustment" => Ok(Self::Adjustment),
            other => Err(EngineError::InvalidFormat(format!(
                "invalid transaction type: {other}"
            ))),
        }
    }
}

/// A single business event.
///
/// `source_amount` is an outflow (zero or negative) and `destination_amount`
/// an inflow (zero or positive), each in the currency of its own side.
/// `id` is `0` until the row is persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub transaction_type: TransactionType,
    pub source_account_id: Option<i32>,
    pub destination_account_id: Option<i32>,
    pub source_currency: String,
    pub destination_currency: String,
    pub source_amount: Option<Decimal>,
    pub destination_amount: Option<Decimal>,
    pub fx_source_amount: Option<Decimal>,
    pub fx_source_currency: Option<String>,
    pub source_amount_in_base_currency: Option<Decimal>,
    pub destination_amount_in_base_currency: Option<Decimal>,
    pub transaction_date_time: DateTime<Utc>,
    pub transaction_date_only: NaiveDate,
    pub title: String,
    pub notes: String,
    pub extra: BTreeMap<String, String>,
    pub tag_ids: BTreeSet<i32>,
    pub category_id: Option<i32>,
    pub reference_number: Option<String>,
    pub internal_reference_number: Option<String>,
    pub flags: i64,
    pub voided_by_transaction_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Transaction {
    /// An empty transaction dated `at`, as handed to scheduled scripts.
    pub fn empty(at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            transaction_type: TransactionType::default(),
            source_account_id: None,
            destination_account_id: None,
            source_currency: String::new(),
            destination_currency: String::new(),
            source_amount: None,
            destination_amount: None,
            fx_source_amount: None,
            fx_source_currency: None,
            source_amount_in_base_currency: None,
            destination_amount_in_base_currency: None,
            transaction_date_time: at,
            transaction_date_only: at.date_naive(),
            title: String::new(),
            notes: String::new(),
            extra: BTreeMap::new(),
            tag_ids: BTreeSet::new(),
            category_id: None,
            reference_number: None,
            internal_reference_number: None,
            flags: 0,
            voided_by_transaction_id: None,
            created_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    /// Move the transaction to `at`, keeping the date column in sync.
    pub fn set_date_time(&mut self, at: DateTime<Utc>) {
        self.transaction_date_time = at;
        self.transaction_date_only = at.date_naive();
    }

    /// Accounts referenced by either side.
    pub fn account_ids(&self) -> impl Iterator<Item = i32> {
        self.source_account_id
            .into_iter()
            .chain(self.destination_account_id)
    }

    /// Signed balance changes per side, in each account's own currency.
    pub fn balance_deltas(&self) -> Vec<(i32, Decimal)> {
        let mut deltas = Vec::with_capacity(2);
        if let (Some(account_id), Some(amount)) = (self.source_account_id, self.source_amount) {
            deltas.push((account_id, amount));
        }
        if let (Some(account_id), Some(amount)) =
            (self.destination_account_id, self.destination_amount)
        {
            deltas.push((account_id, amount));
        }
        deltas
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub transaction_type: String,
    pub source_account_id: Option<i32>,
    pub destination_account_id: Option<i32>,
    pub source_currency: String,
    pub destination_currency: String,
    pub source_amount: Option<Decimal>,
    pub destination_amount: Option<Decimal>,
    pub fx_source_amount: Option<Decimal>,
    pub fx_source_currency: Option<String>,
    pub source_amount_in_base_currency: Option<Decimal>,
    pub destination_amount_in_base_currency: Option<Decimal>,
    pub transaction_date_time: DateTimeUtc,
    pub transaction_date_only: Date,
    pub title: String,
    pub notes: String,
    pub extra: String,
    pub tag_ids: String,
    pub category_id: Option<i32>,
    pub reference_number: Option<String>,
    pub internal_reference_number: Option<String>,
    pub flags: i64,
    pub voided_by_transaction_id: Option<i64>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::double_entries::Entity")]
    DoubleEntries,
}

impl Related<super::double_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DoubleEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<&Transaction> for ActiveModel {
    type Error = EngineError;

    fn try_from(value: &Transaction) -> ResultEngine<Self> {
        Ok(Self {
            id: if value.id == 0 {
                ActiveValue::NotSet
            } else {
                ActiveValue::Set(value.id)
            },
            transaction_type: ActiveValue::Set(value.transaction_type.as_str().to_string()),
            source_account_id: ActiveValue::Set(value.source_account_id),
            destination_account_id: ActiveValue::Set(value.destination_account_id),
            source_currency: ActiveValue::Set(value.source_currency.clone()),
            destination_currency: ActiveValue::Set(value.destination_currency.clone()),
            source_amount: ActiveValue::Set(value.source_amount),
            destination_amount: ActiveValue::Set(value.destination_amount),
            fx_source_amount: ActiveValue::Set(value.fx_source_amount),
            fx_source_currency: ActiveValue::Set(value.fx_source_currency.clone()),
            source_amount_in_base_currency: ActiveValue::Set(value.source_amount_in_base_currency),
            destination_amount_in_base_currency: ActiveValue::Set(
                value.destination_amount_in_base_currency,
            ),
            transaction_date_time: ActiveValue::Set(value.transaction_date_time),
            transaction_date_only: ActiveValue::Set(value.transaction_date_only),
            title: ActiveValue::Set(value.title.clone()),
            notes: ActiveValue::Set(value.notes.clone()),
            extra: ActiveValue::Set(serde_json::to_string(&value.extra)?),
            tag_ids: ActiveValue::Set(serde_json::to_string(&value.tag_ids)?),
            category_id: ActiveValue::Set(value.category_id),
            reference_number: ActiveValue::Set(value.reference_number.clone()),
            internal_reference_number: ActiveValue::Set(value.internal_reference_number.clone()),
            flags: ActiveValue::Set(value.flags),
            voided_by_transaction_id: ActiveValue::Set(value.voided_by_transaction_id),
            created_at: ActiveValue::Set(value.created_at),
            updated_at: ActiveValue::Set(value.updated_at),
            deleted_at: ActiveValue::Set(value.deleted_at),
        })
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(value: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: value.id,
            transaction_type: TransactionType::try_from(value.transaction_type.as_str())?,
            source_account_id: value.source_account_id,
            destination_account_id: value.destination_account_id,
            source_currency: value.source_currency,
            destination_currency: value.destination_currency,
            source_amount: value.source_amount,
            destination_amount: value.destination_amount,
            fx_source_amount: value.fx_source_amount,
            fx_source_currency: value.fx_source_currency,
            source_amount_in_base_currency: value.source_amount_in_base_currency,
            destination_amount_in_base_currency: value.destination_amount_in_base_currency,
            transaction_date_time: value.transaction_date_time,
            transaction_date_only: value.transaction_date_only,
            title: value.title,
            notes: value.notes,
            extra: serde_json::from_str(&value.extra)?,
            tag_ids: serde_json::from_str(&value.tag_ids)?,
            category_id: value.category_id,
            reference_number: value.reference_number,
            internal_reference_number: value.internal_reference_number,
            flags: value.flags,
            voided_by_transaction_id: value.voided_by_transaction_id,
            created_at: value.created_at,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        })
    }
}

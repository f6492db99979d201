//! The module contains `Account` and its persistence model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// Bit 0 of `Account::flags`: the default account for its type.
pub const FLAG_IS_DEFAULT: i64 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Asset,
    Liability,
    IncomeCategory,
    ExpenseCategory,
    Adjustment,
}

impl AccountType {
    pub const ALL: [AccountType; 5] = [
        AccountType::Asset,
        AccountType::Liability,
        AccountType::IncomeCategory,
        AccountType::ExpenseCategory,
        AccountType::Adjustment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asset => "asset",
            Self::Liability => "liability",
            Self::IncomeCategory => "income_category",
            Self::ExpenseCategory => "expense_category",
            Self::Adjustment => "adjustment",
        }
    }

    /// Debit-normal accounts grow on the debit side.
    pub fn is_debit_normal(self) -> bool {
        matches!(self, Self::Asset | Self::ExpenseCategory)
    }

    /// Assets and liabilities hold money; the others only classify flows.
    pub fn is_balance_sheet(self) -> bool {
        matches!(self, Self::Asset | Self::Liability)
    }
}

impl TryFrom<&str> for AccountType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "asset" => Ok(Self::Asset),
            "liability" => Ok(Self::Liability),
            "income_category" => Ok(Self::IncomeCategory),
            "expense_category" => Ok(Self::ExpenseCategory),
            "adjustment" => Ok(Self::Adjustment),
            other => Err(EngineError::InvalidFormat(format!(
                "invalid account type: {other}"
            ))),
        }
    }
}

/// A place money can sit in or flow through.
///
/// `current_balance` is kept in the account's own currency. `account_number`
/// may hold several comma separated identifiers (card numbers, IBANs, virtual
/// names) used by the importers to find the account.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i32,
    pub name: String,
    pub currency: String,
    pub account_type: AccountType,
    pub current_balance: Decimal,
    pub flags: i64,
    pub extra: BTreeMap<String, String>,
    pub note: String,
    pub iban: String,
    pub account_number: String,
    pub liability_percent: Option<Decimal>,
    pub display_order: Option<i32>,
    pub first_transaction_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(name: &str, currency: &str, account_type: AccountType) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            name: name.trim().to_string(),
            currency: crate::currency::normalize_code(currency),
            account_type,
            current_balance: Decimal::ZERO,
            flags: 0,
            extra: BTreeMap::new(),
            note: String::new(),
            iban: String::new(),
            account_number: String::new(),
            liability_percent: None,
            display_order: None,
            first_transaction_at: None,
            created_at: now,
            last_updated_at: now,
            deleted_at: None,
        }
    }

    #[must_use]
    pub fn default_for_type(mut self) -> Self {
        self.flags |= FLAG_IS_DEFAULT;
        self
    }

    #[must_use]
    pub fn account_number(mut self, value: &str) -> Self {
        self.account_number = value.to_string();
        self
    }

    pub fn is_default(&self) -> bool {
        self.flags & FLAG_IS_DEFAULT == FLAG_IS_DEFAULT
    }

    /// Individual identifiers stored in `account_number`.
    pub fn account_numbers(&self) -> impl Iterator<Item = &str> {
        self.account_number
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub currency: String,
    pub account_type: String,
    pub current_balance: Decimal,
    pub flags: i64,
    pub extra: String,
    pub note: String,
    pub iban: String,
    pub account_number: String,
    pub liability_percent: Option<Decimal>,
    pub display_order: Option<i32>,
    pub first_transaction_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub last_updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<&Account> for ActiveModel {
    type Error = EngineError;

    fn try_from(value: &Account) -> ResultEngine<Self> {
        Ok(Self {
            id: if value.id == 0 {
                ActiveValue::NotSet
            } else {
                ActiveValue::Set(value.id)
            },
            name: ActiveValue::Set(value.name.clone()),
            currency: ActiveValue::Set(value.currency.clone()),
            account_type: ActiveValue::Set(value.account_type.as_str().to_string()),
            current_balance: ActiveValue::Set(value.current_balance),
            flags: ActiveValue::Set(value.flags),
            extra: ActiveValue::Set(serde_json::to_string(&value.extra)?),
            note: ActiveValue::Set(value.note.clone()),
            iban: ActiveValue::Set(value.iban.clone()),
            account_number: ActiveValue::Set(value.account_number.clone()),
            liability_percent: ActiveValue::Set(value.liability_percent),
            display_order: ActiveValue::Set(value.display_order),
            first_transaction_at: ActiveValue::Set(value.first_transaction_at),
            created_at: ActiveValue::Set(value.created_at),
            last_updated_at: ActiveValue::Set(value.last_updated_at),
            deleted_at: ActiveValue::Set(value.deleted_at),
        })
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(value: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: value.id,
            name: value.name,
            currency: value.currency,
            account_type: AccountType::try_from(value.account_type.as_str())?,
            current_balance: value.current_balance,
            flags: value.flags,
            extra: serde_json::from_str(&value.extra)?,
            note: value.note,
            iban: value.iban,
            account_number: value.account_number,
            liability_percent: value.liability_percent,
            display_order: value.display_order,
            first_transaction_at: value.first_transaction_at,
            created_at: value.created_at,
            last_updated_at: value.last_updated_at,
            deleted_at: value.deleted_at,
        })
    }
}

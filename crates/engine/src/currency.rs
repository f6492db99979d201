use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ResultEngine};

/// A currency with its rate against the base currency.
///
/// `rate` is the number of units of this currency per one unit of the base
/// currency, so the base currency itself always has a rate of `1`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub id: String,
    pub rate: Decimal,
    pub is_active: bool,
    pub decimal_places: i32,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Currency {
    pub fn new(id: &str, rate: Decimal, decimal_places: i32) -> Self {
        Self {
            id: normalize_code(id),
            rate,
            is_active: true,
            decimal_places,
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }
}

/// Canonical ISO code: trimmed and upper case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// One row of the exchange-rate document consumed by the rate sync.
///
/// ```json
/// [ { "id": "USD", "rate": "1.00", "decimal_places": 2, "is_active": true } ]
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ExchangeRateRow {
    pub id: String,
    pub rate: Decimal,
    #[serde(default = "default_decimal_places")]
    pub decimal_places: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_decimal_places() -> i32 {
    2
}

fn default_active() -> bool {
    true
}

/// Converts amounts between currencies using a snapshot of the rate table.
#[derive(Clone, Debug, Default)]
pub struct CurrencyConverter {
    currencies: HashMap<String, Currency>,
}

impl CurrencyConverter {
    pub fn new(currencies: impl IntoIterator<Item = Currency>) -> Self {
        Self {
            currencies: currencies
                .into_iter()
                .filter(|c| c.deleted_at.is_none())
                .map(|c| (c.id.clone(), c))
                .collect(),
        }
    }

    pub fn get(&self, code: &str) -> ResultEngine<&Currency> {
        self.currencies
            .get(code)
            .ok_or_else(|| EngineError::NotFound(format!("currency {code}")))
    }

    pub fn decimal_places(&self, code: &str) -> ResultEngine<u32> {
        self.get(code)
            .map(|c| crate::money::places(c.decimal_places))
    }

    /// `amount * rate(to) / rate(from)` at full precision.
    pub fn convert(&self, from: &str, to: &str, amount: Decimal) -> ResultEngine<Decimal> {
        if from == to {
            return Ok(amount);
        }
        let rate_from = self.get(from)?.rate;
        let rate_to = self.get(to)?.rate;
        if rate_from.is_zero() || rate_to.is_zero() {
            return Err(EngineError::BusinessRule(format!(
                "zero exchange rate between {from} and {to}"
            )));
        }
        amount
            .checked_mul(rate_to)
            .and_then(|v| v.checked_div(rate_from))
            .ok_or_else(|| EngineError::InvalidFormat(format!("amount overflow: {amount}")))
    }

    /// Convert and round to the target currency.
    pub fn convert_rounded(&self, from: &str, to: &str, amount: Decimal) -> ResultEngine<Decimal> {
        let converted = self.convert(from, to, amount)?;
        Ok(crate::money::round_to(converted, self.decimal_places(to)?))
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "currencies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub rate: Decimal,
    pub is_active: bool,
    pub decimal_places: i32,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Currency> for ActiveModel {
    fn from(value: &Currency) -> Self {
        Self {
            id: ActiveValue::Set(value.id.clone()),
            rate: ActiveValue::Set(value.rate),
            is_active: ActiveValue::Set(value.is_active),
            decimal_places: ActiveValue::Set(value.decimal_places),
            updated_at: ActiveValue::Set(value.updated_at),
            deleted_at: ActiveValue::Set(value.deleted_at),
        }
    }
}

impl From<Model> for Currency {
    fn from(value: Model) -> Self {
        Self {
            id: value.id,
            rate: value.rate,
            is_active: value.is_active,
            decimal_places: value.decimal_places,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        }
    }
}

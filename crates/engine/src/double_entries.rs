//! Double-entry posting.
//!
//! Every transaction with both sides is posted as two legs in the base
//! currency: one debit, one credit, same amount.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveValue, entity::prelude::*};

use crate::{AccountType, EngineError, ResultEngine, Transaction, money::BALANCE_SCALE};

#[derive(Clone, Debug, PartialEq)]
pub struct DoubleEntry {
    pub transaction_id: i64,
    pub account_id: i32,
    pub is_debit: bool,
    pub amount_in_base_currency: Decimal,
    pub base_currency: String,
    pub created_at: DateTime<Utc>,
}

/// Build the two legs for `tx`.
///
/// `source_type` is the type of the source account; it decides whether the
/// source leg is a debit or a credit. The destination leg is the opposite.
pub fn post(
    tx: &Transaction,
    source_type: AccountType,
    base_currency: &str,
) -> ResultEngine<[DoubleEntry; 2]> {
    let source_account_id = tx
        .source_account_id
        .ok_or_else(|| EngineError::MissingField("source_account_id".to_string()))?;
    let destination_account_id = tx
        .destination_account_id
        .ok_or_else(|| EngineError::MissingField("destination_account_id".to_string()))?;
    let source_base = tx.source_amount_in_base_currency.ok_or_else(|| {
        EngineError::MissingField("source_amount_in_base_currency".to_string())
    })?;
    let destination_base = tx.destination_amount_in_base_currency.ok_or_else(|| {
        EngineError::MissingField("destination_amount_in_base_currency".to_string())
    })?;

    if source_base.abs().round_dp(BALANCE_SCALE) != destination_base.abs().round_dp(BALANCE_SCALE)
    {
        return Err(EngineError::InvariantViolation(format!(
            "transaction {}: base amounts are not balanced ({source_base} vs {destination_base})",
            tx.id
        )));
    }
    let opposite = (source_base.is_sign_negative() && destination_base.is_sign_positive())
        || (source_base.is_sign_positive() && destination_base.is_sign_negative());
    if !opposite || source_base.is_zero() {
        return Err(EngineError::InvariantViolation(format!(
            "transaction {}: base amounts must have opposite signs ({source_base} vs {destination_base})",
            tx.id
        )));
    }

    let source_is_debit = if source_type.is_debit_normal() {
        source_base.is_sign_positive()
    } else {
        source_base.is_sign_negative()
    };

    let amount = source_base.abs();
    let now = Utc::now();
    let leg = |account_id: i32, is_debit: bool| DoubleEntry {
        transaction_id: tx.id,
        account_id,
        is_debit,
        amount_in_base_currency: amount,
        base_currency: base_currency.to_string(),
        created_at: now,
    };

    Ok([
        leg(source_account_id, source_is_debit),
        leg(destination_account_id, !source_is_debit),
    ])
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "double_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub transaction_id: i64,
    pub account_id: i32,
    pub is_debit: bool,
    pub amount_in_base_currency: Decimal,
    pub base_currency: String,
    pub created_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Transaction,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&DoubleEntry> for ActiveModel {
    fn from(value: &DoubleEntry) -> Self {
        Self {
            id: ActiveValue::NotSet,
            transaction_id: ActiveValue::Set(value.transaction_id),
            account_id: ActiveValue::Set(value.account_id),
            is_debit: ActiveValue::Set(value.is_debit),
            amount_in_base_currency: ActiveValue::Set(value.amount_in_base_currency),
            base_currency: ActiveValue::Set(value.base_currency.clone()),
            created_at: ActiveValue::Set(value.created_at),
            deleted_at: ActiveValue::Set(None),
        }
    }
}

impl From<Model> for DoubleEntry {
    fn from(value: Model) -> Self {
        Self {
            transaction_id: value.transaction_id,
            account_id: value.account_id,
            is_debit: value.is_debit,
            amount_in_base_currency: value.amount_in_base_currency,
            base_currency: value.base_currency,
            created_at: value.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn posted(source: Decimal, destination: Decimal) -> Transaction {
        let mut tx = Transaction::empty(Utc::now());
        tx.id = 9;
        tx.source_account_id = Some(1);
        tx.destination_account_id = Some(2);
        tx.source_amount_in_base_currency = Some(source);
        tx.destination_amount_in_base_currency = Some(destination);
        tx
    }

    #[test]
    fn asset_outflow_is_a_credit() {
        let [source, destination] =
            post(&posted(dec!(-10), dec!(10)), AccountType::Asset, "USD").unwrap();
        assert!(!source.is_debit);
        assert!(destination.is_debit);
        assert_eq!(source.account_id, 1);
        assert_eq!(destination.account_id, 2);
        assert_eq!(source.amount_in_base_currency, dec!(10));
        assert_eq!(destination.amount_in_base_currency, dec!(10));
    }

    #[test]
    fn income_category_outflow_is_a_debit() {
        let [source, destination] =
            post(&posted(dec!(-25.5), dec!(25.5)), AccountType::IncomeCategory, "USD").unwrap();
        assert!(source.is_debit);
        assert!(!destination.is_debit);
    }

    #[test]
    fn adjustment_with_positive_source_is_a_credit() {
        let [source, destination] =
            post(&posted(dec!(5), dec!(-5)), AccountType::Adjustment, "USD").unwrap();
        assert!(!source.is_debit);
        assert!(destination.is_debit);
    }

    #[test]
    fn unbalanced_amounts_are_rejected() {
        let err = post(&posted(dec!(-10), dec!(10.01)), AccountType::Asset, "USD").unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
    }

    #[test]
    fn balance_check_ignores_digits_beyond_scale() {
        let source = dec!(-18.452048192771084337349397590);
        let destination = dec!(18.452048192771084337);
        assert!(post(&posted(source, destination), AccountType::Asset, "USD").is_ok());
    }

    #[test]
    fn same_sign_amounts_are_rejected() {
        let err = post(&posted(dec!(10), dec!(10)), AccountType::Asset, "USD").unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
    }

    #[test]
    fn missing_account_is_reported() {
        let mut tx = posted(dec!(-1), dec!(1));
        tx.destination_account_id = None;
        assert_eq!(
            post(&tx, AccountType::Asset, "USD").unwrap_err(),
            EngineError::MissingField("destination_account_id".to_string())
        );
    }
}

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};

use crate::{
    Currency, EngineError, ExchangeRateRow, ResultEngine, accounts, currency,
    currency::normalize_code,
};

use super::{Engine, load_converter, with_tx};

fn check_currency(currency: &Currency) -> ResultEngine<()> {
    if currency.id.is_empty() {
        return Err(EngineError::MissingField("currency code".to_string()));
    }
    if currency.rate.is_sign_negative() || currency.rate.is_zero() {
        return Err(EngineError::InvalidFormat(format!(
            "rate of {} must be positive",
            currency.id
        )));
    }
    if !(0..=18).contains(&currency.decimal_places) {
        return Err(EngineError::InvalidFormat(format!(
            "decimal places of {} must be within 0..=18",
            currency.id
        )));
    }
    Ok(())
}

impl Engine {
    /// Non-deleted currencies ordered by code.
    pub async fn list_currencies(&self) -> ResultEngine<Vec<Currency>> {
        Ok(currency::Entity::find()
            .filter(currency::Column::DeletedAt.is_null())
            .order_by_asc(currency::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Currency::from)
            .collect())
    }

    pub async fn currency(&self, code: &str) -> ResultEngine<Currency> {
        let code = normalize_code(code);
        currency::Entity::find_by_id(code.clone())
            .filter(currency::Column::DeletedAt.is_null())
            .one(&self.database)
            .await?
            .map(Currency::from)
            .ok_or_else(|| EngineError::NotFound(format!("currency {code}")))
    }

    /// Insert a currency, reviving a soft-deleted row with the same code.
    pub async fn create_currency(&self, mut currency: Currency) -> ResultEngine<Currency> {
        currency.id = normalize_code(&currency.id);
        if currency.id == self.base_currency {
            currency.rate = Decimal::ONE;
        }
        check_currency(&currency)?;
        with_tx!(self, |db_tx| {
            let existing = currency::Entity::find_by_id(currency.id.clone())
                .one(&db_tx)
                .await?;
            currency.updated_at = Utc::now();
            currency.deleted_at = None;
            let model = match existing {
                Some(row) if row.deleted_at.is_none() => {
                    return Err(EngineError::Conflict(format!(
                        "currency {} already exists",
                        currency.id
                    )));
                }
                Some(_) => currency::ActiveModel::from(&currency).update(&db_tx).await?,
                None => currency::ActiveModel::from(&currency).insert(&db_tx).await?,
            };
            Ok::<_, EngineError>(Currency::from(model))
        })
    }

    /// Change rate, precision or the active flag of an existing currency.
    pub async fn update_currency(&self, mut currency: Currency) -> ResultEngine<Currency> {
        currency.id = normalize_code(&currency.id);
        if currency.id == self.base_currency {
            currency.rate = Decimal::ONE;
        }
        check_currency(&currency)?;
        self.currency(&currency.id).await?;
        currency.updated_at = Utc::now();
        currency.deleted_at = None;
        let model = currency::ActiveModel::from(&currency)
            .update(&self.database)
            .await?;
        Ok(Currency::from(model))
    }

    /// Soft delete. The base currency and currencies used by accounts stay.
    pub async fn delete_currency(&self, code: &str) -> ResultEngine<()> {
        let code = normalize_code(code);
        if code == self.base_currency {
            return Err(EngineError::BusinessRule(format!(
                "base currency {code} cannot be deleted"
            )));
        }
        with_tx!(self, |db_tx| {
            let mut current = currency::Entity::find_by_id(code.clone())
                .filter(currency::Column::DeletedAt.is_null())
                .one(&db_tx)
                .await?
                .map(Currency::from)
                .ok_or_else(|| EngineError::NotFound(format!("currency {code}")))?;
            let in_use = accounts::Entity::find()
                .filter(accounts::Column::Currency.eq(code.as_str()))
                .filter(accounts::Column::DeletedAt.is_null())
                .count(&db_tx)
                .await?;
            if in_use > 0 {
                return Err(EngineError::BusinessRule(format!(
                    "currency {code} is used by {in_use} account(s)"
                )));
            }
            current.deleted_at = Some(Utc::now());
            currency::ActiveModel::from(&current).update(&db_tx).await?;
            Ok::<_, EngineError>(())
        })
    }

    /// Convert `amount` between two currencies at current rates, rounded to
    /// the target currency.
    pub async fn exchange(&self, from: &str, to: &str, amount: Decimal) -> ResultEngine<Decimal> {
        load_converter(&self.database).await?.convert_rounded(
            &normalize_code(from),
            &normalize_code(to),
            amount,
        )
    }

    /// Apply a rate document. Unknown codes are inserted, known ones updated;
    /// the base currency always keeps rate 1.
    pub async fn upsert_exchange_rates(&self, rows: Vec<ExchangeRateRow>) -> ResultEngine<usize> {
        let count = rows.len();
        with_tx!(self, |db_tx| {
            for row in rows {
                self.upsert_rate(&db_tx, row).await?;
            }
            Ok::<_, EngineError>(())
        })?;
        tracing::info!(count, "exchange rates updated");
        Ok(count)
    }

    async fn upsert_rate<C: ConnectionTrait>(&self, conn: &C, row: ExchangeRateRow) -> ResultEngine<()> {
        let code = normalize_code(&row.id);
        let mut currency = Currency::new(&code, row.rate, row.decimal_places);
        currency.is_active = row.is_active;
        if code == self.base_currency {
            currency.rate = Decimal::ONE;
        }
        check_currency(&currency)?;
        let exists = currency::Entity::find_by_id(code).one(conn).await?.is_some();
        let model = currency::ActiveModel::from(&currency);
        if exists {
            model.update(conn).await?;
        } else {
            model.insert(conn).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn rates_must_be_positive() {
        assert!(check_currency(&Currency::new("EUR", dec!(0.92), 2)).is_ok());
        assert!(check_currency(&Currency::new("EUR", dec!(0), 2)).is_err());
        assert!(check_currency(&Currency::new("EUR", dec!(-1), 2)).is_err());
        assert!(check_currency(&Currency::new("EUR", dec!(1), 19)).is_err());
    }
}

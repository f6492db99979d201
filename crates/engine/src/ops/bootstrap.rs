use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, TransactionTrait};

use crate::{Account, AccountType, Currency, EngineError, ResultEngine, currency};

use super::{Engine, find_default_account, with_tx};

/// Accounts every ledger starts with, one default per type.
const DEFAULT_ACCOUNTS: [(&str, AccountType); 5] = [
    ("Default Expense", AccountType::ExpenseCategory),
    ("Default Income", AccountType::IncomeCategory),
    ("Default Liability", AccountType::Liability),
    ("Cash", AccountType::Asset),
    ("Default Adjustment", AccountType::Adjustment),
];

impl Engine {
    /// Make sure the base currency and the default accounts exist.
    /// Safe to call on every start.
    pub async fn bootstrap(&self) -> ResultEngine<()> {
        let created = with_tx!(self, |db_tx| {
            match currency::Entity::find_by_id(self.base_currency.clone())
                .one(&db_tx)
                .await?
            {
                Some(row) if row.rate == Decimal::ONE && row.deleted_at.is_none() => {}
                Some(row) => {
                    let mut base = Currency::from(row);
                    base.rate = Decimal::ONE;
                    base.deleted_at = None;
                    currency::ActiveModel::from(&base).update(&db_tx).await?;
                }
                None => {
                    let base = Currency::new(&self.base_currency, Decimal::ONE, 2);
                    currency::ActiveModel::from(&base).insert(&db_tx).await?;
                }
            }

            let mut created = 0usize;
            for (name, account_type) in DEFAULT_ACCOUNTS {
                if find_default_account(&db_tx, account_type).await?.is_some() {
                    continue;
                }
                let account =
                    Account::new(name, &self.base_currency, account_type).default_for_type();
                self.insert_account(&db_tx, account).await?;
                created += 1;
            }
            Ok::<_, EngineError>(created)
        })?;
        if created > 0 {
            self.caches.clear();
        }
        tracing::info!(
            base_currency = %self.base_currency,
            created_accounts = created,
            "ledger bootstrapped"
        );
        Ok(())
    }
}

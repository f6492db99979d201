use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    TransactionTrait, sea_query::Expr,
};

use crate::{Account, EngineError, ResultEngine, accounts, currency, transactions};

use super::{Engine, find_default_account, normalize_required_name, require_account, with_tx};

impl Engine {
    /// Create one account.
    ///
    /// Only one non-deleted default account may exist per type.
    pub async fn create_account(&self, account: Account) -> ResultEngine<Account> {
        let created = with_tx!(self, |db_tx| self.insert_account(&db_tx, account).await)?;
        self.caches.invalidate_account(created.id);
        Ok(created)
    }

    /// Create several accounts atomically.
    pub async fn create_accounts(&self, accounts: Vec<Account>) -> ResultEngine<Vec<Account>> {
        let created = with_tx!(self, |db_tx| {
            let mut created = Vec::with_capacity(accounts.len());
            for account in accounts {
                created.push(self.insert_account(&db_tx, account).await?);
            }
            Ok::<_, EngineError>(created)
        })?;
        for account in &created {
            self.caches.invalidate_account(account.id);
        }
        Ok(created)
    }

    pub(crate) async fn insert_account<C: ConnectionTrait>(
        &self,
        conn: &C,
        mut account: Account,
    ) -> ResultEngine<Account> {
        account.name = normalize_required_name(&account.name, "account")?;
        account.currency = currency::normalize_code(&account.currency);
        ensure_currency(conn, &account.currency).await?;
        if account.is_default()
            && let Some(existing) = find_default_account(conn, account.account_type).await?
        {
            return Err(EngineError::Conflict(format!(
                "default {} account already exists: {}",
                account.account_type.as_str(),
                existing.id
            )));
        }
        let now = Utc::now();
        account.id = 0;
        account.current_balance = Decimal::ZERO;
        account.first_transaction_at = None;
        account.created_at = now;
        account.last_updated_at = now;
        account.deleted_at = None;
        let model = accounts::ActiveModel::try_from(&account)?
            .insert(conn)
            .await?;
        tracing::debug!(account_id = model.id, "account created");
        Account::try_from(model)
    }

    /// Update the descriptive fields of an account. Balances and the first
    /// transaction date are owned by the ledger and are kept as stored.
    pub async fn update_account(&self, mut account: Account) -> ResultEngine<Account> {
        let updated = with_tx!(self, |db_tx| {
            let current = require_account(&db_tx, account.id).await?;
            account.name = normalize_required_name(&account.name, "account")?;
            account.currency = currency::normalize_code(&account.currency);
            if account.currency != current.currency {
                ensure_currency(&db_tx, &account.currency).await?;
                let used = transactions::Entity::find()
                    .filter(
                        transactions::Column::SourceAccountId
                            .eq(account.id)
                            .or(transactions::Column::DestinationAccountId.eq(account.id)),
                    )
                    .count(&db_tx)
                    .await?;
                if used > 0 {
                    return Err(EngineError::BusinessRule(format!(
                        "account {} has transactions, its currency cannot change",
                        account.id
                    )));
                }
            }
            if account.is_default()
                && !current.is_default()
                && let Some(existing) = find_default_account(&db_tx, account.account_type).await?
                && existing.id != account.id
            {
                return Err(EngineError::Conflict(format!(
                    "default {} account already exists: {}",
                    account.account_type.as_str(),
                    existing.id
                )));
            }
            account.current_balance = current.current_balance;
            account.first_transaction_at = current.first_transaction_at;
            account.created_at = current.created_at;
            account.last_updated_at = Utc::now();
            account.deleted_at = None;
            let model = accounts::ActiveModel::try_from(&account)?
                .update(&db_tx)
                .await?;
            Account::try_from(model)
        })?;
        self.caches.invalidate_account(updated.id);
        Ok(updated)
    }

    /// Soft delete. Default accounts cannot be deleted.
    pub async fn delete_account(&self, account_id: i32) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let account = require_account(&db_tx, account_id).await?;
            if account.is_default() {
                return Err(EngineError::BusinessRule(format!(
                    "default account {account_id} cannot be deleted"
                )));
            }
            accounts::Entity::update_many()
                .col_expr(accounts::Column::DeletedAt, Expr::value(Some(Utc::now())))
                .filter(accounts::Column::Id.eq(account_id))
                .exec(&db_tx)
                .await?;
            Ok::<_, EngineError>(())
        })?;
        self.caches.invalidate_account(account_id);
        Ok(())
    }

    pub async fn account(&self, account_id: i32) -> ResultEngine<Account> {
        require_account(&self.database, account_id).await
    }

    /// Non-deleted accounts by `display_order` (unset last), then id.
    pub async fn list_accounts(&self) -> ResultEngine<Vec<Account>> {
        let mut accounts: Vec<Account> = accounts::Entity::find()
            .filter(accounts::Column::DeletedAt.is_null())
            .all(&self.database)
            .await?
            .into_iter()
            .map(Account::try_from)
            .collect::<ResultEngine<_>>()?;
        accounts.sort_by_key(|a| (a.display_order.is_none(), a.display_order, a.id));
        Ok(accounts)
    }
}

async fn ensure_currency<C: ConnectionTrait>(conn: &C, code: &str) -> ResultEngine<()> {
    currency::Entity::find_by_id(code.to_string())
        .filter(currency::Column::DeletedAt.is_null())
        .one(conn)
        .await?
        .map(|_| ())
        .ok_or_else(|| EngineError::NotFound(format!("currency {code}")))
}

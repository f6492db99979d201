use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, sea_query::Expr,
};
use tokio::sync::watch;

use crate::{
    Account, AccountType, Currency, CurrencyConverter, EngineError, ResultEngine, accounts,
    cache::Caches, currency,
};

mod accounts_ops;
mod bootstrap;
mod currencies;
mod imports;
mod labels;
mod maintenance;
mod rules;
mod schedules;
mod stats;
mod transactions;

pub use imports::{ImportBatch, ImportItem, ImportSummary};
pub use rules::DryRunResult;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
    // Named form: storage failures anywhere in the unit, begin and commit
    // included, come back as `Internal` prefixed with the operation.
    ($self:expr, $operation:expr, |$tx:ident| $body:expr) => {{
        let outcome = async {
            let $tx = $self.database.begin().await?;
            let value = $body?;
            $tx.commit().await?;
            Ok::<_, $crate::EngineError>(value)
        }
        .await;
        outcome.map_err(|err| err.context($operation))
    }};
}

pub(crate) use with_tx;

pub struct Engine {
    database: DatabaseConnection,
    base_currency: String,
    caches: Caches,
    schedule_changes: watch::Sender<u64>,
    cancelled: Arc<AtomicBool>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("base_currency", &self.base_currency)
            .field("caches", &self.caches)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    pub fn database(&self) -> &DatabaseConnection {
        &self.database
    }

    /// Stop accepting rule work. Running scripts finish, no further rule is
    /// started and scheduled jobs exit at their next tick.
    pub fn shutdown(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.schedule_changes.send_modify(|generation| *generation += 1);
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Receiver that ticks whenever scheduled rules change.
    pub fn schedule_changes(&self) -> watch::Receiver<u64> {
        self.schedule_changes.subscribe()
    }

    fn notify_schedule_changed(&self) {
        self.schedule_changes
            .send_modify(|generation| *generation += 1);
    }

    /// Currency of `account_id`, served from the cache when possible.
    async fn account_currency<C: ConnectionTrait>(
        &self,
        conn: &C,
        account_id: i32,
    ) -> ResultEngine<String> {
        if let Some(currency) = self.caches.account_currency(account_id) {
            return Ok(currency);
        }
        let account = require_account(conn, account_id).await?;
        self.caches
            .remember_account_currency(account.id, &account.currency);
        Ok(account.currency)
    }
}

/// Load every currency row, including deleted ones (the converter skips them).
pub(crate) async fn load_currencies<C: ConnectionTrait>(conn: &C) -> ResultEngine<Vec<Currency>> {
    Ok(currency::Entity::find()
        .all(conn)
        .await?
        .into_iter()
        .map(Currency::from)
        .collect())
}

pub(crate) async fn load_converter<C: ConnectionTrait>(
    conn: &C,
) -> ResultEngine<CurrencyConverter> {
    Ok(CurrencyConverter::new(load_currencies(conn).await?))
}

/// All non-deleted accounts keyed by id.
pub(crate) async fn load_accounts<C: ConnectionTrait>(
    conn: &C,
) -> ResultEngine<HashMap<i32, Account>> {
    accounts::Entity::find()
        .filter(accounts::Column::DeletedAt.is_null())
        .all(conn)
        .await?
        .into_iter()
        .map(|model| Account::try_from(model).map(|a| (a.id, a)))
        .collect()
}

pub(crate) async fn require_account<C: ConnectionTrait>(
    conn: &C,
    account_id: i32,
) -> ResultEngine<Account> {
    let model = accounts::Entity::find_by_id(account_id)
        .filter(accounts::Column::DeletedAt.is_null())
        .one(conn)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("account {account_id}")))?;
    Account::try_from(model)
}

/// The default account of `account_type` (`flags & 1 = 1`).
pub(crate) async fn find_default_account<C: ConnectionTrait>(
    conn: &C,
    account_type: AccountType,
) -> ResultEngine<Option<Account>> {
    accounts::Entity::find()
        .filter(accounts::Column::AccountType.eq(account_type.as_str()))
        .filter(accounts::Column::DeletedAt.is_null())
        .filter(Expr::cust("flags & 1 = 1"))
        .one(conn)
        .await?
        .map(Account::try_from)
        .transpose()
}

pub(crate) async fn default_account<C: ConnectionTrait>(
    conn: &C,
    account_type: AccountType,
) -> ResultEngine<Account> {
    find_default_account(conn, account_type)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("default {} account", account_type.as_str())))
}

fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::MissingField(format!("{label} name")));
    }
    Ok(trimmed.to_string())
}

/// The builder for `Engine`
pub struct EngineBuilder {
    database: DatabaseConnection,
    base_currency: String,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            database: DatabaseConnection::default(),
            base_currency: "USD".to_string(),
        }
    }
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Currency every double entry is expressed in. Defaults to `USD`.
    pub fn base_currency(mut self, code: &str) -> EngineBuilder {
        self.base_currency = currency::normalize_code(code);
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        if self.base_currency.is_empty() {
            return Err(EngineError::MissingField("base currency".to_string()));
        }
        let (schedule_changes, _) = watch::channel(0);
        Ok(Engine {
            database: self.database,
            base_currency: self.base_currency,
            caches: Caches::default(),
            schedule_changes,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }
}

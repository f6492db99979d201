use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, sea_query::Expr,
};

use crate::{
    Account, AccountType, Currency, CurrencyConverter, EngineError, JsInterpreter, ResultEngine,
    RuleExecutor, ScriptRunner, Transaction, TransactionType, accounts, base_amounts,
    double_entries, transactions, validation,
};

use super::super::{Engine, default_account, load_accounts, load_currencies, rules::load_rules};

/// Outcome of a committed-to-be write.
#[derive(Debug)]
pub(crate) struct Written {
    pub(crate) transactions: Vec<Transaction>,
    /// Per account, the day range now known to have no snapshot gaps.
    pub(crate) gap_free: Vec<(i32, NaiveDate, NaiveDate)>,
}

fn fill_adjustment(
    tx: &mut Transaction,
    counterpart: &Account,
    converter: &CurrencyConverter,
) -> ResultEngine<()> {
    let amount = tx
        .destination_amount
        .ok_or_else(|| EngineError::MissingField("destination_amount".to_string()))?;
    tx.source_account_id = Some(counterpart.id);
    tx.source_currency = counterpart.currency.clone();
    tx.source_amount = Some(-converter.convert_rounded(
        &tx.destination_currency,
        &counterpart.currency,
        amount,
    )?);
    Ok(())
}

impl Engine {
    /// The write path shared by manual creation, imports and scheduled rules.
    ///
    /// Must run inside `db_tx`; nothing is visible to other connections until
    /// the caller commits.
    pub(crate) async fn write_transactions(
        &self,
        db_tx: &DatabaseTransaction,
        drafts: Vec<Transaction>,
        skip_rules: bool,
    ) -> ResultEngine<Written> {
        if drafts.is_empty() {
            return Ok(Written {
                transactions: Vec::new(),
                gap_free: Vec::new(),
            });
        }
        let currencies = load_currencies(db_tx).await?;
        let converter = CurrencyConverter::new(currencies.clone());
        let accounts = load_accounts(db_tx).await?;

        for tx in &drafts {
            validation::validate(tx, &accounts)?;
        }

        let mut drafts = if skip_rules {
            drafts
        } else {
            self.apply_rules(db_tx, drafts, &currencies, &accounts)
                .await?
        };

        let needs_counterpart = |tx: &Transaction| {
            tx.transaction_type == TransactionType::Adjustment && tx.source_account_id.is_none()
        };
        if drafts.iter().any(needs_counterpart) {
            let counterpart = default_account(db_tx, AccountType::Adjustment).await?;
            for tx in drafts.iter_mut().filter(|tx| needs_counterpart(tx)) {
                fill_adjustment(tx, &counterpart, &converter)?;
            }
        }

        let mut persisted = Vec::with_capacity(drafts.len());
        for mut tx in drafts {
            let model = transactions::ActiveModel::try_from(&tx)?
                .insert(db_tx)
                .await?;
            tx.id = model.id;
            persisted.push(tx);
        }

        self.post_persisted(db_tx, &mut persisted, &accounts, &converter)
            .await?;
        let gap_free = self.apply_stats(db_tx, &persisted, true).await?;

        tracing::debug!(count = persisted.len(), "transactions written");
        Ok(Written {
            transactions: persisted,
            gap_free,
        })
    }

    /// Lock the touched accounts, stamp base amounts and post double entries
    /// for rows that already exist.
    pub(crate) async fn post_persisted<C: ConnectionTrait>(
        &self,
        conn: &C,
        txs: &mut [Transaction],
        accounts: &HashMap<i32, Account>,
        converter: &CurrencyConverter,
    ) -> ResultEngine<()> {
        let ids: BTreeSet<i32> = txs.iter().flat_map(Transaction::account_ids).collect();
        let locked = accounts::Entity::find()
            .filter(accounts::Column::Id.is_in(ids))
            .order_by_asc(accounts::Column::Id)
            .lock_exclusive()
            .all(conn)
            .await?;
        for model in locked {
            let earliest = txs
                .iter()
                .filter(|tx| tx.account_ids().any(|id| id == model.id))
                .map(|tx| tx.transaction_date_time)
                .min();
            if let Some(earliest) = earliest
                && model
                    .first_transaction_at
                    .is_none_or(|current| earliest < current)
            {
                accounts::Entity::update_many()
                    .col_expr(
                        accounts::Column::FirstTransactionAt,
                        Expr::value(Some(earliest)),
                    )
                    .filter(accounts::Column::Id.eq(model.id))
                    .exec(conn)
                    .await?;
            }
        }

        for tx in txs.iter_mut() {
            base_amounts::normalize(tx, &self.base_currency, converter)?;
            transactions::Entity::update_many()
                .col_expr(
                    transactions::Column::SourceAmountInBaseCurrency,
                    Expr::value(tx.source_amount_in_base_currency),
                )
                .col_expr(
                    transactions::Column::DestinationAmountInBaseCurrency,
                    Expr::value(tx.destination_amount_in_base_currency),
                )
                .filter(transactions::Column::Id.eq(tx.id))
                .exec(conn)
                .await?;

            let source_id = tx
                .source_account_id
                .ok_or_else(|| EngineError::MissingField("source_account_id".to_string()))?;
            let source_type = accounts
                .get(&source_id)
                .map(|a| a.account_type)
                .ok_or_else(|| EngineError::NotFound(format!("account {source_id}")))?;
            let legs = double_entries::post(tx, source_type, &self.base_currency)?;
            double_entries::Entity::insert_many(legs.iter().map(double_entries::ActiveModel::from))
                .exec_without_returning(conn)
                .await?;
        }
        Ok(())
    }

    async fn apply_rules<C: ConnectionTrait>(
        &self,
        conn: &C,
        drafts: Vec<Transaction>,
        currencies: &[Currency],
        accounts: &HashMap<i32, Account>,
    ) -> ResultEngine<Vec<Transaction>> {
        let executor = RuleExecutor::new(load_rules(conn).await?);
        if executor.is_empty() {
            return Ok(drafts);
        }
        let account_list: Vec<Account> = accounts.values().cloned().collect();
        let interpreter = JsInterpreter::new(currencies, &account_list)?;
        drafts
            .into_iter()
            .map(|tx| self.run_rules(&executor, &interpreter, &tx, accounts))
            .collect()
    }

    /// Run the inline rules on `tx`. A modified result is validated again.
    pub(crate) fn run_rules(
        &self,
        executor: &RuleExecutor,
        runner: &dyn ScriptRunner,
        tx: &Transaction,
        accounts: &HashMap<i32, Account>,
    ) -> ResultEngine<Transaction> {
        let execution = executor.execute(tx, runner, &self.cancelled)?;
        if execution.modified {
            validation::validate(&execution.transaction, accounts)?;
        }
        Ok(execution.transaction)
    }

    /// Cache bookkeeping that may only happen once the write is durable.
    pub(crate) fn after_commit(&self, written: &Written) {
        for (account_id, from, to) in &written.gap_free {
            self.caches.record_gap_free(*account_id, *from, *to);
        }
    }
}

//! Daily and monthly balance snapshots.
//!
//! A snapshot holds the balance at the end of its day (or month). New deltas
//! are applied in place: the row for the transaction date is created from the
//! closest earlier snapshot, then every row from that date on is shifted. Days
//! nobody wrote to are filled afterwards from the previous row plus that
//! day's transactions.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
    sea_query::{Expr, OnConflict},
};

use crate::{
    EngineError, ResultEngine, Transaction, accounts, daily_stats, monthly_stats, transactions,
};

use super::{Engine, with_tx};

const INSERT_CHUNK: usize = 500;

pub(crate) fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn next_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Net change of `account_id` per day from a set of transactions.
fn daily_sums(txs: &[Transaction], account_id: i32) -> BTreeMap<NaiveDate, Decimal> {
    let mut sums: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for tx in txs {
        for (id, delta) in tx.balance_deltas() {
            if id == account_id {
                *sums.entry(tx.transaction_date_only).or_default() += delta;
            }
        }
    }
    sums
}

impl Engine {
    /// Apply the balance deltas of `txs` to snapshots and account balances.
    ///
    /// With `fill_gaps`, missing days from the snapshot preceding each
    /// transaction up to today are filled too; the filled ranges are returned so the caller can remember
    /// them after commit.
    pub(crate) async fn apply_stats<C: ConnectionTrait>(
        &self,
        conn: &C,
        txs: &[Transaction],
        fill_gaps: bool,
    ) -> ResultEngine<Vec<(i32, NaiveDate, NaiveDate)>> {
        let now = Utc::now();
        let mut earliest: BTreeMap<i32, NaiveDate> = BTreeMap::new();

        for tx in txs {
            let date = tx.transaction_date_only;
            for (account_id, delta) in tx.balance_deltas() {
                apply_daily_delta(conn, account_id, date, delta).await?;
                apply_monthly_delta(conn, account_id, month_start(date), delta).await?;
                accounts::Entity::update_many()
                    .col_expr(
                        accounts::Column::CurrentBalance,
                        Expr::col(accounts::Column::CurrentBalance).add(delta),
                    )
                    .col_expr(accounts::Column::LastUpdatedAt, Expr::value(now))
                    .filter(accounts::Column::Id.eq(account_id))
                    .exec(conn)
                    .await?;
                earliest
                    .entry(account_id)
                    .and_modify(|d| *d = (*d).min(date))
                    .or_insert(date);
            }
        }

        let mut filled = Vec::new();
        if !fill_gaps {
            return Ok(filled);
        }
        let today = now.date_naive();
        for (account_id, from) in earliest {
            let to = today.max(from);
            if self.caches.is_gap_free(account_id, from, to) {
                continue;
            }
            // Start at the previous snapshot so the days before `from` are
            // covered too.
            let daily_from = latest_daily_before(conn, account_id, from)
                .await?
                .unwrap_or(from);
            let monthly_from = latest_monthly_before(conn, account_id, month_start(from))
                .await?
                .unwrap_or(month_start(from));
            calculate_daily_stat(conn, account_id, daily_from, to).await?;
            calculate_monthly_stat(conn, account_id, monthly_from, month_start(to)).await?;
            filled.push((account_id, daily_from, to));
        }
        Ok(filled)
    }

    /// Fill missing snapshots for every account, from its latest snapshot
    /// (or first transaction, or creation day) up to today.
    pub async fn fix_daily_gaps(&self) -> ResultEngine<usize> {
        let filled = with_tx!(self, "fix_daily_gaps", |db_tx| self.fix_gaps_in(&db_tx).await)?;
        for (account_id, from, to) in &filled {
            self.caches.record_gap_free(*account_id, *from, *to);
        }
        tracing::info!(accounts = filled.len(), "daily stat gaps fixed");
        Ok(filled.len())
    }

    pub(crate) async fn fix_gaps_in<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> ResultEngine<Vec<(i32, NaiveDate, NaiveDate)>> {
        let today = Utc::now().date_naive();
        let mut filled = Vec::new();
        let accounts = accounts::Entity::find()
            .filter(accounts::Column::DeletedAt.is_null())
            .order_by_asc(accounts::Column::Id)
            .all(conn)
            .await?;

        for account in accounts {
            let first_tx = first_transaction_date(conn, account.id).await?;
            let fallback = first_tx.unwrap_or_else(|| account.created_at.date_naive());

            let daily_from = daily_stats::Entity::find()
                .filter(daily_stats::Column::AccountId.eq(account.id))
                .order_by_desc(daily_stats::Column::Date)
                .one(conn)
                .await?
                .map_or(fallback, |row| row.date);
            let to = today.max(daily_from);
            calculate_daily_stat(conn, account.id, daily_from, to).await?;

            let monthly_from = monthly_stats::Entity::find()
                .filter(monthly_stats::Column::AccountId.eq(account.id))
                .order_by_desc(monthly_stats::Column::Date)
                .one(conn)
                .await?
                .map_or(month_start(fallback), |row| row.date);
            calculate_monthly_stat(conn, account.id, monthly_from, month_start(to)).await?;

            filled.push((account.id, daily_from, to));
        }
        Ok(filled)
    }

    /// Fill every account with transactions from its first transaction day
    /// to today. Used after a replay, where only transaction days got rows.
    pub(crate) async fn fill_from_first_transactions<C: ConnectionTrait>(
        &self,
        conn: &C,
    ) -> ResultEngine<()> {
        let today = Utc::now().date_naive();
        let account_ids: Vec<i32> = accounts::Entity::find()
            .filter(accounts::Column::DeletedAt.is_null())
            .order_by_asc(accounts::Column::Id)
            .all(conn)
            .await?
            .into_iter()
            .map(|account| account.id)
            .collect();
        for account_id in account_ids {
            let Some(first) = first_transaction_date(conn, account_id).await? else {
                continue;
            };
            let to = today.max(first);
            calculate_daily_stat(conn, account_id, first, to).await?;
            calculate_monthly_stat(conn, account_id, month_start(first), month_start(to)).await?;
        }
        Ok(())
    }

    /// Daily snapshots of `account_id` within `from..=to`, oldest first.
    pub async fn daily_stats(
        &self,
        account_id: i32,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ResultEngine<Vec<(NaiveDate, Decimal)>> {
        Ok(daily_stats::Entity::find()
            .filter(daily_stats::Column::AccountId.eq(account_id))
            .filter(daily_stats::Column::Date.between(from, to))
            .order_by_asc(daily_stats::Column::Date)
            .all(&self.database)
            .await?
            .into_iter()
            .map(|row| (row.date, row.amount))
            .collect())
    }

    /// Monthly snapshots of `account_id`; dates are month starts.
    pub async fn monthly_stats(
        &self,
        account_id: i32,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ResultEngine<Vec<(NaiveDate, Decimal)>> {
        Ok(monthly_stats::Entity::find()
            .filter(monthly_stats::Column::AccountId.eq(account_id))
            .filter(monthly_stats::Column::Date.between(month_start(from), to))
            .order_by_asc(monthly_stats::Column::Date)
            .all(&self.database)
            .await?
            .into_iter()
            .map(|row| (row.date, row.balance))
            .collect())
    }
}

async fn first_transaction_date<C: ConnectionTrait>(
    conn: &C,
    account_id: i32,
) -> ResultEngine<Option<NaiveDate>> {
    Ok(transactions::Entity::find()
        .filter(transactions::Column::DeletedAt.is_null())
        .filter(
            transactions::Column::SourceAccountId
                .eq(account_id)
                .or(transactions::Column::DestinationAccountId.eq(account_id)),
        )
        .order_by_asc(transactions::Column::TransactionDateOnly)
        .one(conn)
        .await?
        .map(|tx| tx.transaction_date_only))
}

async fn latest_daily_before<C: ConnectionTrait>(
    conn: &C,
    account_id: i32,
    date: NaiveDate,
) -> ResultEngine<Option<NaiveDate>> {
    Ok(daily_stats::Entity::find()
        .filter(daily_stats::Column::AccountId.eq(account_id))
        .filter(daily_stats::Column::Date.lt(date))
        .order_by_desc(daily_stats::Column::Date)
        .one(conn)
        .await?
        .map(|row| row.date))
}

async fn latest_monthly_before<C: ConnectionTrait>(
    conn: &C,
    account_id: i32,
    month: NaiveDate,
) -> ResultEngine<Option<NaiveDate>> {
    Ok(monthly_stats::Entity::find()
        .filter(monthly_stats::Column::AccountId.eq(account_id))
        .filter(monthly_stats::Column::Date.lt(month))
        .order_by_desc(monthly_stats::Column::Date)
        .one(conn)
        .await?
        .map(|row| row.date))
}

/// Transactions touching `account_id` dated within `from..=to`.
async fn transactions_between<C: ConnectionTrait>(
    conn: &C,
    account_id: i32,
    from: NaiveDate,
    to: NaiveDate,
) -> ResultEngine<Vec<Transaction>> {
    transactions::Entity::find()
        .filter(transactions::Column::DeletedAt.is_null())
        .filter(transactions::Column::TransactionDateOnly.between(from, to))
        .filter(
            transactions::Column::SourceAccountId
                .eq(account_id)
                .or(transactions::Column::DestinationAccountId.eq(account_id)),
        )
        .all(conn)
        .await?
        .into_iter()
        .map(Transaction::try_from)
        .collect()
}

async fn apply_daily_delta<C: ConnectionTrait>(
    conn: &C,
    account_id: i32,
    date: NaiveDate,
    delta: Decimal,
) -> ResultEngine<()> {
    let prior = daily_stats::Entity::find()
        .filter(daily_stats::Column::AccountId.eq(account_id))
        .filter(daily_stats::Column::Date.lt(date))
        .order_by_desc(daily_stats::Column::Date)
        .one(conn)
        .await?
        .map_or(Decimal::ZERO, |row| row.amount);
    daily_stats::Entity::insert(daily_stats::ActiveModel {
        account_id: sea_orm::ActiveValue::Set(account_id),
        date: sea_orm::ActiveValue::Set(date),
        amount: sea_orm::ActiveValue::Set(prior),
    })
    .on_conflict(
        OnConflict::columns([daily_stats::Column::AccountId, daily_stats::Column::Date])
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;
    daily_stats::Entity::update_many()
        .col_expr(
            daily_stats::Column::Amount,
            Expr::col(daily_stats::Column::Amount).add(delta),
        )
        .filter(daily_stats::Column::AccountId.eq(account_id))
        .filter(daily_stats::Column::Date.gte(date))
        .exec(conn)
        .await?;
    Ok(())
}

async fn apply_monthly_delta<C: ConnectionTrait>(
    conn: &C,
    account_id: i32,
    month: NaiveDate,
    delta: Decimal,
) -> ResultEngine<()> {
    let prior = monthly_stats::Entity::find()
        .filter(monthly_stats::Column::AccountId.eq(account_id))
        .filter(monthly_stats::Column::Date.lt(month))
        .order_by_desc(monthly_stats::Column::Date)
        .one(conn)
        .await?
        .map_or(Decimal::ZERO, |row| row.balance);
    monthly_stats::Entity::insert(monthly_stats::ActiveModel {
        account_id: sea_orm::ActiveValue::Set(account_id),
        date: sea_orm::ActiveValue::Set(month),
        balance: sea_orm::ActiveValue::Set(prior),
    })
    .on_conflict(
        OnConflict::columns([monthly_stats::Column::AccountId, monthly_stats::Column::Date])
            .do_nothing()
            .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;
    monthly_stats::Entity::update_many()
        .col_expr(
            monthly_stats::Column::Balance,
            Expr::col(monthly_stats::Column::Balance).add(delta),
        )
        .filter(monthly_stats::Column::AccountId.eq(account_id))
        .filter(monthly_stats::Column::Date.gte(month))
        .exec(conn)
        .await?;
    Ok(())
}

/// Create the missing daily rows of `account_id` in `start..=end`.
///
/// Existing rows are trusted; a missing day is the previous row plus the net
/// of that day's transactions.
pub(crate) async fn calculate_daily_stat<C: ConnectionTrait>(
    conn: &C,
    account_id: i32,
    start: NaiveDate,
    end: NaiveDate,
) -> ResultEngine<()> {
    if start > end {
        return Ok(());
    }
    let existing: HashMap<NaiveDate, Decimal> = daily_stats::Entity::find()
        .filter(daily_stats::Column::AccountId.eq(account_id))
        .filter(daily_stats::Column::Date.between(start, end))
        .all(conn)
        .await?
        .into_iter()
        .map(|row| (row.date, row.amount))
        .collect();
    let mut balance = daily_stats::Entity::find()
        .filter(daily_stats::Column::AccountId.eq(account_id))
        .filter(daily_stats::Column::Date.lt(start))
        .order_by_desc(daily_stats::Column::Date)
        .one(conn)
        .await?
        .map_or(Decimal::ZERO, |row| row.amount);
    let sums = daily_sums(
        &transactions_between(conn, account_id, start, end).await?,
        account_id,
    );

    let mut missing = Vec::new();
    for date in start.iter_days().take_while(|d| *d <= end) {
        match existing.get(&date) {
            Some(amount) => balance = *amount,
            None => {
                balance += sums.get(&date).copied().unwrap_or_default();
                missing.push(daily_stats::ActiveModel {
                    account_id: sea_orm::ActiveValue::Set(account_id),
                    date: sea_orm::ActiveValue::Set(date),
                    amount: sea_orm::ActiveValue::Set(balance),
                });
            }
        }
    }

    let count = missing.len();
    for chunk in missing.chunks(INSERT_CHUNK) {
        daily_stats::Entity::insert_many(chunk.to_vec())
            .on_conflict(
                OnConflict::columns([daily_stats::Column::AccountId, daily_stats::Column::Date])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
    }
    if count > 0 {
        tracing::debug!(account_id, %start, %end, count, "daily stat gaps filled");
    }
    Ok(())
}

/// Monthly twin of [`calculate_daily_stat`]; `start` and `end` are month starts.
pub(crate) async fn calculate_monthly_stat<C: ConnectionTrait>(
    conn: &C,
    account_id: i32,
    start: NaiveDate,
    end: NaiveDate,
) -> ResultEngine<()> {
    if start > end {
        return Ok(());
    }
    let existing: HashMap<NaiveDate, Decimal> = monthly_stats::Entity::find()
        .filter(monthly_stats::Column::AccountId.eq(account_id))
        .filter(monthly_stats::Column::Date.between(start, end))
        .all(conn)
        .await?
        .into_iter()
        .map(|row| (row.date, row.balance))
        .collect();
    let mut balance = monthly_stats::Entity::find()
        .filter(monthly_stats::Column::AccountId.eq(account_id))
        .filter(monthly_stats::Column::Date.lt(start))
        .order_by_desc(monthly_stats::Column::Date)
        .one(conn)
        .await?
        .map_or(Decimal::ZERO, |row| row.balance);
    let last_day = next_month(end)
        .and_then(|d| d.pred_opt())
        .ok_or_else(|| EngineError::Internal(format!("month out of range: {end}")))?;
    let mut sums: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
    for (date, amount) in daily_sums(
        &transactions_between(conn, account_id, start, last_day).await?,
        account_id,
    ) {
        *sums.entry(month_start(date)).or_default() += amount;
    }

    let mut missing = Vec::new();
    let mut month = Some(start);
    while let Some(current) = month.filter(|m| *m <= end) {
        match existing.get(&current) {
            Some(amount) => balance = *amount,
            None => {
                balance += sums.get(&current).copied().unwrap_or_default();
                missing.push(monthly_stats::ActiveModel {
                    account_id: sea_orm::ActiveValue::Set(account_id),
                    date: sea_orm::ActiveValue::Set(current),
                    balance: sea_orm::ActiveValue::Set(balance),
                });
            }
        }
        month = next_month(current);
    }

    for chunk in missing.chunks(INSERT_CHUNK) {
        monthly_stats::Entity::insert_many(chunk.to_vec())
            .on_conflict(
                OnConflict::columns([
                    monthly_stats::Column::AccountId,
                    monthly_stats::Column::Date,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
    }
    Ok(())
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait, sea_query::Expr,
};

use crate::{
    EngineError, ResultEngine, Transaction, accounts, daily_stats, double_entries, monthly_stats,
    transactions,
};

use super::{Engine, load_accounts, load_converter, with_tx};

const REPLAY_CHUNK: u64 = 500;

/// Drop everything derived from transactions.
async fn truncate_derived<C: ConnectionTrait>(conn: &C) -> ResultEngine<()> {
    match conn.get_database_backend() {
        DbBackend::Postgres => {
            conn.execute_unprepared(
                "TRUNCATE double_entries, daily_stats, monthly_stats RESTART IDENTITY",
            )
            .await?;
        }
        backend => {
            double_entries::Entity::delete_many().exec(conn).await?;
            daily_stats::Entity::delete_many().exec(conn).await?;
            monthly_stats::Entity::delete_many().exec(conn).await?;
            if backend == DbBackend::Sqlite
                && let Err(err) = conn
                    .execute_unprepared("DELETE FROM sqlite_sequence WHERE name = 'double_entries'")
                    .await
            {
                tracing::debug!(%err, "double entry sequence not reset");
            }
        }
    }
    Ok(())
}

impl Engine {
    /// Rebuild balances, double entries and snapshots from the stored
    /// transactions, oldest first. Returns how many transactions were
    /// replayed.
    pub async fn recalculate_all(&self) -> ResultEngine<u64> {
        let replayed = with_tx!(self, "recalculate_all", |db_tx| {
            accounts::Entity::update_many()
                .col_expr(accounts::Column::CurrentBalance, Expr::value(Decimal::ZERO))
                .col_expr(
                    accounts::Column::FirstTransactionAt,
                    Expr::value(Option::<DateTime<Utc>>::None),
                )
                .exec(&db_tx)
                .await?;
            truncate_derived(&db_tx).await?;

            let converter = load_converter(&db_tx).await?;
            let accounts = load_accounts(&db_tx).await?;
            let mut replayed = 0u64;
            let mut pages = transactions::Entity::find()
                .filter(transactions::Column::DeletedAt.is_null())
                .order_by_asc(transactions::Column::TransactionDateTime)
                .order_by_asc(transactions::Column::Id)
                .paginate(&db_tx, REPLAY_CHUNK);
            while let Some(models) = pages.fetch_and_next().await? {
                let mut chunk = models
                    .into_iter()
                    .map(Transaction::try_from)
                    .collect::<ResultEngine<Vec<_>>>()?;
                self.post_persisted(&db_tx, &mut chunk, &accounts, &converter)
                    .await?;
                self.apply_stats(&db_tx, &chunk, false).await?;
                replayed += chunk.len() as u64;
                tracing::debug!(replayed, "recalculation progress");
            }
            self.fill_from_first_transactions(&db_tx).await?;
            self.fix_gaps_in(&db_tx).await?;
            Ok::<_, EngineError>(replayed)
        })?;
        self.caches.clear();
        tracing::info!(replayed, "ledger recalculated");
        Ok(replayed)
    }
}

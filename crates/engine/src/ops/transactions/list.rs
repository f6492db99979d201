use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::{
    DoubleEntry, EngineError, ResultEngine, Transaction, TransactionListFilter, double_entries,
    transactions,
};

use super::super::Engine;

fn validate_list_filter(filter: &TransactionListFilter) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(EngineError::InvalidFormat(
            "invalid range: from must be < to".to_string(),
        ));
    }
    if filter.limit == Some(0) {
        return Err(EngineError::InvalidFormat(
            "limit must be positive".to_string(),
        ));
    }
    Ok(())
}

trait ApplyTxFilters: QueryFilter + Sized {
    fn apply_tx_filters(self, filter: &TransactionListFilter) -> Self;
}

impl<T> ApplyTxFilters for T
where
    T: QueryFilter + Sized,
{
    fn apply_tx_filters(mut self, filter: &TransactionListFilter) -> Self {
        self = self.filter(transactions::Column::DeletedAt.is_null());
        if let Some(from) = filter.from {
            self = self.filter(transactions::Column::TransactionDateTime.gte(from));
        }
        if let Some(to) = filter.to {
            self = self.filter(transactions::Column::TransactionDateTime.lt(to));
        }
        if let Some(account_id) = filter.account_id {
            self = self.filter(
                transactions::Column::SourceAccountId
                    .eq(account_id)
                    .or(transactions::Column::DestinationAccountId.eq(account_id)),
            );
        }
        if let Some(kind) = filter.transaction_type {
            self = self.filter(transactions::Column::TransactionType.eq(kind.as_str()));
        }
        self
    }
}

impl Engine {
    /// Transactions matching `filter`, newest first.
    ///
    /// `from` is inclusive and `to` is exclusive (`[from, to)`).
    pub async fn list_transactions(
        &self,
        filter: &TransactionListFilter,
    ) -> ResultEngine<Vec<Transaction>> {
        validate_list_filter(filter)?;
        let mut query = transactions::Entity::find()
            .apply_tx_filters(filter)
            .order_by_desc(transactions::Column::TransactionDateTime)
            .order_by_desc(transactions::Column::Id);
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = filter.offset {
            query = query.offset(offset);
        }
        query
            .all(&self.database)
            .await?
            .into_iter()
            .map(Transaction::try_from)
            .collect()
    }

    pub async fn transaction(&self, transaction_id: i64) -> ResultEngine<Transaction> {
        let model = transactions::Entity::find_by_id(transaction_id)
            .filter(transactions::Column::DeletedAt.is_null())
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("transaction {transaction_id}")))?;
        Transaction::try_from(model)
    }

    /// Posted legs of a transaction, debit first.
    pub async fn double_entries(&self, transaction_id: i64) -> ResultEngine<Vec<DoubleEntry>> {
        Ok(double_entries::Entity::find()
            .filter(double_entries::Column::TransactionId.eq(transaction_id))
            .filter(double_entries::Column::DeletedAt.is_null())
            .order_by_desc(double_entries::Column::IsDebit)
            .order_by_asc(double_entries::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(DoubleEntry::from)
            .collect())
    }
}

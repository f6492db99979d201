//! Transaction creation and reads.
//!
//! Every write goes through [`Engine::write_transactions`]: validation, rules,
//! persistence, base amounts, posting and stats in one database transaction.

use sea_orm::TransactionTrait;

use crate::{CreateTransactionRequest, EngineError, ResultEngine, Transaction};

use super::{Engine, load_converter, with_tx};

mod list;
mod mapping;
mod pipeline;

impl Engine {
    /// Create one transaction.
    pub async fn create_transaction(
        &self,
        request: CreateTransactionRequest,
    ) -> ResultEngine<Transaction> {
        let mut created = self.create_transactions(vec![request], false).await?;
        created
            .pop()
            .ok_or_else(|| EngineError::Internal("no transaction was created".to_string()))
    }

    /// Create a batch atomically: either every request is stored or none.
    pub async fn create_transactions(
        &self,
        requests: Vec<CreateTransactionRequest>,
        skip_rules: bool,
    ) -> ResultEngine<Vec<Transaction>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let written = with_tx!(self, "create_transactions", |db_tx| {
            let converter = load_converter(&db_tx).await?;
            let mut drafts = Vec::with_capacity(requests.len());
            for request in requests {
                drafts.push(self.map_request(&db_tx, request, &converter).await?);
            }
            self.write_transactions(&db_tx, drafts, skip_rules).await
        })?;
        self.after_commit(&written);
        Ok(written.transactions)
    }
}

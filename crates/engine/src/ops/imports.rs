use std::collections::{BTreeSet, HashSet};

use chrono::Utc;
use sea_orm::{ActiveValue, ColumnTrait, EntityTrait, QueryFilter, TransactionTrait};

use crate::{
    CreateTransactionRequest, EngineError, ResultEngine, Transaction, import_deduplications,
};

use super::{Engine, load_converter, with_tx};

const KEY_CHUNK: usize = 500;

/// One parsed source row and the keys that identify it across imports.
#[derive(Clone, Debug, PartialEq)]
pub struct ImportItem {
    pub request: CreateTransactionRequest,
    pub dedup_keys: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImportBatch {
    /// Source tag, e.g. `privat24`; keys are unique per source.
    pub source: String,
    pub items: Vec<ImportItem>,
    pub skip_rules: bool,
    /// Added to every imported transaction.
    pub tag_ids: BTreeSet<i32>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImportSummary {
    pub imported_count: usize,
    pub duplicate_count: usize,
    pub transactions: Vec<Transaction>,
}

impl Engine {
    /// Store a parsed batch. Rows whose keys were seen before (in earlier
    /// imports or earlier in this batch) are skipped; the rest is written
    /// atomically together with their keys.
    pub async fn import_transactions(&self, batch: ImportBatch) -> ResultEngine<ImportSummary> {
        let ImportBatch {
            source,
            items,
            skip_rules,
            tag_ids,
        } = batch;

        let (summary, written) = with_tx!(self, format!("import_transactions({source})"), |db_tx| {
            let all_keys: Vec<String> = items
                .iter()
                .flat_map(|item| item.dedup_keys.iter().cloned())
                .collect();
            let mut known: HashSet<String> = HashSet::new();
            for chunk in all_keys.chunks(KEY_CHUNK) {
                let rows = import_deduplications::Entity::find()
                    .filter(import_deduplications::Column::ImportSource.eq(source.as_str()))
                    .filter(import_deduplications::Column::Key.is_in(chunk.iter().cloned()))
                    .all(&db_tx)
                    .await?;
                known.extend(rows.into_iter().map(|row| row.key));
            }

            let converter = load_converter(&db_tx).await?;
            let mut duplicate_count = 0;
            let mut drafts = Vec::new();
            let mut draft_keys = Vec::new();
            for item in items {
                if item.dedup_keys.iter().any(|key| known.contains(key)) {
                    duplicate_count += 1;
                    continue;
                }
                known.extend(item.dedup_keys.iter().cloned());
                let mut request = item.request;
                request.meta_mut().tag_ids.extend(tag_ids.iter().copied());
                drafts.push(self.map_request(&db_tx, request, &converter).await?);
                draft_keys.push(item.dedup_keys);
            }

            let written = self.write_transactions(&db_tx, drafts, skip_rules).await?;

            let now = Utc::now();
            let rows: Vec<import_deduplications::ActiveModel> = written
                .transactions
                .iter()
                .zip(&draft_keys)
                .flat_map(|(tx, keys)| {
                    keys.iter().map(|key| import_deduplications::ActiveModel {
                        import_source: ActiveValue::Set(source.clone()),
                        key: ActiveValue::Set(key.clone()),
                        transaction_id: ActiveValue::Set(tx.id),
                        created_at: ActiveValue::Set(now),
                    })
                })
                .collect();
            for chunk in rows.chunks(KEY_CHUNK) {
                import_deduplications::Entity::insert_many(chunk.to_vec())
                    .exec_without_returning(&db_tx)
                    .await?;
            }

            let summary = ImportSummary {
                imported_count: written.transactions.len(),
                duplicate_count,
                transactions: written.transactions.clone(),
            };
            Ok::<_, EngineError>((summary, written))
        })?;
        self.after_commit(&written);
        tracing::info!(
            source = %source,
            imported = summary.imported_count,
            duplicates = summary.duplicate_count,
            "import stored"
        );
        Ok(summary)
    }
}

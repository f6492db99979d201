//! Statement import endpoint.

use api_types::import::{ImportResponse, ImportTransactions};
use axum::{Json, extract::State};
use importers::ImportRequest;

use crate::{ServerError, server::ServerState, views};

pub async fn import(
    State(state): State<ServerState>,
    Json(payload): Json<ImportTransactions>,
) -> Result<Json<ImportResponse>, ServerError> {
    if payload.content.is_empty() {
        return Err(ServerError::Generic("content is empty".to_string()));
    }
    let summary = state
        .imports
        .import(ImportRequest {
            source: payload.source,
            content: payload.content,
            skip_rules: payload.skip_rules,
            tags: payload.tags,
        })
        .await?;
    Ok(Json(ImportResponse {
        imported_count: summary.imported_count,
        duplicate_count: summary.duplicate_count,
        transactions: summary
            .transactions
            .into_iter()
            .map(views::transaction)
            .collect(),
    }))
}

pub async fn sources(State(state): State<ServerState>) -> Json<Vec<&'static str>> {
    Json(state.imports.sources().collect())
}

//! Balance snapshot endpoints.

use api_types::stats::{Snapshot, StatsQuery, StatsResponse};
use axum::{
    Json,
    extract::{Query, State},
};
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::{ServerError, server::ServerState};

fn response(account_id: i32, rows: Vec<(NaiveDate, Decimal)>) -> StatsResponse {
    StatsResponse {
        account_id,
        snapshots: rows
            .into_iter()
            .map(|(date, amount)| Snapshot { date, amount })
            .collect(),
    }
}

fn check_range(query: &StatsQuery) -> Result<(), ServerError> {
    if query.from > query.to {
        return Err(ServerError::Generic(format!(
            "from ({}) is after to ({})",
            query.from, query.to
        )));
    }
    Ok(())
}

pub async fn daily(
    State(state): State<ServerState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, ServerError> {
    check_range(&query)?;
    state.engine.account(query.account_id).await?;
    let rows = state
        .engine
        .daily_stats(query.account_id, query.from, query.to)
        .await?;
    Ok(Json(response(query.account_id, rows)))
}

pub async fn monthly(
    State(state): State<ServerState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, ServerError> {
    check_range(&query)?;
    state.engine.account(query.account_id).await?;
    let rows = state
        .engine
        .monthly_stats(query.account_id, query.from, query.to)
        .await?;
    Ok(Json(response(query.account_id, rows)))
}

use api_types::maintenance::{FixDailyGapsResponse, RecalculateResponse};
use axum::{Json, extract::State};

use crate::{ServerError, server::ServerState};

/// Replay every transaction and rebuild derived data.
pub async fn recalculate(
    State(state): State<ServerState>,
) -> Result<Json<RecalculateResponse>, ServerError> {
    let replayed = state.engine.recalculate_all().await?;
    tracing::info!(replayed, "recalculation finished");
    Ok(Json(RecalculateResponse { replayed }))
}

pub async fn fix_daily_gaps(
    State(state): State<ServerState>,
) -> Result<Json<FixDailyGapsResponse>, ServerError> {
    let accounts = state.engine.fix_daily_gaps().await?;
    Ok(Json(FixDailyGapsResponse { accounts }))
}

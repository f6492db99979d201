//! Tags and categories.

use api_types::label::{LabelNew, LabelView, LabelsResponse};
use axum::{Json, extract::State, http::StatusCode};

use crate::{ServerError, server::ServerState, views};

pub async fn list_tags(State(state): State<ServerState>) -> Result<Json<LabelsResponse>, ServerError> {
    let labels = state.engine.list_tags().await?;
    Ok(Json(LabelsResponse {
        labels: labels.into_iter().map(views::label).collect(),
    }))
}

pub async fn create_tag(
    State(state): State<ServerState>,
    Json(payload): Json<LabelNew>,
) -> Result<(StatusCode, Json<LabelView>), ServerError> {
    let tag = state.engine.create_tag(&payload.name).await?;
    Ok((StatusCode::CREATED, Json(views::label(tag))))
}

pub async fn list_categories(
    State(state): State<ServerState>,
) -> Result<Json<LabelsResponse>, ServerError> {
    let labels = state.engine.list_categories().await?;
    Ok(Json(LabelsResponse {
        labels: labels.into_iter().map(views::label).collect(),
    }))
}

pub async fn create_category(
    State(state): State<ServerState>,
    Json(payload): Json<LabelNew>,
) -> Result<(StatusCode, Json<LabelView>), ServerError> {
    let category = state.engine.create_category(&payload.name).await?;
    Ok((StatusCode::CREATED, Json(views::label(category))))
}

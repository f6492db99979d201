//! Currencies API endpoints.

use api_types::currency::{
    CurrenciesResponse, CurrencyNew, CurrencyView, Exchange, ExchangeResponse,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{Currency, currency::normalize_code};

use crate::{ServerError, server::ServerState, views};

fn currency(payload: CurrencyNew) -> Currency {
    let mut currency = Currency::new(&payload.id, payload.rate, payload.decimal_places);
    currency.is_active = payload.is_active;
    currency
}

pub async fn list(
    State(state): State<ServerState>,
) -> Result<Json<CurrenciesResponse>, ServerError> {
    let currencies = state.engine.list_currencies().await?;
    Ok(Json(CurrenciesResponse {
        currencies: currencies.into_iter().map(views::currency).collect(),
    }))
}

pub async fn get(
    State(state): State<ServerState>,
    Path(code): Path<String>,
) -> Result<Json<CurrencyView>, ServerError> {
    let currency = state.engine.currency(&code).await?;
    Ok(Json(views::currency(currency)))
}

pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<CurrencyNew>,
) -> Result<(StatusCode, Json<CurrencyView>), ServerError> {
    let created = state.engine.create_currency(currency(payload)).await?;
    Ok((StatusCode::CREATED, Json(views::currency(created))))
}

pub async fn update(
    State(state): State<ServerState>,
    Path(code): Path<String>,
    Json(payload): Json<CurrencyNew>,
) -> Result<Json<CurrencyView>, ServerError> {
    if normalize_code(&payload.id) != normalize_code(&code) {
        return Err(ServerError::Generic(format!(
            "currency code {} does not match path {code}",
            payload.id
        )));
    }
    let updated = state.engine.update_currency(currency(payload)).await?;
    Ok(Json(views::currency(updated)))
}

pub async fn delete(
    State(state): State<ServerState>,
    Path(code): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_currency(&code).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn exchange(
    State(state): State<ServerState>,
    Json(payload): Json<Exchange>,
) -> Result<Json<ExchangeResponse>, ServerError> {
    let amount = state
        .engine
        .exchange(&payload.from, &payload.to, payload.amount)
        .await?;
    Ok(Json(ExchangeResponse {
        amount,
        currency: normalize_code(&payload.to),
    }))
}

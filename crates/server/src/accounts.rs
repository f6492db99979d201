//! Accounts API endpoints.

use api_types::account::{AccountNew, AccountView, AccountsNew, AccountsResponse};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{Account, accounts::FLAG_IS_DEFAULT};

use crate::{ServerError, server::ServerState, views};

fn apply(mut account: Account, payload: AccountNew) -> Account {
    account.name = payload.name;
    account.currency = payload.currency;
    account.account_type = views::account_type(payload.account_type);
    account.account_number = payload.account_number;
    account.iban = payload.iban;
    account.note = payload.note;
    account.display_order = payload.display_order;
    account.liability_percent = payload.liability_percent;
    account.extra = payload.extra;
    if payload.is_default {
        account.flags |= FLAG_IS_DEFAULT;
    } else {
        account.flags &= !FLAG_IS_DEFAULT;
    }
    account
}

fn new_account(payload: AccountNew) -> Account {
    let account = Account::new(
        &payload.name,
        &payload.currency,
        views::account_type(payload.account_type),
    );
    apply(account, payload)
}

pub async fn list(State(state): State<ServerState>) -> Result<Json<AccountsResponse>, ServerError> {
    let accounts = state.engine.list_accounts().await?;
    Ok(Json(AccountsResponse {
        accounts: accounts.into_iter().map(views::account).collect(),
    }))
}

pub async fn get(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<Json<AccountView>, ServerError> {
    let account = state.engine.account(id).await?;
    Ok(Json(views::account(account)))
}

pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<AccountNew>,
) -> Result<(StatusCode, Json<AccountView>), ServerError> {
    let account = state.engine.create_account(new_account(payload)).await?;
    Ok((StatusCode::CREATED, Json(views::account(account))))
}

pub async fn create_bulk(
    State(state): State<ServerState>,
    Json(payload): Json<AccountsNew>,
) -> Result<(StatusCode, Json<AccountsResponse>), ServerError> {
    let accounts = payload.accounts.into_iter().map(new_account).collect();
    let created = state.engine.create_accounts(accounts).await?;
    Ok((
        StatusCode::CREATED,
        Json(AccountsResponse {
            accounts: created.into_iter().map(views::account).collect(),
        }),
    ))
}

pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
    Json(payload): Json<AccountNew>,
) -> Result<Json<AccountView>, ServerError> {
    let current = state.engine.account(id).await?;
    let account = state.engine.update_account(apply(current, payload)).await?;
    Ok(Json(views::account(account)))
}

pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_account(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

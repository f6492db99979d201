//! Transactions API endpoints

use api_types::transaction::{
    Details, DoubleEntriesResponse, TransactionList, TransactionNew, TransactionView,
    TransactionsNew, TransactionsResponse,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use engine::{
    AdjustmentCmd, CreateTransactionRequest, DepositCmd, TransactionListFilter, TransferCmd,
    TxMeta, WithdrawalCmd,
};

use crate::{ServerError, server::ServerState, views};

fn meta(details: Details) -> TxMeta {
    TxMeta {
        transaction_date: details.transaction_date.map(|dt| dt.with_timezone(&Utc)),
        title: details.title,
        notes: details.notes,
        extra: details.extra,
        tag_ids: details.tag_ids.into_iter().collect(),
        category_id: details.category_id,
        reference_number: details.reference_number,
        internal_reference_number: details.internal_reference_number,
    }
}

fn request(payload: TransactionNew) -> CreateTransactionRequest {
    match payload {
        TransactionNew::Withdrawal {
            source_account_id,
            source_amount,
            source_currency,
            destination_account_id,
            destination_amount,
            destination_currency,
            fx_source_amount,
            fx_source_currency,
            details,
        } => WithdrawalCmd {
            source_account_id,
            source_amount,
            source_currency,
            destination_account_id,
            destination_amount,
            destination_currency,
            fx_source_amount,
            fx_source_currency,
            meta: meta(details),
        }
        .into(),
        TransactionNew::Deposit {
            destination_account_id,
            destination_amount,
            destination_currency,
            source_account_id,
            source_amount,
            source_currency,
            details,
        } => DepositCmd {
            destination_account_id,
            destination_amount,
            destination_currency,
            source_account_id,
            source_amount,
            source_currency,
            meta: meta(details),
        }
        .into(),
        TransactionNew::Transfer {
            source_account_id,
            source_amount,
            source_currency,
            destination_account_id,
            destination_amount,
            destination_currency,
            details,
        } => TransferCmd {
            source_account_id,
            source_amount,
            source_currency,
            destination_account_id,
            destination_amount,
            destination_currency,
            meta: meta(details),
        }
        .into(),
        TransactionNew::Adjustment {
            destination_account_id,
            destination_amount,
            destination_currency,
            details,
        } => AdjustmentCmd::new(
            destination_account_id,
            destination_amount,
            destination_currency,
            meta(details),
        )
        .into(),
    }
}

pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<TransactionNew>,
) -> Result<(StatusCode, Json<TransactionView>), ServerError> {
    let created = state.engine.create_transaction(request(payload)).await?;
    Ok((StatusCode::CREATED, Json(views::transaction(created))))
}

pub async fn create_bulk(
    State(state): State<ServerState>,
    Json(payload): Json<TransactionsNew>,
) -> Result<(StatusCode, Json<TransactionsResponse>), ServerError> {
    let requests = payload.transactions.into_iter().map(request).collect();
    let created = state
        .engine
        .create_transactions(requests, payload.skip_rules)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(TransactionsResponse {
            transactions: created.into_iter().map(views::transaction).collect(),
        }),
    ))
}

pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<TransactionList>,
) -> Result<Json<TransactionsResponse>, ServerError> {
    let filter = TransactionListFilter {
        from: query.from.map(|dt| dt.with_timezone(&Utc)),
        to: query.to.map(|dt| dt.with_timezone(&Utc)),
        account_id: query.account_id,
        transaction_type: query.transaction_type.map(views::transaction_type),
        limit: Some(query.limit.unwrap_or(50)),
        offset: query.offset,
    };
    let transactions = state.engine.list_transactions(&filter).await?;
    Ok(Json(TransactionsResponse {
        transactions: transactions.into_iter().map(views::transaction).collect(),
    }))
}

pub async fn get(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Json<TransactionView>, ServerError> {
    let tx = state.engine.transaction(id).await?;
    Ok(Json(views::transaction(tx)))
}

pub async fn entries(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> Result<Json<DoubleEntriesResponse>, ServerError> {
    // 404 for unknown ids rather than an empty list.
    state.engine.transaction(id).await?;
    let entries = state.engine.double_entries(id).await?;
    Ok(Json(DoubleEntriesResponse {
        entries: entries.into_iter().map(views::double_entry).collect(),
    }))
}

use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;
use importers::ImportError;

use api_types::ErrorResponse;
pub use server::{ServerState, ops_router, router, run_ops_with_listener, run_with_listener};

mod accounts;
mod currencies;
mod imports;
mod labels;
mod maintenance;
mod rules;
mod server;
mod stats;
mod transactions;
mod views;

pub mod types {
    pub mod account {
        pub use api_types::account::{
            AccountKind, AccountNew, AccountView, AccountsNew, AccountsResponse,
        };
    }

    pub mod currency {
        pub use api_types::currency::{
            CurrenciesResponse, CurrencyNew, CurrencyView, Exchange, ExchangeResponse,
        };
    }

    pub mod transaction {
        pub use api_types::transaction::{
            Details, DoubleEntriesResponse, DoubleEntryView, TransactionKind, TransactionList,
            TransactionNew, TransactionView, TransactionsNew, TransactionsResponse,
        };
    }

    pub mod rule {
        pub use api_types::rule::{
            DryRun, DryRunResponse, RuleNew, RuleView, RulesResponse, ScheduleRuleNew,
            ScheduleRuleView, ScheduleRulesResponse,
        };
    }

    pub mod import {
        pub use api_types::import::{ImportResponse, ImportTransactions};
    }

    pub mod stats {
        pub use api_types::stats::{Snapshot, StatsQuery, StatsResponse};
    }
}

#[derive(Debug)]
pub enum ServerError {
    Engine(EngineError),
    Import(ImportError),
    Generic(String),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Conflict(_) => StatusCode::CONFLICT,
        EngineError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Database(_)
        | EngineError::Internal(_)
        | EngineError::InvariantViolation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        EngineError::MissingField(_)
        | EngineError::InvalidFormat(_)
        | EngineError::BusinessRule(_)
        | EngineError::Script(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "internal server error".to_string()
        }
        EngineError::Internal(msg) => {
            tracing::error!("internal error: {msg}");
            "internal server error".to_string()
        }
        EngineError::InvariantViolation(msg) => {
            tracing::error!("invariant violation: {msg}");
            "internal server error".to_string()
        }
        other => other.to_string(),
    }
}

fn status_for_import_error(err: &ImportError) -> StatusCode {
    match err {
        ImportError::Engine(err) => status_for_engine_error(err),
        ImportError::Conflict(_) => StatusCode::CONFLICT,
        ImportError::Base64(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Import(ImportError::Engine(err)) => {
                (status_for_engine_error(&err), message_for_engine_error(err))
            }
            ServerError::Import(err) => (status_for_import_error(&err), err.to_string()),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}

impl From<ImportError> for ServerError {
    fn from(value: ImportError) -> Self {
        Self::Import(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_not_found_maps_to_404() {
        let res = ServerError::from(EngineError::NotFound("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn engine_conflict_maps_to_409() {
        let res = ServerError::from(EngineError::Conflict("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn engine_validation_maps_to_422() {
        for err in [
            EngineError::MissingField("x".to_string()),
            EngineError::InvalidFormat("x".to_string()),
            EngineError::BusinessRule("x".to_string()),
            EngineError::Script("x".to_string()),
        ] {
            let res = ServerError::from(err).into_response();
            assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn engine_internal_maps_to_500() {
        let res = ServerError::from(EngineError::Internal("x".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn shutdown_maps_to_503() {
        let res = ServerError::from(EngineError::Cancelled).into_response();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn import_engine_error_keeps_engine_status() {
        let err = ImportError::from(EngineError::NotFound("account 3".to_string()));
        let res = ServerError::from(err).into_response();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn import_unknown_source_maps_to_422() {
        let res =
            ServerError::from(ImportError::UnknownSource("mt940".to_string())).into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn generic_maps_to_400() {
        let res = ServerError::Generic("bad".to_string()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}

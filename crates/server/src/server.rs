use axum::{
    Router,
    routing::{get, post},
};

use std::sync::Arc;

use crate::{accounts, currencies, imports, labels, maintenance, rules, stats, transactions};
use engine::Engine;
use importers::{ImportError, ImportService};

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    pub imports: Arc<ImportService>,
}

impl ServerState {
    pub fn new(engine: Arc<Engine>) -> Result<Self, ImportError> {
        let imports = ImportService::new(Arc::clone(&engine))?;
        Ok(Self {
            engine,
            imports: Arc::new(imports),
        })
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Liveness endpoint served on the operations port.
pub fn ops_router() -> Router {
    Router::new().route("/health", get(health))
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/accounts", get(accounts::list).post(accounts::create))
        .route("/accounts/bulk", post(accounts::create_bulk))
        .route(
            "/accounts/{id}",
            get(accounts::get)
                .put(accounts::update)
                .delete(accounts::delete),
        )
        .route(
            "/transactions",
            get(transactions::list).post(transactions::create),
        )
        .route("/transactions/bulk", post(transactions::create_bulk))
        .route("/transactions/{id}", get(transactions::get))
        .route("/transactions/{id}/entries", get(transactions::entries))
        .route(
            "/currencies",
            get(currencies::list).post(currencies::create),
        )
        .route("/currencies/exchange", post(currencies::exchange))
        .route(
            "/currencies/{code}",
            get(currencies::get)
                .put(currencies::update)
                .delete(currencies::delete),
        )
        .route("/rules", get(rules::list).post(rules::create))
        .route("/rules/dry-run", post(rules::dry_run))
        .route(
            "/rules/{id}",
            get(rules::get).put(rules::update).delete(rules::delete),
        )
        .route(
            "/schedule-rules",
            get(rules::list_schedules).post(rules::create_schedule),
        )
        .route(
            "/schedule-rules/{id}",
            get(rules::get_schedule)
                .put(rules::update_schedule)
                .delete(rules::delete_schedule),
        )
        .route("/schedule-rules/{id}/run", post(rules::run_schedule))
        .route("/import", post(imports::import))
        .route("/import/sources", get(imports::sources))
        .route("/tags", get(labels::list_tags).post(labels::create_tag))
        .route(
            "/categories",
            get(labels::list_categories).post(labels::create_category),
        )
        .route("/stats/daily", get(stats::daily))
        .route("/stats/monthly", get(stats::monthly))
        .route("/maintenance/recalculate", post(maintenance::recalculate))
        .route(
            "/maintenance/fix-daily-gaps",
            post(maintenance::fix_daily_gaps),
        )
        .with_state(state)
}

/// Resolves once the engine has been shut down.
async fn engine_stopped(engine: Arc<Engine>) {
    let mut changes = engine.schedule_changes();
    while !engine.is_shut_down() {
        if changes.changed().await.is_err() {
            break;
        }
    }
}

pub async fn run_with_listener(
    state: ServerState,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let engine = Arc::clone(&state.engine);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(engine_stopped(engine))
        .await
}

pub async fn run_ops_with_listener(
    engine: Arc<Engine>,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Ops endpoint listening on {}", addr);

    axum::serve(listener, ops_router())
        .with_graceful_shutdown(engine_stopped(engine))
        .await
}

use std::{sync::Arc, time::Duration};

use engine::{Engine, RuleScheduler};
use migration::{Migrator, MigratorTrait};

mod rates;
mod settings;

type AppError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "kopilka={level},engine={level},importers={level},server={level}",
            level = settings.app.level
        ))
        .init();

    let db = sea_orm::Database::connect(settings.database_url()).await?;
    Migrator::up(&db, None).await?;

    let engine = Arc::new(
        Engine::builder()
            .database(db)
            .base_currency(&settings.currency.base_currency)
            .build()
            .await?,
    );
    engine.bootstrap().await?;

    if let Some(url) = &settings.currency.exchange_rates_url
        && let Err(err) = rates::sync(&engine, url).await
    {
        tracing::error!("exchange rate sync failed: {err}");
    }

    match engine.fix_daily_gaps().await {
        Ok(accounts) => tracing::info!(accounts, "daily gaps fixed"),
        Err(err) => tracing::error!("fixing daily gaps failed: {err}"),
    }

    let bind = settings
        .server
        .bind
        .clone()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let listener = tokio::net::TcpListener::bind((bind.as_str(), settings.server.port)).await?;
    let ops_listener = match settings.server.ops_port {
        Some(port) => Some(tokio::net::TcpListener::bind((bind.as_str(), port)).await?),
        None => None,
    };
    let state = server::ServerState::new(Arc::clone(&engine))?;

    let mut tasks = tokio::task::JoinSet::new();
    tasks.spawn(Arc::new(RuleScheduler::new(Arc::clone(&engine))).run());
    tasks.spawn(fix_gaps_periodically(
        Arc::clone(&engine),
        Duration::from_secs(settings.maintenance.gap_fix_interval_secs.max(1)),
    ));
    tasks.spawn(async move {
        if let Err(err) = server::run_with_listener(state, listener).await {
            tracing::error!("server failed: {err}");
        }
    });
    if let Some(ops_listener) = ops_listener {
        let engine = Arc::clone(&engine);
        tasks.spawn(async move {
            if let Err(err) = server::run_ops_with_listener(engine, ops_listener).await {
                tracing::error!("ops endpoint failed: {err}");
            }
        });
    }
    {
        let engine = Arc::clone(&engine);
        let mut changes = engine.schedule_changes();
        tasks.spawn(async move {
            tokio::select! {
                _ = shutdown_signal() => {
                    tracing::info!("shutdown requested");
                    engine.shutdown();
                }
                _ = async {
                    while !engine.is_shut_down() {
                        if changes.changed().await.is_err() {
                            break;
                        }
                    }
                } => {}
            }
        });
    }

    while tasks.join_next().await.is_some() {
        if engine.is_shut_down() {
            continue;
        }
        // A task ended on its own; bring the rest down with it.
        engine.shutdown();
    }

    tracing::info!("bye");
    Ok(())
}

async fn fix_gaps_periodically(engine: Arc<Engine>, every: Duration) {
    let mut changes = engine.schedule_changes();
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately and startup already fixed gaps.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match engine.fix_daily_gaps().await {
                    Ok(accounts) => tracing::debug!(accounts, "daily gaps fixed"),
                    Err(err) => tracing::error!("fixing daily gaps failed: {err}"),
                }
            }
            changed = changes.changed() => {
                if changed.is_err() || engine.is_shut_down() {
                    break;
                }
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! Account Payment Service - Main Application Entry Point
//!
//! REST API server for accounts and payments. Payments move funds between two
//! accounts of the same currency as one atomic unit of work.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Database**: PostgreSQL with sqlx (async queries), or an in-process store
//! - **Format**: JSON requests/responses, decimal amounts as strings
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment variables
//! 2. Create the ledger store (pool + migrations for PostgreSQL)
//! 3. Build HTTP router
//! 4. Serve on the configured port until SIGINT/SIGTERM

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use payment_ledger::{
    AppState,
    config::{Config, LedgerBackend},
    create_app, db,
    ledger::{LedgerStore, MemoryLedger, PgLedger},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        backend = ?config.ledger_backend,
        overdraft_policy = ?config.overdraft_policy,
        lock_timeout_ms = config.lock_timeout_ms,
        "Configuration loaded"
    );

    match config.ledger_backend {
        LedgerBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres backend")?;

            let pool = db::create_pool(database_url, config.db_max_connections).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");

            let store = PgLedger::new(pool, config.lock_timeout());
            serve(&config, store).await
        }
        LedgerBackend::Memory => {
            tracing::warn!("Using in-memory ledger; state is lost on exit");
            serve(&config, MemoryLedger::new(config.lock_timeout())).await
        }
    }
}

async fn serve<S: LedgerStore + 'static>(config: &Config, store: S) -> anyhow::Result<()> {
    let state = AppState::new(Arc::new(store), config.overdraft_policy);
    let app = create_app(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
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
                tracing::error!(error = %err, "failed to listen for SIGTERM");
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
    tracing::info!("Shutdown signal received");
}

//! Health check endpoint for service monitoring.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::AppError, ledger::LedgerStore};

/// Health check response.
///
/// Returns service status and ledger store connectivity.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status
    pub status: String,

    /// Ledger store backend and connection status
    pub database: String,

    /// Current server timestamp
    pub timestamp: DateTime<Utc>,
}

/// Health check handler.
///
/// # Response (200 OK)
///
/// ```json
/// {
///   "status": "healthy",
///   "database": "postgres: connected",
///   "timestamp": "2025-12-21T19:00:00Z"
/// }
/// ```
///
/// # Response (500 Internal Server Error)
///
/// If the store is unreachable, returns standard error response.
pub async fn health_check<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<HealthResponse>, AppError> {
    state.store.ping().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        database: format!("{}: connected", state.store.name()),
        timestamp: Utc::now(),
    }))
}

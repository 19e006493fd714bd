//! Account payment service.
//!
//! Accounts and payments backed by a ledger store. The only operation with
//! cross-entity invariants is the transfer in `services::transfer_engine`;
//! everything else is thin plumbing around it.

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::ledger::LedgerStore;
use crate::services::transfer_engine::{OverdraftPolicy, TransferEngine};

/// Shared state handed to every handler.
pub struct AppState<S> {
    pub store: Arc<S>,
    pub engine: TransferEngine<S>,
}

impl<S: LedgerStore + 'static> AppState<S> {
    pub fn new(store: Arc<S>, policy: OverdraftPolicy) -> Self {
        let engine = TransferEngine::new(Arc::clone(&store), policy);
        Self { store, engine }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            engine: self.engine.clone(),
        }
    }
}

/// Build the HTTP router over any ledger store.
pub fn create_app<S: LedgerStore + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check::<S>))
        .route(
            "/api/v1/accounts",
            post(handlers::accounts::create_account::<S>),
        )
        .route(
            "/api/v1/accounts/{id}",
            get(handlers::accounts::get_account::<S>),
        )
        .route(
            "/api/v1/payments",
            post(handlers::payments::create_payment::<S>),
        )
        .route(
            "/api/v1/payments/{id}",
            get(handlers::payments::get_payment::<S>),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

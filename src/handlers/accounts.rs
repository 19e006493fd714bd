//! Account HTTP handlers.
//!
//! This module implements the account-related API endpoints:
//! - POST /api/v1/accounts - Create new account
//! - GET /api/v1/accounts/{id} - Get account by ID

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    error::AppError,
    extract::{ApiJson, ApiPath},
    ledger::LedgerStore,
    models::account::{Account, AccountId, CreateAccountRequest},
    services::account_service,
};

/// Create a new account.
///
/// # Request Body
///
/// ```json
/// {
///   "name": "Alice",
///   "balance": "100.00",
///   "currency": "USD"
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: Returns the created account
/// - **Error (400)**: Negative balance, empty name or bad currency code
/// - **Error (500)**: Database error
pub async fn create_account<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    ApiJson(request): ApiJson<CreateAccountRequest>,
) -> Result<(StatusCode, Json<Account>), AppError> {
    let account = account_service::create_account(state.store.as_ref(), request).await?;

    Ok((StatusCode::CREATED, Json(account)))
}

/// Get a specific account by ID.
///
/// # Response
///
/// - **Success (200 OK)**: Returns account details
/// - **Error (404)**: Account not found
pub async fn get_account<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    ApiPath(account_id): ApiPath<AccountId>,
) -> Result<Json<Account>, AppError> {
    let account = account_service::get_account(state.store.as_ref(), account_id).await?;

    Ok(Json(account))
}

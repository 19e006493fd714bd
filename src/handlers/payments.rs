//! Payment HTTP handlers.
//!
//! This module implements payment-related API endpoints:
//! - POST /api/v1/payments - Transfer funds between two accounts
//! - GET /api/v1/payments/{id} - Get payment details

use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    error::AppError,
    extract::{ApiJson, ApiPath},
    ledger::LedgerStore,
    models::payment::{Payment, PaymentId, PaymentRequest},
    services::account_service,
};

/// Transfer funds between two accounts.
///
/// # Request Body
///
/// ```json
/// {
///   "account_id": 1,
///   "to_account_id": 2,
///   "amount": "30.00",
///   "direction": "outgoing"
/// }
/// ```
///
/// `outgoing` debits `account_id`; `incoming` debits `to_account_id`.
///
/// # Atomicity
///
/// Both balances and the payment row are committed in one unit of work.
/// Either all three are visible or none are.
///
/// # Response
///
/// - **Success (201 Created)**: Returns the payment
/// - **Error (400)**: Same account or non-positive amount
/// - **Error (404)**: Either account does not exist
/// - **Error (409)**: Commit conflict, safe to retry
/// - **Error (422)**: Currency mismatch or insufficient balance (strict policy)
/// - **Error (503)**: Account lock timeout, safe to retry
pub async fn create_payment<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    ApiJson(request): ApiJson<PaymentRequest>,
) -> Result<(StatusCode, Json<Payment>), AppError> {
    let payment = state.engine.transfer(request.into()).await?;

    Ok((StatusCode::CREATED, Json(payment)))
}

/// Get payment by ID.
pub async fn get_payment<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    ApiPath(payment_id): ApiPath<PaymentId>,
) -> Result<Json<Payment>, AppError> {
    let payment = account_service::get_payment(state.store.as_ref(), payment_id).await?;

    Ok(Json(payment))
}

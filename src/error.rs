//! Error types and HTTP error response handling.
//!
//! Two layers live here:
//! - `LedgerError`: the closed set of outcomes the ledger store and the
//!   transfer engine can fail with. Callers match on it explicitly.
//! - `AppError`: the HTTP-facing error that wraps `LedgerError` and turns
//!   it into a status code and a JSON body.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::models::account::AccountId;

/// Failure kinds of the ledger store and the transfer engine.
///
/// Every validation kind is raised before any balance is touched. Only
/// `LockTimeout` and `TransactionConflict` are safe to retry; both guarantee
/// the unit of work left no durable effect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Source and destination are the same account.
    #[error("the account value must be different from the to_account value")]
    SameAccount,

    /// Amount is zero or negative (or a starting balance is negative).
    #[error("the amount must be greater than 0")]
    InvalidAmount,

    /// Referenced account or payment does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The two accounts hold different currencies.
    #[error("accounts must be the same currency ({left} != {right})")]
    CurrencyMismatch { left: String, right: String },

    /// Payer would go below zero while the strict overdraft policy is active.
    #[error("not enough balance on account {0}")]
    InsufficientBalance(AccountId),

    /// An account lock could not be acquired within the configured bound.
    #[error("timed out waiting for an account lock")]
    LockTimeout,

    /// The store rejected the commit because of a concurrent write.
    #[error("account payment transaction conflict")]
    TransactionConflict,

    /// Malformed input on the plain create paths.
    #[error("{0}")]
    InvalidRequest(String),

    /// Any other store failure (connection loss, constraint violation, ...).
    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn account_not_found(id: AccountId) -> Self {
        LedgerError::NotFound {
            entity: "account",
            id,
        }
    }

    pub fn payment_not_found(id: i64) -> Self {
        LedgerError::NotFound {
            entity: "payment",
            id,
        }
    }

    /// Whether the caller may safely retry the whole operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::LockTimeout | LedgerError::TransactionConflict
        )
    }

    /// Stable machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::SameAccount => "same_account",
            LedgerError::InvalidAmount => "invalid_amount",
            LedgerError::NotFound { entity: "payment", .. } => "payment_not_found",
            LedgerError::NotFound { .. } => "account_not_found",
            LedgerError::CurrencyMismatch { .. } => "currency_mismatch",
            LedgerError::InsufficientBalance(_) => "insufficient_balance",
            LedgerError::LockTimeout => "lock_timeout",
            LedgerError::TransactionConflict => "transaction_conflict",
            LedgerError::InvalidRequest(_) => "invalid_request",
            LedgerError::Storage(_) => "internal_error",
        }
    }
}

/// Application-wide error type returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Ledger store or transfer engine failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Request body or path could not be parsed.
    #[error("{0}")]
    InvalidRequest(String),
}

/// Convert AppError into an HTTP response.
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Storage failures hide their details from the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Ledger(ref err) => {
                let status = match err {
                    LedgerError::SameAccount
                    | LedgerError::InvalidAmount
                    | LedgerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                    LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
                    LedgerError::CurrencyMismatch { .. } | LedgerError::InsufficientBalance(_) => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    LedgerError::TransactionConflict => StatusCode::CONFLICT,
                    LedgerError::LockTimeout => StatusCode::SERVICE_UNAVAILABLE,
                    LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let message = match err {
                    LedgerError::Storage(_) => "An internal error occurred".to_string(),
                    other => other.to_string(),
                };
                (status, err.code(), message)
            }
            AppError::InvalidRequest(message) => {
                (StatusCode::BAD_REQUEST, "invalid_request", message)
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

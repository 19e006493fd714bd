//! Account data models and API request types.
//!
//! This module defines:
//! - `Account`: Database entity representing an account
//! - `CreateAccountRequest`: Request body for creating accounts

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Account identity as assigned by the store.
pub type AccountId = i64;

/// Represents an account record from the database.
///
/// # Database Table
///
/// Maps to the `account` table.
///
/// # Balance Storage
///
/// Balances are arbitrary-precision decimals (`NUMERIC` in PostgreSQL), never
/// floats. The balance is only ever changed by the transfer engine through
/// signed deltas, so it is not constrained to stay non-negative.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for this account
    pub id: AccountId,

    /// Human-readable name for this account
    pub name: String,

    /// Current balance
    pub balance: Decimal,

    /// Currency code (ISO 4217, 3 letters)
    pub currency: String,

    /// Timestamp when account was created
    pub created_at: DateTime<Utc>,
}

/// Request body for creating a new account.
///
/// # JSON Example
///
/// ```json
/// {
///   "name": "Alice",
///   "balance": "100.00",
///   "currency": "USD"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountRequest {
    /// Name for the new account
    pub name: String,

    /// Starting balance (defaults to 0 if not provided)
    #[serde(default)]
    pub balance: Decimal,

    /// Currency code
    pub currency: String,
}

/// Validated input for the store's create path.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub name: String,
    pub balance: Decimal,
    pub currency: String,
}

impl TryFrom<CreateAccountRequest> for NewAccount {
    type Error = LedgerError;

    /// Rejects a negative starting balance, an empty name, and anything that
    /// is not a three-letter currency code. The currency is upper-cased.
    fn try_from(request: CreateAccountRequest) -> Result<Self, Self::Error> {
        if request.balance < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let name = request.name.trim();
        if name.is_empty() {
            return Err(LedgerError::InvalidRequest(
                "account name must not be empty".to_string(),
            ));
        }

        let currency = request.currency.trim();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LedgerError::InvalidRequest(format!(
                "currency must be a three-letter code, got {currency:?}"
            )));
        }

        Ok(NewAccount {
            name: name.to_string(),
            balance: request.balance,
            currency: currency.to_ascii_uppercase(),
        })
    }
}

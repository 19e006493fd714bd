//! Payment data models and API request types.
//!
//! This module defines:
//! - `Payment`: Immutable ledger entry, one per committed transfer
//! - `Direction`: Which side of the payment is debited
//! - `PaymentRequest` / `TransferIntent`: Caller-supplied transfer input

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::models::account::AccountId;

pub type PaymentId = i64;

/// Marks which of the two referenced accounts pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// `account_id` pays, `to_account_id` receives.
    Outgoing,
    /// `to_account_id` pays, `account_id` receives.
    Incoming,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Outgoing => "outgoing",
            Direction::Incoming => "incoming",
        }
    }
}

impl TryFrom<String> for Direction {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "outgoing" => Ok(Direction::Outgoing),
            "incoming" => Ok(Direction::Incoming),
            other => Err(format!("unknown payment direction: {other}")),
        }
    }
}

/// Represents a payment record from the database.
///
/// # Database Table
///
/// Maps to the `payment` table. Rows are append-only: once committed a
/// payment is never updated or deleted.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub account_id: AccountId,
    pub to_account_id: AccountId,
    /// Always strictly positive
    pub amount: Decimal,
    #[sqlx(try_from = "String")]
    pub direction: Direction,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// The account whose balance this payment decreased.
    pub fn payer(&self) -> AccountId {
        payer_of(self.account_id, self.to_account_id, self.direction)
    }

    /// The account whose balance this payment increased.
    pub fn payee(&self) -> AccountId {
        payee_of(self.account_id, self.to_account_id, self.direction)
    }
}

fn payer_of(account_id: AccountId, to_account_id: AccountId, direction: Direction) -> AccountId {
    match direction {
        Direction::Outgoing => account_id,
        Direction::Incoming => to_account_id,
    }
}

fn payee_of(account_id: AccountId, to_account_id: AccountId, direction: Direction) -> AccountId {
    match direction {
        Direction::Outgoing => to_account_id,
        Direction::Incoming => account_id,
    }
}

/// Request body for creating a payment.
///
/// # JSON Example
///
/// ```json
/// {
///   "account_id": 1,
///   "to_account_id": 2,
///   "amount": "30.00",
///   "direction": "outgoing"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Decimal,
    pub direction: Direction,
}

/// Transfer input before validation. Becomes a `Payment` only if both the
/// validation and the commit succeed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferIntent {
    pub source: AccountId,
    pub destination: AccountId,
    pub amount: Decimal,
    pub direction: Direction,
}

impl TransferIntent {
    /// Shape checks that need no account state, in order: distinct accounts,
    /// then a strictly positive amount.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.source == self.destination {
            return Err(LedgerError::SameAccount);
        }
        if self.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        Ok(())
    }

    pub fn payer(&self) -> AccountId {
        payer_of(self.source, self.destination, self.direction)
    }

    pub fn payee(&self) -> AccountId {
        payee_of(self.source, self.destination, self.direction)
    }

    /// Both account ids in ascending order, the order locks are taken in.
    pub fn lock_order(&self) -> [AccountId; 2] {
        if self.source < self.destination {
            [self.source, self.destination]
        } else {
            [self.destination, self.source]
        }
    }
}

impl From<PaymentRequest> for TransferIntent {
    fn from(request: PaymentRequest) -> Self {
        Self {
            source: request.account_id,
            destination: request.to_account_id,
            amount: request.amount,
            direction: request.direction,
        }
    }
}

/// Payment row as handed to the store, before identity and timestamp are
/// assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Decimal,
    pub direction: Direction,
}

impl From<&TransferIntent> for NewPayment {
    fn from(intent: &TransferIntent) -> Self {
        Self {
            account_id: intent.source,
            to_account_id: intent.destination,
            amount: intent.amount,
            direction: intent.direction,
        }
    }
}

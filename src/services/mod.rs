//! Business logic services.
//!
//! Services contain core business logic separated from HTTP handlers.
//! They own validation and unit-of-work orchestration; persistence goes
//! through the ledger store.

pub mod account_service;
pub mod transfer_engine;

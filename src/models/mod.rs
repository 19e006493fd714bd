//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables.

/// Account model
pub mod account;
/// Payment (ledger entry) model
pub mod payment;

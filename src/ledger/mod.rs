//! Ledger store: owner of persisted account and payment state.
//!
//! The store hands out units of work. Locks taken through
//! `acquire_account_for_update` live exactly as long as the unit that took
//! them and are released by `commit` or `abort`, whichever comes first.
//! Consuming the unit in both keeps every unit ending exactly once.

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::LedgerError;
use crate::models::{
    account::{Account, AccountId, NewAccount},
    payment::{NewPayment, Payment, PaymentId},
};

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open scope of store operations that commits or aborts atomically.
    type UnitOfWork: Send + 'static;

    /// Backend name for logging
    fn name(&self) -> &'static str;

    async fn begin(&self) -> Result<Self::UnitOfWork, LedgerError>;

    /// Read one account and hold its exclusive lock until the unit ends.
    ///
    /// Blocks while another unit holds the same lock, up to the store's lock
    /// timeout, then fails with `LockTimeout`.
    async fn acquire_account_for_update(
        &self,
        unit: &mut Self::UnitOfWork,
        id: AccountId,
    ) -> Result<Account, LedgerError>;

    /// Add a signed delta to a balance. The account must already be locked by
    /// `unit`.
    async fn apply_balance_delta(
        &self,
        unit: &mut Self::UnitOfWork,
        id: AccountId,
        delta: Decimal,
    ) -> Result<(), LedgerError>;

    /// Append an immutable payment row, returning it with identity and
    /// timestamp assigned.
    async fn insert_payment(
        &self,
        unit: &mut Self::UnitOfWork,
        payment: &NewPayment,
    ) -> Result<Payment, LedgerError>;

    /// Fails with `TransactionConflict` when a concurrent write invalidated
    /// the unit; nothing is durable in that case.
    async fn commit(&self, unit: Self::UnitOfWork) -> Result<(), LedgerError>;

    /// Discard every staged effect and release the unit's locks.
    async fn abort(&self, unit: Self::UnitOfWork);

    async fn create_account(&self, account: &NewAccount) -> Result<Account, LedgerError>;

    async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError>;

    async fn get_payment(&self, id: PaymentId) -> Result<Payment, LedgerError>;

    /// Connectivity check used by the health endpoint.
    async fn ping(&self) -> Result<(), LedgerError>;
}

//! In-process ledger store.
//!
//! Each account row carries its own async mutex. A unit of work keeps the
//! owned guards of the rows it acquired and stages new balances and payment
//! rows next to them; nothing reaches the shared tables until `commit`, which
//! publishes all staged effects under one write lock. Dropping the unit (on
//! `abort`, on a failed commit, or on panic) releases every row lock.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::error::LedgerError;
use crate::ledger::LedgerStore;
use crate::models::{
    account::{Account, AccountId, NewAccount},
    payment::{NewPayment, Payment, PaymentId},
};

struct Row {
    account: Account,
    lock: Arc<Mutex<()>>,
}

pub struct MemoryLedger {
    accounts: RwLock<BTreeMap<AccountId, Row>>,
    payments: RwLock<BTreeMap<PaymentId, Payment>>,
    next_account_id: AtomicI64,
    next_payment_id: AtomicI64,
    lock_timeout: Duration,
    fail_next_commit: AtomicBool,
}

/// Unit of work of the in-memory store.
pub struct MemoryUnit {
    locked: BTreeMap<AccountId, OwnedMutexGuard<()>>,
    balances: BTreeMap<AccountId, Decimal>,
    payments: Vec<Payment>,
}

impl MemoryUnit {
    /// Ids of the accounts this unit currently holds, in ascending order.
    pub fn locked_accounts(&self) -> Vec<AccountId> {
        self.locked.keys().copied().collect()
    }
}

impl MemoryLedger {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            accounts: RwLock::new(BTreeMap::new()),
            payments: RwLock::new(BTreeMap::new()),
            next_account_id: AtomicI64::new(1),
            next_payment_id: AtomicI64::new(1),
            lock_timeout,
            fail_next_commit: AtomicBool::new(false),
        }
    }

    /// Make the next `commit` fail with `TransactionConflict`, the way a
    /// serialization failure surfaces from a database.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of committed payment rows.
    pub async fn payment_count(&self) -> usize {
        self.payments.read().await.len()
    }

    async fn committed(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.accounts
            .read()
            .await
            .get(&id)
            .map(|row| row.account.clone())
            .ok_or(LedgerError::account_not_found(id))
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    type UnitOfWork = MemoryUnit;

    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Self::UnitOfWork, LedgerError> {
        Ok(MemoryUnit {
            locked: BTreeMap::new(),
            balances: BTreeMap::new(),
            payments: Vec::new(),
        })
    }

    async fn acquire_account_for_update(
        &self,
        unit: &mut Self::UnitOfWork,
        id: AccountId,
    ) -> Result<Account, LedgerError> {
        if !unit.locked.contains_key(&id) {
            let lock = self
                .accounts
                .read()
                .await
                .get(&id)
                .map(|row| Arc::clone(&row.lock))
                .ok_or(LedgerError::account_not_found(id))?;

            let guard = tokio::time::timeout(self.lock_timeout, lock.lock_owned())
                .await
                .map_err(|_| LedgerError::LockTimeout)?;
            unit.locked.insert(id, guard);
        }

        let mut account = self.committed(id).await?;
        if let Some(staged) = unit.balances.get(&id) {
            account.balance = *staged;
        }
        Ok(account)
    }

    async fn apply_balance_delta(
        &self,
        unit: &mut Self::UnitOfWork,
        id: AccountId,
        delta: Decimal,
    ) -> Result<(), LedgerError> {
        if !unit.locked.contains_key(&id) {
            return Err(LedgerError::Storage(format!(
                "account {id} is not locked by this unit of work"
            )));
        }

        let current = match unit.balances.get(&id) {
            Some(staged) => *staged,
            None => self.committed(id).await?.balance,
        };
        let updated = current
            .checked_add(delta)
            .ok_or_else(|| LedgerError::Storage(format!("balance overflow on account {id}")))?;
        unit.balances.insert(id, updated);
        Ok(())
    }

    async fn insert_payment(
        &self,
        unit: &mut Self::UnitOfWork,
        payment: &NewPayment,
    ) -> Result<Payment, LedgerError> {
        // Same row constraints the SQL schema declares.
        if payment.account_id == payment.to_account_id || payment.amount <= Decimal::ZERO {
            return Err(LedgerError::Storage(
                "payment violates check constraint".to_string(),
            ));
        }

        let row = Payment {
            id: self.next_payment_id.fetch_add(1, Ordering::SeqCst),
            account_id: payment.account_id,
            to_account_id: payment.to_account_id,
            amount: payment.amount,
            direction: payment.direction,
            created_at: Utc::now(),
        };
        unit.payments.push(row.clone());
        Ok(row)
    }

    async fn commit(&self, unit: Self::UnitOfWork) -> Result<(), LedgerError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(LedgerError::TransactionConflict);
        }

        let mut accounts = self.accounts.write().await;
        let mut payments = self.payments.write().await;
        for (id, balance) in &unit.balances {
            if let Some(row) = accounts.get_mut(id) {
                row.account.balance = *balance;
            }
        }
        for payment in unit.payments {
            payments.insert(payment.id, payment);
        }
        Ok(())
    }

    async fn abort(&self, unit: Self::UnitOfWork) {
        drop(unit);
    }

    async fn create_account(&self, account: &NewAccount) -> Result<Account, LedgerError> {
        let created = Account {
            id: self.next_account_id.fetch_add(1, Ordering::SeqCst),
            name: account.name.clone(),
            balance: account.balance,
            currency: account.currency.clone(),
            created_at: Utc::now(),
        };
        self.accounts.write().await.insert(
            created.id,
            Row {
                account: created.clone(),
                lock: Arc::new(Mutex::new(())),
            },
        );
        Ok(created)
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.committed(id).await
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Payment, LedgerError> {
        self.payments
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(LedgerError::payment_not_found(id))
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payment::Direction;
    use rust_decimal_macros::dec;

    async fn seeded(lock_timeout: Duration) -> (MemoryLedger, Account, Account) {
        let ledger = MemoryLedger::new(lock_timeout);
        let a = ledger
            .create_account(&NewAccount {
                name: "A".into(),
                balance: dec!(100.00),
                currency: "USD".into(),
            })
            .await
            .unwrap();
        let b = ledger
            .create_account(&NewAccount {
                name: "B".into(),
                balance: dec!(50.00),
                currency: "USD".into(),
            })
            .await
            .unwrap();
        (ledger, a, b)
    }

    fn new_payment(from: AccountId, to: AccountId) -> NewPayment {
        NewPayment {
            account_id: from,
            to_account_id: to,
            amount: dec!(10),
            direction: Direction::Outgoing,
        }
    }

    #[tokio::test]
    async fn staged_effects_are_invisible_until_commit() {
        let (ledger, a, b) = seeded(Duration::from_secs(1)).await;

        let mut unit = ledger.begin().await.unwrap();
        ledger.acquire_account_for_update(&mut unit, a.id).await.unwrap();
        ledger.acquire_account_for_update(&mut unit, b.id).await.unwrap();
        ledger.apply_balance_delta(&mut unit, a.id, dec!(-10)).await.unwrap();
        ledger.apply_balance_delta(&mut unit, b.id, dec!(10)).await.unwrap();
        let payment = ledger
            .insert_payment(&mut unit, &new_payment(a.id, b.id))
            .await
            .unwrap();

        assert_eq!(ledger.get_account(a.id).await.unwrap().balance, dec!(100.00));
        assert!(ledger.get_payment(payment.id).await.is_err());

        ledger.commit(unit).await.unwrap();

        assert_eq!(ledger.get_account(a.id).await.unwrap().balance, dec!(90.00));
        assert_eq!(ledger.get_account(b.id).await.unwrap().balance, dec!(60.00));
        assert_eq!(ledger.get_payment(payment.id).await.unwrap(), payment);
    }

    #[tokio::test]
    async fn abort_discards_and_releases_locks() {
        let (ledger, a, b) = seeded(Duration::from_millis(50)).await;

        let mut unit = ledger.begin().await.unwrap();
        ledger.acquire_account_for_update(&mut unit, a.id).await.unwrap();
        ledger.apply_balance_delta(&mut unit, a.id, dec!(-99)).await.unwrap();
        ledger.insert_payment(&mut unit, &new_payment(a.id, b.id)).await.unwrap();
        ledger.abort(unit).await;

        assert_eq!(ledger.get_account(a.id).await.unwrap().balance, dec!(100.00));
        assert_eq!(ledger.payment_count().await, 0);

        let mut next = ledger.begin().await.unwrap();
        ledger.acquire_account_for_update(&mut next, a.id).await.unwrap();
        assert_eq!(next.locked_accounts(), vec![a.id]);
    }

    #[tokio::test]
    async fn lock_wait_is_bounded() {
        let (ledger, a, _) = seeded(Duration::from_millis(20)).await;

        let mut holder = ledger.begin().await.unwrap();
        ledger.acquire_account_for_update(&mut holder, a.id).await.unwrap();

        let mut waiter = ledger.begin().await.unwrap();
        let err = ledger
            .acquire_account_for_update(&mut waiter, a.id)
            .await
            .unwrap_err();
        assert_eq!(err, LedgerError::LockTimeout);
        assert!(waiter.locked_accounts().is_empty());
    }

    #[tokio::test]
    async fn reacquire_within_unit_sees_staged_balance() {
        let (ledger, a, _) = seeded(Duration::from_millis(20)).await;

        let mut unit = ledger.begin().await.unwrap();
        ledger.acquire_account_for_update(&mut unit, a.id).await.unwrap();
        ledger.apply_balance_delta(&mut unit, a.id, dec!(-25)).await.unwrap();
        let again = ledger.acquire_account_for_update(&mut unit, a.id).await.unwrap();
        assert_eq!(again.balance, dec!(75.00));
    }

    #[tokio::test]
    async fn delta_requires_lock() {
        let (ledger, a, _) = seeded(Duration::from_millis(20)).await;

        let mut unit = ledger.begin().await.unwrap();
        let err = ledger
            .apply_balance_delta(&mut unit, a.id, dec!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));
    }

    #[tokio::test]
    async fn injected_conflict_leaves_no_trace() {
        let (ledger, a, b) = seeded(Duration::from_millis(20)).await;
        ledger.fail_next_commit();

        let mut unit = ledger.begin().await.unwrap();
        ledger.acquire_account_for_update(&mut unit, a.id).await.unwrap();
        ledger.apply_balance_delta(&mut unit, a.id, dec!(-10)).await.unwrap();
        ledger.insert_payment(&mut unit, &new_payment(a.id, b.id)).await.unwrap();

        assert_eq!(ledger.commit(unit).await, Err(LedgerError::TransactionConflict));
        assert_eq!(ledger.get_account(a.id).await.unwrap().balance, dec!(100.00));
        assert_eq!(ledger.payment_count().await, 0);

        // One-shot: the lock is free again and the next commit goes through.
        let mut unit = ledger.begin().await.unwrap();
        ledger.acquire_account_for_update(&mut unit, a.id).await.unwrap();
        assert!(ledger.commit(unit).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let (ledger, _, _) = seeded(Duration::from_millis(20)).await;
        let mut unit = ledger.begin().await.unwrap();

        assert_eq!(
            ledger.acquire_account_for_update(&mut unit, 404).await,
            Err(LedgerError::account_not_found(404))
        );
        assert_eq!(
            ledger.get_payment(404).await,
            Err(LedgerError::payment_not_found(404))
        );
    }
}

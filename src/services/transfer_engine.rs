//! Transfer engine - moves funds between two accounts as one unit of work.
//!
//! # Process
//!
//! 1. Reject same-account and non-positive transfers (no store access)
//! 2. Begin a unit of work
//! 3. Lock both accounts in ascending id order, whatever their roles
//! 4. Check existence, currency and (strict policy only) payer balance
//! 5. Debit the payer, credit the payee, append the payment row
//! 6. Commit, or abort on any failure
//!
//! Locking by ascending id gives every transfer the same global lock order,
//! so two transfers over the same pair in opposite directions serialize
//! instead of deadlocking.
//!
//! Steps 2-6 run on a spawned task. A caller that drops its future after
//! step 1 does not interrupt a unit of work that already holds locks; the
//! unit still ends in exactly one commit or abort.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::LedgerError;
use crate::ledger::LedgerStore;
use crate::models::payment::{NewPayment, Payment, TransferIntent};

/// What to do when a transfer would leave the payer below zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverdraftPolicy {
    /// Allow it. Matches the historical behavior of the service.
    #[default]
    Permissive,
    /// Reject with `InsufficientBalance`.
    Strict,
}

pub struct TransferEngine<S> {
    store: Arc<S>,
    policy: OverdraftPolicy,
}

impl<S> Clone for TransferEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy,
        }
    }
}

impl<S: LedgerStore + 'static> TransferEngine<S> {
    pub fn new(store: Arc<S>, policy: OverdraftPolicy) -> Self {
        Self { store, policy }
    }

    /// Execute one transfer and return the committed payment.
    ///
    /// # Errors
    ///
    /// - `SameAccount`, `InvalidAmount`: request shape, nothing was opened
    /// - `NotFound`, `CurrencyMismatch`, `InsufficientBalance`: unit aborted
    /// - `LockTimeout`, `TransactionConflict`: unit aborted, safe to retry
    /// - `Storage`: any other store failure
    ///
    /// Retries are left to the caller.
    pub async fn transfer(&self, intent: TransferIntent) -> Result<Payment, LedgerError> {
        if let Err(err) = intent.validate() {
            tracing::warn!(
                source = intent.source,
                destination = intent.destination,
                amount = %intent.amount,
                error = %err,
                "transfer rejected"
            );
            return Err(err);
        }

        let store = Arc::clone(&self.store);
        let policy = self.policy;
        let outcome = tokio::spawn(async move { run_transfer(store.as_ref(), policy, intent).await })
            .await
            .unwrap_or_else(|err| Err(LedgerError::Storage(format!("transfer task failed: {err}"))));

        match &outcome {
            Ok(payment) => tracing::info!(
                backend = self.store.name(),
                payment_id = payment.id,
                payer = payment.payer(),
                payee = payment.payee(),
                amount = %payment.amount,
                "transfer committed"
            ),
            Err(err @ LedgerError::Storage(_)) => tracing::error!(
                backend = self.store.name(),
                source = intent.source,
                destination = intent.destination,
                error = %err,
                "transfer failed"
            ),
            Err(err) => tracing::warn!(
                backend = self.store.name(),
                source = intent.source,
                destination = intent.destination,
                retryable = err.is_retryable(),
                error = %err,
                "transfer aborted"
            ),
        }

        outcome
    }
}

async fn run_transfer<S: LedgerStore>(
    store: &S,
    policy: OverdraftPolicy,
    intent: TransferIntent,
) -> Result<Payment, LedgerError> {
    let mut unit = store.begin().await?;

    match stage_transfer(store, &mut unit, policy, &intent).await {
        Ok(payment) => {
            store.commit(unit).await?;
            Ok(payment)
        }
        Err(err) => {
            store.abort(unit).await;
            Err(err)
        }
    }
}

async fn stage_transfer<S: LedgerStore>(
    store: &S,
    unit: &mut S::UnitOfWork,
    policy: OverdraftPolicy,
    intent: &TransferIntent,
) -> Result<Payment, LedgerError> {
    let [low, high] = intent.lock_order();
    let low = store.acquire_account_for_update(unit, low).await?;
    let high = store.acquire_account_for_update(unit, high).await?;

    let (source, destination) = if low.id == intent.source {
        (low, high)
    } else {
        (high, low)
    };

    if source.currency != destination.currency {
        return Err(LedgerError::CurrencyMismatch {
            left: source.currency,
            right: destination.currency,
        });
    }

    let payer = if source.id == intent.payer() {
        &source
    } else {
        &destination
    };
    if policy == OverdraftPolicy::Strict && payer.balance < intent.amount {
        return Err(LedgerError::InsufficientBalance(payer.id));
    }

    store
        .apply_balance_delta(unit, intent.payer(), -intent.amount)
        .await?;
    store
        .apply_balance_delta(unit, intent.payee(), intent.amount)
        .await?;

    store.insert_payment(unit, &NewPayment::from(intent)).await
}

//! Account and payment lookups and account creation.
//!
//! These paths carry no cross-entity invariant; they validate input and
//! delegate to the ledger store.

use crate::error::LedgerError;
use crate::ledger::LedgerStore;
use crate::models::{
    account::{Account, AccountId, CreateAccountRequest, NewAccount},
    payment::{Payment, PaymentId},
};

/// Create an account with a non-negative starting balance.
///
/// # Errors
///
/// - `InvalidAmount`: starting balance below zero
/// - `InvalidRequest`: empty name or malformed currency code
/// - `Storage`: store failure
pub async fn create_account<S: LedgerStore>(
    store: &S,
    request: CreateAccountRequest,
) -> Result<Account, LedgerError> {
    let new_account = NewAccount::try_from(request).inspect_err(|err| {
        tracing::warn!(error = %err, "create account rejected");
    })?;

    let account = store.create_account(&new_account).await?;
    tracing::info!(account_id = account.id, currency = %account.currency, "account created");

    Ok(account)
}

pub async fn get_account<S: LedgerStore>(store: &S, id: AccountId) -> Result<Account, LedgerError> {
    store.get_account(id).await
}

pub async fn get_payment<S: LedgerStore>(store: &S, id: PaymentId) -> Result<Payment, LedgerError> {
    store.get_payment(id).await
}

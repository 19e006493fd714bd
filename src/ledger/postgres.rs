//! PostgreSQL-backed ledger store.
//!
//! A unit of work is a database transaction. Account locks are row locks
//! taken with `SELECT ... FOR UPDATE` and are released by PostgreSQL when the
//! transaction commits or rolls back. Lock waits are bounded per transaction
//! with `lock_timeout`.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};

use crate::db::DbPool;
use crate::error::LedgerError;
use crate::ledger::LedgerStore;
use crate::models::{
    account::{Account, AccountId, NewAccount},
    payment::{NewPayment, Payment, PaymentId},
};

/// SQLSTATE raised when `lock_timeout` expires.
const LOCK_NOT_AVAILABLE: &str = "55P03";
/// SQLSTATE raised by SERIALIZABLE / REPEATABLE READ conflicts.
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

#[derive(Clone)]
pub struct PgLedger {
    pool: DbPool,
    lock_timeout: Duration,
}

impl PgLedger {
    pub fn new(pool: DbPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }
}

/// Map a driver error onto the ledger taxonomy.
fn classify(err: sqlx::Error) -> LedgerError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some(LOCK_NOT_AVAILABLE) => return LedgerError::LockTimeout,
            Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                return LedgerError::TransactionConflict;
            }
            _ => {}
        }
    }
    LedgerError::Storage(err.to_string())
}

#[async_trait]
impl LedgerStore for PgLedger {
    type UnitOfWork = Transaction<'static, Postgres>;

    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Self::UnitOfWork, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(classify)?;

        // Transaction-local, same as SET LOCAL lock_timeout.
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        Ok(tx)
    }

    async fn acquire_account_for_update(
        &self,
        unit: &mut Self::UnitOfWork,
        id: AccountId,
    ) -> Result<Account, LedgerError> {
        sqlx::query_as::<_, Account>(
            "SELECT id, name, balance, currency, created_at FROM account WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **unit)
        .await
        .map_err(classify)?
        .ok_or(LedgerError::account_not_found(id))
    }

    async fn apply_balance_delta(
        &self,
        unit: &mut Self::UnitOfWork,
        id: AccountId,
        delta: Decimal,
    ) -> Result<(), LedgerError> {
        let updated = sqlx::query("UPDATE account SET balance = balance + $2 WHERE id = $1")
            .bind(id)
            .bind(delta)
            .execute(&mut **unit)
            .await
            .map_err(classify)?
            .rows_affected();

        if updated != 1 {
            return Err(LedgerError::account_not_found(id));
        }
        Ok(())
    }

    async fn insert_payment(
        &self,
        unit: &mut Self::UnitOfWork,
        payment: &NewPayment,
    ) -> Result<Payment, LedgerError> {
        sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payment (account_id, to_account_id, amount, direction)
            VALUES ($1, $2, $3, $4)
            RETURNING id, account_id, to_account_id, amount, direction, created_at
            "#,
        )
        .bind(payment.account_id)
        .bind(payment.to_account_id)
        .bind(payment.amount)
        .bind(payment.direction.as_str())
        .fetch_one(&mut **unit)
        .await
        .map_err(classify)
    }

    async fn commit(&self, unit: Self::UnitOfWork) -> Result<(), LedgerError> {
        unit.commit().await.map_err(classify)
    }

    async fn abort(&self, unit: Self::UnitOfWork) {
        if let Err(err) = unit.rollback().await {
            // The server discards the transaction when the connection goes
            // away, so the locks are gone either way.
            tracing::warn!(error = %err, "rollback failed");
        }
    }

    async fn create_account(&self, account: &NewAccount) -> Result<Account, LedgerError> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO account (name, balance, currency)
            VALUES ($1, $2, $3)
            RETURNING id, name, balance, currency, created_at
            "#,
        )
        .bind(&account.name)
        .bind(account.balance)
        .bind(&account.currency)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn get_account(&self, id: AccountId) -> Result<Account, LedgerError> {
        sqlx::query_as::<_, Account>(
            "SELECT id, name, balance, currency, created_at FROM account WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?
        .ok_or(LedgerError::account_not_found(id))
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Payment, LedgerError> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, account_id, to_account_id, amount, direction, created_at
            FROM payment
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?
        .ok_or(LedgerError::payment_not_found(id))
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(())
    }
}

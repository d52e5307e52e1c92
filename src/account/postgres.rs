//! PostgreSQL account store
//!
//! Row locks are `SELECT ... FOR UPDATE`; an `UPDATE` takes the same lock
//! implicitly. PostgreSQL's own detector picks deadlock victims and reports
//! them as SQLSTATE `40P01`, which [`StoreError`] maps to
//! [`StoreError::DeadlockDetected`].

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use tracing::{debug, info};

use super::error::StoreError;
use super::models::Account;
use super::store::{AccountStore, StoreTx};
use crate::core_types::{AccountId, Balance};
use crate::db::{Database, SafeRow};

const CREATE_ACCOUNTS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id      INT PRIMARY KEY,
        name    TEXT NOT NULL,
        balance BIGINT NOT NULL CHECK (balance >= 0)
    )
"#;

/// Account store backed by the `accounts` table
#[derive(Clone)]
pub struct PgAccountStore {
    db: Database,
}

impl PgAccountStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create the `accounts` table if it does not exist yet (no seeding)
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_ACCOUNTS_TABLE)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.db.pool().begin().await?;
        Ok(Box::new(PgStoreTx { tx }))
    }

    async fn reset_all(&self, seed: &[Account]) -> Result<(), StoreError> {
        // DDL is transactional in PostgreSQL: readers see either the old
        // table or the fully seeded new one.
        let mut tx = self.db.pool().begin().await?;
        sqlx::query("DROP TABLE IF EXISTS accounts")
            .execute(&mut *tx)
            .await?;
        sqlx::query(CREATE_ACCOUNTS_TABLE).execute(&mut *tx).await?;
        for account in seed {
            sqlx::query("INSERT INTO accounts (id, name, balance) VALUES ($1, $2, $3)")
                .bind(account.id)
                .bind(&account.name)
                .bind(account.balance)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!(accounts = seed.len(), "accounts table recreated");
        Ok(())
    }

    async fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query_as::<_, Account>(
            "SELECT id, name, balance FROM accounts ORDER BY id",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }
}

/// Transaction against [`PgAccountStore`]
///
/// Dropping it without commit rolls back (sqlx semantics).
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

impl PgStoreTx {
    async fn read_balance(
        &mut self,
        sql: &'static str,
        account_id: AccountId,
    ) -> Result<Balance, StoreError> {
        let row = sqlx::query(sql)
            .bind(account_id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or(StoreError::AccountNotFound(account_id))?;

        let balance: Option<Balance> = row.try_get_log("balance");
        balance.ok_or_else(|| StoreError::Database("balance column unreadable".to_string()))
    }
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn lock_for_update(&mut self, account_id: AccountId) -> Result<Balance, StoreError> {
        debug!(account_id, "SELECT ... FOR UPDATE");
        self.read_balance(
            "SELECT balance FROM accounts WHERE id = $1 FOR UPDATE",
            account_id,
        )
        .await
    }

    async fn balance(&mut self, account_id: AccountId) -> Result<Balance, StoreError> {
        self.read_balance("SELECT balance FROM accounts WHERE id = $1", account_id)
            .await
    }

    async fn apply_delta(
        &mut self,
        account_id: AccountId,
        delta: Balance,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE accounts SET balance = balance + $1 WHERE id = $2")
            .bind(delta)
            .bind(account_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                let check_violation = e
                    .as_database_error()
                    .is_some_and(|db_err| db_err.is_check_violation());
                if check_violation {
                    StoreError::NegativeBalance(account_id)
                } else {
                    StoreError::from(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AccountNotFound(account_id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

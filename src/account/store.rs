//! Account Store contract
//!
//! A transactional account table with per-row exclusive locks. Both the
//! PostgreSQL store and the in-memory store implement these traits; the
//! transfer engine only ever talks to them through `dyn AccountStore`.

use async_trait::async_trait;

use super::error::StoreError;
use super::models::Account;
use crate::core_types::{AccountId, Balance};

/// Shared handle to an account table
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Start an atomic unit of work
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    /// Atomically replace the entire account set with `seed`
    async fn reset_all(&self, seed: &[Account]) -> Result<(), StoreError>;

    /// Committed snapshot of all accounts, ordered by id
    async fn accounts(&self) -> Result<Vec<Account>, StoreError>;
}

/// One live transaction
///
/// Locks are held until `commit` or `rollback`. Dropping an unfinished
/// transaction rolls it back.
#[async_trait]
pub trait StoreTx: Send {
    /// Block until this transaction holds the exclusive lock on `account_id`,
    /// then return its balance as seen by this transaction.
    ///
    /// Locking a row this transaction already holds returns immediately.
    /// Fails with [`StoreError::DeadlockDetected`] if waiting would close a
    /// lock-wait cycle and this transaction is chosen as the victim.
    async fn lock_for_update(&mut self, account_id: AccountId) -> Result<Balance, StoreError>;

    /// Plain read of the balance as seen by this transaction
    async fn balance(&mut self, account_id: AccountId) -> Result<Balance, StoreError>;

    /// Add `delta` to the balance within this transaction.
    ///
    /// Writing requires the row lock; it is acquired implicitly if not held.
    async fn apply_delta(&mut self, account_id: AccountId, delta: Balance)
    -> Result<(), StoreError>;

    /// Make all changes visible and release every lock
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discard all changes and release every lock
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

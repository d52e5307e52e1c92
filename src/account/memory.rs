//! In-memory account store
//!
//! Models the PostgreSQL contract in-process: a lock table of row holders, a
//! wait-for graph, and a detector that aborts the transaction whose wait
//! would close a cycle. Lock waits are async, so a blocked transaction never
//! parks a runtime thread.
//!
//! ```text
//! tx A holds 1, waits for 2 ──▶ holder of 2 is tx B
//! tx B holds 2, wants 1     ──▶ holder of 1 is tx A, A waits for 2, held by B
//!                               => cycle closed by B: B is the victim
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, warn};

use super::error::StoreError;
use super::models::{Account, seed_accounts};
use super::store::{AccountStore, StoreTx};
use crate::core_types::{AccountId, Balance, TxId};

/// Result of one lock attempt against the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Acquire {
    Granted,
    Wait,
    Deadlock,
}

#[derive(Default)]
struct LockTable {
    rows: BTreeMap<AccountId, Account>,
    /// Row -> transaction holding its exclusive lock
    holders: HashMap<AccountId, TxId>,
    /// Transaction -> row it is blocked on (at most one per transaction)
    waiting: HashMap<TxId, AccountId>,
    next_tx_id: TxId,
}

impl LockTable {
    fn try_acquire(&mut self, tx_id: TxId, account_id: AccountId) -> Result<Acquire, StoreError> {
        if !self.rows.contains_key(&account_id) {
            self.waiting.remove(&tx_id);
            return Err(StoreError::AccountNotFound(account_id));
        }

        match self.holders.get(&account_id) {
            Some(&holder) if holder != tx_id => {
                if self.closes_cycle(tx_id, account_id) {
                    self.waiting.remove(&tx_id);
                    Ok(Acquire::Deadlock)
                } else {
                    self.waiting.insert(tx_id, account_id);
                    Ok(Acquire::Wait)
                }
            }
            _ => {
                self.holders.insert(account_id, tx_id);
                self.waiting.remove(&tx_id);
                Ok(Acquire::Granted)
            }
        }
    }

    /// Would `tx_id` waiting on `wanted` close a cycle in the wait-for graph?
    ///
    /// Each transaction waits on at most one row, so following
    /// holder -> awaited row -> holder visits the whole chain.
    fn closes_cycle(&self, tx_id: TxId, wanted: AccountId) -> bool {
        let mut account_id = wanted;
        let mut visited = HashSet::new();
        while let Some(&holder) = self.holders.get(&account_id) {
            if holder == tx_id {
                return true;
            }
            if !visited.insert(holder) {
                return false;
            }
            match self.waiting.get(&holder) {
                Some(&next) => account_id = next,
                None => return false,
            }
        }
        false
    }

    fn release_all(&mut self, tx_id: TxId) {
        self.holders.retain(|_, holder| *holder != tx_id);
        self.waiting.remove(&tx_id);
    }

    fn committed_balance(&self, account_id: AccountId) -> Result<Balance, StoreError> {
        self.rows
            .get(&account_id)
            .map(|a| a.balance)
            .ok_or(StoreError::AccountNotFound(account_id))
    }
}

struct Shared {
    table: Mutex<LockTable>,
    /// Signalled whenever locks are released
    released: Notify,
    deadlocks: AtomicU64,
}

impl Shared {
    fn table(&self) -> MutexGuard<'_, LockTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, tx_id: TxId) {
        self.table().release_all(tx_id);
        self.released.notify_waiters();
    }
}

/// In-process account store with row locks and deadlock detection
#[derive(Clone)]
pub struct MemoryAccountStore {
    shared: Arc<Shared>,
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryAccountStore {
    /// Create an empty store (call `reset_all` before use)
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                table: Mutex::new(LockTable::default()),
                released: Notify::new(),
                deadlocks: AtomicU64::new(0),
            }),
        }
    }

    /// Create a store already holding the seed accounts
    pub fn seeded() -> Self {
        let store = Self::new();
        store.shared.table().rows = seed_accounts().into_iter().map(|a| (a.id, a)).collect();
        store
    }

    /// Number of transactions aborted by the deadlock detector so far
    pub fn deadlocks_detected(&self) -> u64 {
        self.shared.deadlocks.load(Ordering::Relaxed)
    }

    /// Number of transactions currently blocked on a row lock
    pub fn waiting_transactions(&self) -> usize {
        self.shared.table().waiting.len()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let id = {
            let mut table = self.shared.table();
            table.next_tx_id += 1;
            table.next_tx_id
        };
        Ok(Box::new(MemoryTx {
            id,
            shared: Arc::clone(&self.shared),
            pending: HashMap::new(),
            state: TxState::Active,
        }))
    }

    async fn reset_all(&self, seed: &[Account]) -> Result<(), StoreError> {
        // Like DROP TABLE, wait until no transaction holds a row lock.
        loop {
            let notified = self.shared.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut table = self.shared.table();
                if table.holders.is_empty() {
                    table.rows = seed.iter().cloned().map(|a| (a.id, a)).collect();
                    debug!(accounts = seed.len(), "Memory store reset");
                    return Ok(());
                }
            }
            notified.await;
        }
    }

    async fn accounts(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.shared.table().rows.values().cloned().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Active,
    /// Chosen as deadlock victim; locks already released
    Aborted,
    Finished,
}

/// Transaction against [`MemoryAccountStore`]
pub struct MemoryTx {
    id: TxId,
    shared: Arc<Shared>,
    /// Uncommitted deltas, applied to the rows on commit
    pending: HashMap<AccountId, Balance>,
    state: TxState,
}

impl MemoryTx {
    fn ensure_active(&self) -> Result<(), StoreError> {
        match self.state {
            TxState::Active => Ok(()),
            TxState::Aborted | TxState::Finished => Err(StoreError::TransactionAborted),
        }
    }

    async fn acquire(&mut self, account_id: AccountId) -> Result<(), StoreError> {
        let shared = Arc::clone(&self.shared);
        loop {
            // Register for wake-up before inspecting the table so a release
            // between the check and the await is not lost.
            let notified = shared.released.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let outcome = shared.table().try_acquire(self.id, account_id)?;
            match outcome {
                Acquire::Granted => {
                    debug!(tx_id = self.id, account_id, "Row lock granted");
                    return Ok(());
                }
                Acquire::Deadlock => {
                    shared.deadlocks.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        tx_id = self.id,
                        account_id, "Lock wait would close a cycle, aborting transaction"
                    );
                    self.abort();
                    return Err(StoreError::DeadlockDetected);
                }
                Acquire::Wait => {
                    debug!(tx_id = self.id, account_id, "Waiting for row lock");
                }
            }
            notified.await;
        }
    }

    fn abort(&mut self) {
        self.pending.clear();
        self.state = TxState::Aborted;
        self.shared.release(self.id);
    }

    fn visible_balance(&self, account_id: AccountId) -> Result<Balance, StoreError> {
        let committed = self.shared.table().committed_balance(account_id)?;
        Ok(committed + self.pending.get(&account_id).copied().unwrap_or(0))
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn lock_for_update(&mut self, account_id: AccountId) -> Result<Balance, StoreError> {
        self.ensure_active()?;
        self.acquire(account_id).await?;
        self.visible_balance(account_id)
    }

    async fn balance(&mut self, account_id: AccountId) -> Result<Balance, StoreError> {
        self.ensure_active()?;
        self.visible_balance(account_id)
    }

    async fn apply_delta(
        &mut self,
        account_id: AccountId,
        delta: Balance,
    ) -> Result<(), StoreError> {
        self.ensure_active()?;
        // Writes need the row lock, exactly like an UPDATE.
        self.acquire(account_id).await?;

        let current = self.visible_balance(account_id)?;
        if current + delta < 0 {
            return Err(StoreError::NegativeBalance(account_id));
        }
        *self.pending.entry(account_id).or_insert(0) += delta;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut tx = self;
        tx.ensure_active()?;
        {
            let mut table = tx.shared.table();
            for (account_id, delta) in tx.pending.drain() {
                if let Some(row) = table.rows.get_mut(&account_id) {
                    row.balance += delta;
                }
            }
            table.release_all(tx.id);
        }
        tx.state = TxState::Finished;
        tx.shared.released.notify_waiters();
        debug!(tx_id = tx.id, "Transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        let mut tx = self;
        tx.pending.clear();
        if tx.state == TxState::Active {
            tx.shared.release(tx.id);
        }
        tx.state = TxState::Finished;
        debug!(tx_id = tx.id, "Transaction rolled back");
        Ok(())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if self.state == TxState::Active {
            self.shared.release(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    async fn wait_for_waiters(store: &MemoryAccountStore, n: usize) {
        while store.waiting_transactions() < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_commit_makes_deltas_visible() {
        let store = MemoryAccountStore::seeded();
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.lock_for_update(1).await.unwrap(), 1000);
        tx.apply_delta(1, -100).await.unwrap();
        tx.apply_delta(2, 100).await.unwrap();
        assert_eq!(tx.balance(1).await.unwrap(), 900);

        // Not visible outside the transaction yet
        let snapshot = store.accounts().await.unwrap();
        assert_eq!(snapshot[0].balance, 1000);

        tx.commit().await.unwrap();
        let snapshot = store.accounts().await.unwrap();
        assert_eq!(snapshot[0].balance, 900);
        assert_eq!(snapshot[1].balance, 1100);
    }

    #[tokio::test]
    async fn test_rollback_discards_changes() {
        let store = MemoryAccountStore::seeded();
        let mut tx = store.begin().await.unwrap();
        tx.apply_delta(1, -500).await.unwrap();
        tx.rollback().await.unwrap();

        let snapshot = store.accounts().await.unwrap();
        assert_eq!(snapshot[0].balance, 1000);
    }

    #[tokio::test]
    async fn test_relock_same_row_is_reentrant() {
        let store = MemoryAccountStore::seeded();
        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.lock_for_update(1).await.unwrap(), 1000);
        assert_eq!(tx.lock_for_update(1).await.unwrap(), 1000);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_account() {
        let store = MemoryAccountStore::seeded();
        let mut tx = store.begin().await.unwrap();
        assert_eq!(
            tx.lock_for_update(99).await.unwrap_err(),
            StoreError::AccountNotFound(99)
        );
    }

    #[tokio::test]
    async fn test_negative_balance_rejected() {
        let store = MemoryAccountStore::seeded();
        let mut tx = store.begin().await.unwrap();
        assert_eq!(
            tx.apply_delta(1, -1001).await.unwrap_err(),
            StoreError::NegativeBalance(1)
        );
    }

    #[tokio::test]
    async fn test_waiter_proceeds_after_commit() {
        let store = MemoryAccountStore::seeded();
        let mut holder = store.begin().await.unwrap();
        holder.lock_for_update(1).await.unwrap();
        holder.apply_delta(1, -10).await.unwrap();

        let mut waiter = store.begin().await.unwrap();
        let handle = tokio::spawn(async move {
            let balance = waiter.lock_for_update(1).await;
            (waiter, balance)
        });

        wait_for_waiters(&store, 1).await;
        holder.commit().await.unwrap();

        let (waiter, balance) = handle.await.unwrap();
        // The waiter observes the committed value
        assert_eq!(balance.unwrap(), 990);
        waiter.rollback().await.unwrap();
        assert_eq!(store.waiting_transactions(), 0);
    }

    #[tokio::test]
    async fn test_ab_ba_cycle_aborts_the_closing_transaction() {
        let store = MemoryAccountStore::seeded();
        let mut a = store.begin().await.unwrap();
        let mut b = store.begin().await.unwrap();
        a.lock_for_update(1).await.unwrap();
        a.apply_delta(1, -10).await.unwrap();
        b.lock_for_update(2).await.unwrap();
        b.apply_delta(2, -10).await.unwrap();

        let handle = tokio::spawn(async move {
            let result = a.lock_for_update(2).await;
            (a, result)
        });
        wait_for_waiters(&store, 1).await;

        // b closes the cycle and is the victim
        let err = b.lock_for_update(1).await.unwrap_err();
        assert_eq!(err, StoreError::DeadlockDetected);
        assert_eq!(store.deadlocks_detected(), 1);

        // Victim's writes are gone; a now proceeds
        let (a, result) = handle.await.unwrap();
        assert_eq!(result.unwrap(), 1000);
        assert_eq!(
            b.apply_delta(2, 5).await.unwrap_err(),
            StoreError::TransactionAborted
        );
        b.rollback().await.unwrap();
        a.commit().await.unwrap();

        let snapshot = store.accounts().await.unwrap();
        assert_eq!(snapshot[0].balance, 990);
        assert_eq!(snapshot[1].balance, 1000);
    }

    #[tokio::test]
    async fn test_drop_releases_locks() {
        let store = MemoryAccountStore::seeded();
        {
            let mut tx = store.begin().await.unwrap();
            tx.lock_for_update(1).await.unwrap();
            tx.apply_delta(1, -100).await.unwrap();
        }
        let mut tx = store.begin().await.unwrap();
        let balance = tokio::time::timeout(Duration::from_secs(1), tx.lock_for_update(1))
            .await
            .expect("lock should be free after drop")
            .unwrap();
        assert_eq!(balance, 1000);
    }

    #[tokio::test]
    async fn test_reset_waits_for_lock_holders() {
        let store = MemoryAccountStore::seeded();
        let mut tx = store.begin().await.unwrap();
        tx.apply_delta(1, -100).await.unwrap();

        let reset_store = store.clone();
        let handle = tokio::spawn(async move { reset_store.reset_all(&seed_accounts()).await });
        tokio::task::yield_now().await;
        assert!(!handle.is_finished());

        tx.commit().await.unwrap();
        handle.await.unwrap().unwrap();

        let snapshot = store.accounts().await.unwrap();
        assert_eq!(snapshot, seed_accounts());
    }
}

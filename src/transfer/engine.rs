//! Transfer Engine
//!
//! Runs one transfer as one store transaction under a chosen lock strategy.
//!
//! ```text
//! unsafe:  lock(from) ─ check ─ delay ─ debit(from) ─ lock(to) ─ credit(to) ─ commit
//! safe:    lock(min)  ─ delay ─ lock(max) ─ read(from) ─ check ─ debit ─ credit ─ commit
//! ```
//!
//! # Lock ordering
//!
//! The unsafe strategy locks in request direction, so `1 -> 2` and `2 -> 1`
//! running together can each hold one row while waiting for the other. The
//! store detects the cycle and aborts one of them.
//!
//! The safe strategy always locks the lower id first. Every transaction on the
//! same pair therefore queues on the same first row, and whoever holds it can
//! always obtain the second: a circular wait cannot form.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};
use ulid::Ulid;

use super::error::TransferError;
use super::types::{LockStrategy, TransferOutcome, TransferReceipt, TransferRequest};
use crate::account::{Account, AccountStore, StoreError, StoreTx, seed_accounts};
use crate::core_types::Balance;

/// Default hold delay between taking the first lock and the rest of the work
pub const DEFAULT_HOLD_DELAY: Duration = Duration::from_millis(100);

/// Funds check inside a transaction
enum Funds {
    Sufficient,
    Insufficient { available: Balance },
}

/// Transfer engine over a shared account store
#[derive(Clone)]
pub struct TransferEngine {
    store: Arc<dyn AccountStore>,
    /// Simulated processing time while the first lock is held.
    /// Widens the window in which opposite transfers interleave.
    hold_delay: Duration,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self::with_hold_delay(store, DEFAULT_HOLD_DELAY)
    }

    pub fn with_hold_delay(store: Arc<dyn AccountStore>, hold_delay: Duration) -> Self {
        Self { store, hold_delay }
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    pub fn hold_delay(&self) -> Duration {
        self.hold_delay
    }

    /// Drop all accounts and reinstall the seed set
    pub async fn reset(&self) -> Result<Vec<Account>, TransferError> {
        let seed = seed_accounts();
        self.store.reset_all(&seed).await?;
        info!(store = self.store.name(), "Accounts reset to seed");
        Ok(seed)
    }

    /// Committed snapshot of all accounts
    pub async fn accounts(&self) -> Result<Vec<Account>, TransferError> {
        Ok(self.store.accounts().await?)
    }

    /// Lock sender then receiver, in request order
    pub async fn transfer_unsafe(
        &self,
        req: &TransferRequest,
    ) -> Result<TransferOutcome, TransferError> {
        self.transfer(LockStrategy::Unsafe, req).await
    }

    /// Lock both accounts in ascending id order
    pub async fn transfer_safe(
        &self,
        req: &TransferRequest,
    ) -> Result<TransferOutcome, TransferError> {
        self.transfer(LockStrategy::Safe, req).await
    }

    /// Execute one transfer attempt. No retry on deadlock.
    pub async fn transfer(
        &self,
        strategy: LockStrategy,
        req: &TransferRequest,
    ) -> Result<TransferOutcome, TransferError> {
        if req.amount <= 0 {
            return Err(TransferError::InvalidAmount);
        }

        let transfer_id = Ulid::new();
        debug!(
            transfer_id = %transfer_id,
            strategy = %strategy,
            from = req.from_account,
            to = req.to_account,
            amount = req.amount,
            "Transfer started"
        );

        let mut tx = self.store.begin().await?;
        let steps = match strategy {
            LockStrategy::Unsafe => self.unsafe_steps(tx.as_mut(), req).await,
            LockStrategy::Safe => self.safe_steps(tx.as_mut(), req).await,
        };

        let outcome = match steps {
            Ok(Funds::Insufficient { available }) => {
                tx.rollback().await?;
                TransferOutcome::InsufficientFunds {
                    available,
                    requested: req.amount,
                }
            }
            Ok(Funds::Sufficient) => match tx.commit().await {
                Ok(()) => TransferOutcome::Committed(TransferReceipt {
                    transfer_id,
                    strategy,
                    from_account: req.from_account,
                    to_account: req.to_account,
                    amount: req.amount,
                    timestamp: chrono::Utc::now().timestamp_millis(),
                }),
                Err(StoreError::DeadlockDetected) => TransferOutcome::DeadlockAborted,
                Err(e) => return Err(e.into()),
            },
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(transfer_id = %transfer_id, error = %rollback_err, "Rollback failed");
                }
                match e {
                    StoreError::DeadlockDetected => TransferOutcome::DeadlockAborted,
                    other => return Err(other.into()),
                }
            }
        };

        self.log_outcome(transfer_id, strategy, req, &outcome);
        Ok(outcome)
    }

    async fn unsafe_steps(
        &self,
        tx: &mut dyn StoreTx,
        req: &TransferRequest,
    ) -> Result<Funds, StoreError> {
        let sender_balance = tx.lock_for_update(req.from_account).await?;
        debug!(account_id = req.from_account, "Unsafe lock 1 (sender)");
        if sender_balance < req.amount {
            return Ok(Funds::Insufficient {
                available: sender_balance,
            });
        }

        self.hold().await;

        tx.apply_delta(req.from_account, -req.amount).await?;
        // The receiver lock: taken second, in request direction.
        tx.lock_for_update(req.to_account).await?;
        debug!(account_id = req.to_account, "Unsafe lock 2 (receiver)");
        tx.apply_delta(req.to_account, req.amount).await?;
        Ok(Funds::Sufficient)
    }

    async fn safe_steps(
        &self,
        tx: &mut dyn StoreTx,
        req: &TransferRequest,
    ) -> Result<Funds, StoreError> {
        let (first_id, second_id) = req.lock_order();

        tx.lock_for_update(first_id).await?;
        debug!(account_id = first_id, "Safe lock 1");

        self.hold().await;

        if second_id != first_id {
            tx.lock_for_update(second_id).await?;
            debug!(account_id = second_id, "Safe lock 2");
        }

        // Funds check is by sender, not by lock position.
        let sender_balance = tx.balance(req.from_account).await?;
        if sender_balance < req.amount {
            return Ok(Funds::Insufficient {
                available: sender_balance,
            });
        }

        tx.apply_delta(req.from_account, -req.amount).await?;
        tx.apply_delta(req.to_account, req.amount).await?;
        Ok(Funds::Sufficient)
    }

    async fn hold(&self) {
        if !self.hold_delay.is_zero() {
            tokio::time::sleep(self.hold_delay).await;
        }
    }

    fn log_outcome(
        &self,
        transfer_id: Ulid,
        strategy: LockStrategy,
        req: &TransferRequest,
        outcome: &TransferOutcome,
    ) {
        match (outcome, strategy) {
            (TransferOutcome::DeadlockAborted, LockStrategy::Unsafe) => error!(
                transfer_id = %transfer_id,
                from = req.from_account,
                to = req.to_account,
                "DEADLOCK DETECTED! The transaction was killed."
            ),
            (TransferOutcome::DeadlockAborted, LockStrategy::Safe) => error!(
                transfer_id = %transfer_id,
                from = req.from_account,
                to = req.to_account,
                "Deadlock under ordered locking: lock-order invariant violated"
            ),
            (TransferOutcome::InsufficientFunds { available, requested }, _) => info!(
                transfer_id = %transfer_id,
                strategy = %strategy,
                available,
                requested,
                "Transfer rejected: insufficient funds"
            ),
            (TransferOutcome::Committed(_), _) => info!(
                transfer_id = %transfer_id,
                strategy = %strategy,
                from = req.from_account,
                to = req.to_account,
                amount = req.amount,
                "Transfer committed"
            ),
        }
    }
}

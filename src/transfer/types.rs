//! Transfer request / outcome types

use serde::{Deserialize, Serialize};
use ulid::Ulid;
use utoipa::ToSchema;
use validator::Validate;

use crate::core_types::{AccountId, Balance};

/// Lock acquisition strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LockStrategy {
    /// Sender first, then receiver (request order)
    Unsafe,
    /// Ascending account id, independent of direction
    Safe,
}

impl LockStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockStrategy::Unsafe => "unsafe",
            LockStrategy::Safe => "safe",
        }
    }
}

impl std::fmt::Display for LockStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LockStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unsafe" => Ok(LockStrategy::Unsafe),
            "safe" => Ok(LockStrategy::Safe),
            other => Err(format!("Unknown lock strategy: {}", other)),
        }
    }
}

/// Transfer request
///
/// `from_account == to_account` is allowed (self-transfer, net zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
pub struct TransferRequest {
    #[schema(example = 1)]
    pub from_account: AccountId,
    #[schema(example = 2)]
    pub to_account: AccountId,
    #[validate(range(min = 1, message = "amount must be positive"))]
    #[schema(example = 100)]
    pub amount: Balance,
}

impl TransferRequest {
    pub fn new(from_account: AccountId, to_account: AccountId, amount: Balance) -> Self {
        Self {
            from_account,
            to_account,
            amount,
        }
    }

    /// Accounts in canonical lock order: (lower id, higher id)
    pub fn lock_order(&self) -> (AccountId, AccountId) {
        (
            self.from_account.min(self.to_account),
            self.from_account.max(self.to_account),
        )
    }

    pub fn is_self_transfer(&self) -> bool {
        self.from_account == self.to_account
    }
}

/// Record of a committed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransferReceipt {
    #[schema(value_type = String, example = "01HZX3J6N2M8Q4R7T9V0W1Y2Z3")]
    pub transfer_id: Ulid,
    pub strategy: LockStrategy,
    pub from_account: AccountId,
    pub to_account: AccountId,
    pub amount: Balance,
    /// Commit time, ms since epoch
    pub timestamp: i64,
}

/// Result of one transfer attempt
///
/// Every variant is a normal, expected result of running a transaction;
/// infrastructure failures travel as [`TransferError`](super::TransferError).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Committed(TransferReceipt),
    /// Sender balance below the requested amount; nothing was written
    InsufficientFunds { available: Balance, requested: Balance },
    /// The store aborted the transaction to break a lock-wait cycle;
    /// nothing was written
    DeadlockAborted,
}

impl TransferOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, TransferOutcome::Committed(_))
    }

    pub fn is_deadlock(&self) -> bool {
        matches!(self, TransferOutcome::DeadlockAborted)
    }

    /// Short label used in logs and tallies
    pub fn label(&self) -> &'static str {
        match self {
            TransferOutcome::Committed(_) => "success",
            TransferOutcome::InsufficientFunds { .. } => "insufficient_funds",
            TransferOutcome::DeadlockAborted => "deadlock",
        }
    }
}

//! Account store error types

use thiserror::Error;

use crate::core_types::AccountId;

/// SQLSTATE raised by PostgreSQL when its detector aborts a deadlock victim
pub const PG_DEADLOCK_DETECTED: &str = "40P01";

/// Failures surfaced by an [`AccountStore`](super::AccountStore) transaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store broke a lock-wait cycle by aborting this transaction.
    /// All of its writes are rolled back and its locks released.
    #[error("Deadlock detected: transaction aborted by the store")]
    DeadlockDetected,

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Balance of account {0} would become negative")]
    NegativeBalance(AccountId),

    /// Statement issued on a transaction the store has already aborted
    #[error("Transaction already aborted")]
    TransactionAborted,

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn is_deadlock(&self) -> bool {
        matches!(self, StoreError::DeadlockDetected)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error()
            && db_err.code().as_deref() == Some(PG_DEADLOCK_DETECTED)
        {
            return StoreError::DeadlockDetected;
        }
        StoreError::Database(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_sqlx_error_is_generic() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(_)));
        assert!(!err.is_deadlock());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            StoreError::AccountNotFound(7).to_string(),
            "Account not found: 7"
        );
        assert!(StoreError::DeadlockDetected.is_deadlock());
    }
}

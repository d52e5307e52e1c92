//! Transfer Error Types
//!
//! Infrastructure and validation failures. Business results (insufficient
//! funds, deadlock abort) are [`TransferOutcome`](super::TransferOutcome)
//! variants instead.

use thiserror::Error;

use crate::account::StoreError;
use crate::core_types::AccountId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Store error: {0}")]
    Store(String),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::Store(_) => "STORE_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::InvalidAmount => 400,
            TransferError::AccountNotFound(_) => 404,
            TransferError::Store(_) => 500,
        }
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AccountNotFound(id) => TransferError::AccountNotFound(id),
            other => TransferError::Store(other.to_string()),
        }
    }
}

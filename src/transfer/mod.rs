//! Transfer execution
//!
//! Moves funds between two accounts inside one store transaction, under one of
//! two lock acquisition strategies.
//!
//! # Strategies
//!
//! | Strategy | Lock order                 | Concurrent opposite transfers |
//! |----------|----------------------------|-------------------------------|
//! | unsafe   | sender, then receiver      | may deadlock (AB-BA)          |
//! | safe     | ascending account id       | cannot deadlock               |
//!
//! # Safety Invariants
//!
//! 1. **Locked writes**: every balance write happens under the row's exclusive lock
//! 2. **All-or-nothing**: insufficient funds and deadlock aborts leave no partial debit/credit
//! 3. **No hidden retry**: a deadlock abort is reported to the caller as is

pub mod engine;
pub mod error;
pub mod types;


// Re-exports for convenience
pub use engine::{DEFAULT_HOLD_DELAY, TransferEngine};
pub use error::TransferError;
pub use types::{LockStrategy, TransferOutcome, TransferReceipt, TransferRequest};

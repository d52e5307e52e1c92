//! Account store
//!
//! The account table is the only shared mutable resource. Every mutation
//! happens inside a [`StoreTx`] holding the row's exclusive lock.

pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

// Re-export commonly used types
pub use error::StoreError;
pub use memory::MemoryAccountStore;
pub use models::{Account, SEED_BALANCE, seed_accounts, total_balance};
pub use postgres::PgAccountStore;
pub use store::{AccountStore, StoreTx};

// Re-export Database from top-level db module
pub use crate::db::Database;

//! Deadlock Bank - lock ordering under concurrent transfers
//!
//! Fund transfers between row-locked accounts, executed under two lock
//! acquisition strategies: request order (deadlock-prone) and ascending
//! account id (deadlock-free).
//!
//! # Modules
//!
//! - [`core_types`] - Core type definitions (AccountId, Balance, TxId)
//! - [`account`] - Account store contract, PostgreSQL and in-memory stores
//! - [`transfer`] - Transfer engine (unsafe / safe strategies)
//! - [`gateway`] - HTTP API (axum)
//! - [`harness`] - Concurrent load client
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup

// Core types - must be first!
pub mod core_types;

pub mod account;
pub mod app;
pub mod config;
pub mod db;
pub mod gateway;
pub mod harness;
pub mod logging;
pub mod transfer;

// Convenient re-exports at crate root
pub use account::{Account, AccountStore, MemoryAccountStore, PgAccountStore, StoreError};
pub use core_types::{AccountId, Balance};
pub use transfer::{
    LockStrategy, TransferEngine, TransferError, TransferOutcome, TransferReceipt, TransferRequest,
};

//! Core types used throughout the system
//!
//! These are fundamental type aliases shared by the store, the engine and the gateway.

/// Account ID - positive, unique, immutable after seeding.
///
/// # Usage:
/// - Primary key of the `accounts` table
/// - Defines the canonical lock order (ascending)
pub type AccountId = i32;

/// Balance - unit-less integer amount.
///
/// Never negative in a committed state.
pub type Balance = i64;

/// In-memory transaction ID
pub type TxId = u64;

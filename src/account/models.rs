//! Account data model

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core_types::{AccountId, Balance};

/// Starting balance of every seeded account
pub const SEED_BALANCE: Balance = 1000;

/// A single account row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Account {
    #[schema(example = 1)]
    pub id: AccountId,
    /// Display label only, never used for logic
    #[schema(example = "Alice")]
    pub name: String,
    #[schema(example = 1000)]
    pub balance: Balance,
}

impl Account {
    pub fn new(id: AccountId, name: impl Into<String>, balance: Balance) -> Self {
        Self {
            id,
            name: name.into(),
            balance,
        }
    }
}

/// The fixed seed set installed by every reset: Alice (1) and Bob (2) with 1000 each.
pub fn seed_accounts() -> Vec<Account> {
    vec![
        Account::new(1, "Alice", SEED_BALANCE),
        Account::new(2, "Bob", SEED_BALANCE),
    ]
}

/// Sum of all balances in a snapshot
pub fn total_balance(accounts: &[Account]) -> Balance {
    accounts.iter().map(|a| a.balance).sum()
}

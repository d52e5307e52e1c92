pub mod account;
pub mod health;
pub mod transfer;

pub use account::{list_accounts, reset};
pub use health::{HealthResponse, health_check};
pub use transfer::{transfer_safe, transfer_unsafe};


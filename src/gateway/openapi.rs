//! OpenAPI Documentation
//!
//! Auto-generated OpenAPI 3.0 document for the transfer API.
//!
//! - OpenAPI JSON: `http://localhost:8000/api-docs/openapi.json`

use utoipa::OpenApi;

use crate::account::Account;
use crate::gateway::handlers::HealthResponse;
use crate::gateway::types::{AccountsResponseData, ResetResponseData, TransferResponseData};
use crate::transfer::{LockStrategy, TransferReceipt, TransferRequest};

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Deadlock Bank API",
        version = "1.0.0",
        description = "Concurrent transfers between row-locked accounts: unordered locking (deadlock-prone) vs. ascending-id locking.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8000", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        crate::gateway::handlers::account::reset,
        crate::gateway::handlers::account::list_accounts,
        crate::gateway::handlers::transfer::transfer_unsafe,
        crate::gateway::handlers::transfer::transfer_safe,
    ),
    components(
        schemas(
            HealthResponse,
            Account,
            AccountsResponseData,
            ResetResponseData,
            TransferRequest,
            TransferReceipt,
            TransferResponseData,
            LockStrategy,
        )
    ),
    tags(
        (name = "System", description = "Health"),
        (name = "Accounts", description = "Seeding and balances"),
        (name = "Transfer", description = "Fund transfers under each lock strategy"),
    )
)]
pub struct ApiDoc;

//! Account handlers: reset and listing

use std::sync::Arc;

use axum::extract::State;

use super::super::state::AppState;
use super::super::types::{
    AccountsResponseData, ApiError, ApiResult, ResetResponseData, ok,
};

/// Reset endpoint
///
/// POST /reset
///
/// Drops every account and reseeds Alice (1) and Bob (2) with 1000 each.
#[utoipa::path(
    post,
    path = "/reset",
    responses(
        (status = 200, description = "Accounts reseeded", body = ResetResponseData),
        (status = 500, description = "Store failure")
    ),
    tag = "Accounts"
)]
pub async fn reset(State(state): State<Arc<AppState>>) -> ApiResult<ResetResponseData> {
    let accounts = state.engine.reset().await.map_err(|e| {
        tracing::error!("Reset failed: {}", e);
        ApiError::internal(e.to_string())
    })?;

    ok(ResetResponseData {
        message: "Database reset. Alice (1) and Bob (2) have $1000.".to_string(),
        accounts,
    })
}

/// List accounts
///
/// GET /accounts
#[utoipa::path(
    get,
    path = "/accounts",
    responses(
        (status = 200, description = "Committed balances", body = AccountsResponseData),
        (status = 500, description = "Store failure")
    ),
    tag = "Accounts"
)]
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
) -> ApiResult<AccountsResponseData> {
    let accounts = state
        .engine
        .accounts()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    ok(AccountsResponseData { accounts })
}

//! Transfer handlers (unordered and ordered locking)

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, TransferResponseData, error_codes, ok};
use crate::transfer::{LockStrategy, TransferError, TransferOutcome, TransferRequest};

/// Unordered transfer endpoint
///
/// POST /transfer/unsafe
///
/// Locks sender first, then receiver. Concurrent opposite-direction
/// transfers can deadlock; the aborted one gets a 500.
#[utoipa::path(
    post,
    path = "/transfer/unsafe",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Transfer committed", body = TransferResponseData),
        (status = 400, description = "Insufficient funds or invalid amount"),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Deadlock detected, transaction aborted")
    ),
    tag = "Transfer"
)]
pub async fn transfer_unsafe(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TransferRequest>,
) -> ApiResult<TransferResponseData> {
    execute(&state, LockStrategy::Unsafe, req).await
}

/// Ordered transfer endpoint
///
/// POST /transfer/safe
///
/// Locks both accounts in ascending id order. A deadlock here means the
/// ordering invariant was broken.
#[utoipa::path(
    post,
    path = "/transfer/safe",
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Transfer committed", body = TransferResponseData),
        (status = 400, description = "Insufficient funds or invalid amount"),
        (status = 404, description = "Account not found"),
        (status = 500, description = "Deadlock detected (invariant violation)")
    ),
    tag = "Transfer"
)]
pub async fn transfer_safe(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TransferRequest>,
) -> ApiResult<TransferResponseData> {
    execute(&state, LockStrategy::Safe, req).await
}

async fn execute(
    state: &AppState,
    strategy: LockStrategy,
    req: TransferRequest,
) -> ApiResult<TransferResponseData> {
    req.validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    match state.engine.transfer(strategy, &req).await {
        Ok(TransferOutcome::Committed(receipt)) => {
            let msg = match strategy {
                LockStrategy::Unsafe => "Transfer complete",
                LockStrategy::Safe => "Safe Transfer complete",
            };
            ok(TransferResponseData {
                status: "success".to_string(),
                msg: msg.to_string(),
                receipt,
            })
        }
        Ok(TransferOutcome::InsufficientFunds { .. }) => ApiError::new(
            StatusCode::BAD_REQUEST,
            error_codes::INSUFFICIENT_FUNDS,
            "Insufficient funds",
        )
        .into_err(),
        Ok(TransferOutcome::DeadlockAborted) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::DEADLOCK_DETECTED,
            "Deadlock detected! The database killed this request to save itself.",
        )
        .into_err(),
        Err(e) => Err(transfer_error(e)),
    }
}

fn transfer_error(e: TransferError) -> ApiError {
    match e {
        TransferError::InvalidAmount => ApiError::bad_request(e.to_string()),
        TransferError::AccountNotFound(_) => ApiError::not_found(e.to_string()),
        TransferError::Store(_) => {
            tracing::error!("Transfer failed: {}", e);
            ApiError::internal(e.to_string())
        }
    }
}

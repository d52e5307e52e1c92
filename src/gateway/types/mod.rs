//! Gateway types module
//!
//! - [`ApiResponse<T>`]: Unified API response wrapper
//! - [`ApiError`] / [`ApiResult`]: Error responses with HTTP status
//! - [`error_codes`]: Envelope error codes
//!
//! Request bodies reuse [`TransferRequest`](crate::transfer::TransferRequest)
//! directly; it carries its own `validator` rules.

pub mod response;

// Re-export commonly used types at module root
pub use response::{
    AccountsResponseData, ApiError, ApiResponse, ApiResult, ResetResponseData,
    TransferResponseData, error_codes, ok,
};

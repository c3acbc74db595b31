//! Shared service library
//!
//! Provides functions shared by all services, including:
//! - logging initialization and HTTP access logging
//! - standard API response envelopes
//! - serde helpers for request parsing
//! - graceful shutdown signal handling

pub mod api_types;
pub mod logging;
pub mod serde_helpers;
pub mod shutdown;

#[cfg(feature = "axum")]
pub use api_types::AppError;
pub use api_types::{ErrorInfo, ErrorResponse, SuccessResponse};
pub use logging::LogConfig;

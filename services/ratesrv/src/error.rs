//! Engine error to HTTP error mapping

use common::AppError;
use shipping_rates::RateError;
use tracing::{error, warn};

/// Convert an engine failure into the shared error envelope
///
/// Caller mistakes keep their message; server-side failures are logged at
/// error level and reported with the cause in `details`.
pub fn rate_error(err: RateError) -> AppError {
    let status = err.status_code();
    if err.is_client_error() {
        warn!("Rejected shipping request: {}", err);
        return AppError::from_status(status, err.to_string());
    }

    error!("Shipping rate lookup failed: {}", err);
    let message = if err.is_configuration() {
        "Shipping rates are not configured"
    } else {
        "Failed to load shipping rates"
    };
    AppError::from_status(status, message).with_details(err.to_string())
}

use tracing::error;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Records an unexpected 5xx with enough context to find it in the logs.
pub fn capture_unexpected_5xx(
    path: &str,
    method: &str,
    status: u16,
    request_id: &str,
) -> AppResult<Uuid> {
    if !(500..=599).contains(&status) {
        return Err(AppError::BadRequest(
            "capture_unexpected_5xx requires an HTTP 5xx status".to_string(),
        ));
    }

    let event_id = Uuid::new_v4();
    error!(
        tracking_backend = "log",
        event_id = %event_id,
        request_id = %request_id,
        method = %method,
        path = %path,
        status = status,
        "unexpected server error"
    );
    Ok(event_id)
}

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::{AppError, AppResult};

/// Upper bound applied to every store call made by the chat services.
///
/// A call that overruns is abandoned and surfaces as a retryable
/// `ServiceUnavailable`. Multi-statement writes run inside a transaction, so
/// dropping the future rolls them back.
#[derive(Debug, Clone, Copy)]
pub struct StoreDeadline {
    timeout: Duration,
}

impl StoreDeadline {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run<T, F>(&self, operation: &'static str, future: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "store operation timed out"
                );
                Err(AppError::store_timeout(operation))
            }
        }
    }
}

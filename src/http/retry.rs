//! Retry policy and HTTP status classification for artifact downloads.

use reqwest::StatusCode;
use std::time::Duration;

/// Maximum number of attempts for one download.
pub const MAX_RETRIES: usize = 3;

/// Delay between retry attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_RETRIES,
            delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Errors that should not be retried.
#[derive(Debug, PartialEq)]
pub enum NonRetryableError {
    /// Resource not found (HTTP 404)
    NotFound,
    /// Other client errors that won't succeed on retry
    ClientError(StatusCode),
}

impl std::fmt::Display for NonRetryableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NonRetryableError::NotFound => write!(f, "HTTP 404 Not Found"),
            NonRetryableError::ClientError(status) => write!(f, "HTTP {}", status),
        }
    }
}

impl std::error::Error for NonRetryableError {}

/// Classifies a response status.
/// Returns Ok(()) for statuses worth retrying (5xx), Err for client errors.
pub fn classify_status(status: StatusCode) -> Result<(), NonRetryableError> {
    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => Err(NonRetryableError::NotFound),
        // 408 and 429 may succeed later
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => Ok(()),
        s if s.is_client_error() => Err(NonRetryableError::ClientError(s)),
        _ => Ok(()),
    }
}

/// Checks if an error from `error_for_status()` should be retried.
/// Returns the original error if retryable, or a NonRetryableError if not.
pub fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    match error.status().map(classify_status) {
        Some(Err(non_retryable)) => anyhow::Error::from(non_retryable),
        _ => anyhow::Error::from(error),
    }
}

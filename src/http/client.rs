//! HTTP client with built-in retry logic and error handling.

use anyhow::{Context, Result};
use log::{debug, warn};
use reqwest::Client;

use super::retry::{NonRetryableError, RetryPolicy, check_retryable};

/// Upper bound on the buffer reserved up front from `Content-Length`.
const MAX_PREALLOC_BYTES: u64 = 64 * 1024 * 1024;

/// HTTP client with built-in retry logic for network operations.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    policy: RetryPolicy,
}

impl HttpClient {
    /// Creates a new HTTP client wrapping the given reqwest Client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns a reference to the underlying reqwest Client.
    #[cfg(test)]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Downloads the body at `url` into memory.
    /// Transient failures are retried; 4xx responses are not.
    #[tracing::instrument(skip(self))]
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Downloading {}...", url);

        self.with_retry("download", || self.get_bytes_once(url))
            .await
    }

    /// Single download attempt without retry.
    async fn get_bytes_once(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to start download request")?;

        let mut response = response.error_for_status().map_err(check_retryable)?;

        let capacity = response
            .content_length()
            .map_or(0, |len| len.min(MAX_PREALLOC_BYTES) as usize);
        let mut body = Vec::with_capacity(capacity);
        while let Some(chunk) = response
            .chunk()
            .await
            .context("Failed to read chunk from download stream")?
        {
            body.extend_from_slice(&chunk);
        }

        debug!("Downloaded {:.2} MB", body.len() as f64 / (1024.0 * 1024.0));

        Ok(body)
    }

    /// Executes an async operation with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !is_retryable_error(&e) {
                        debug!("{}: non-retryable error: {}", operation_name, e);
                        return Err(e);
                    }
                    if attempt >= max_attempts {
                        return Err(e.context(format!(
                            "{}: failed after {} attempt(s)",
                            operation_name, attempt
                        )));
                    }

                    warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {}ms...",
                        operation_name,
                        attempt,
                        max_attempts,
                        e,
                        self.policy.delay.as_millis()
                    );
                    tokio::time::sleep(self.policy.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Checks if an anyhow::Error is retryable based on its content.
fn is_retryable_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<NonRetryableError>().is_none()
}

//! Resilience utilities for connectors
//!
//! Provides timeout and retry patterns for the HTTP transport. This is the
//! only recovery the connectors perform: callers above the transport see a
//! single success or a single failure per request.

use crate::error::ConnectorError;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Default request timeout
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default max retries for transient failures
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default base delay between retries
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Resilience configuration for a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResilienceConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each retry)
    pub retry_base_delay_ms: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

impl ResilienceConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get retry delay for attempt N (exponential backoff)
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.retry_base_delay_ms * (1 << attempt.min(6)); // cap at 64x
        Duration::from_millis(delay_ms)
    }
}

/// Execute a request with timeout and retry logic
///
/// Errors for which [`ConnectorError::is_retryable`] is false end the loop
/// immediately as [`RetryError::Permanent`].
pub async fn execute_with_retry<F, Fut, T>(
    config: &ResilienceConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ConnectorError>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = config.retry_delay(attempt - 1);
            debug!(
                operation = operation_name,
                attempt,
                delay_ms = delay.as_millis(),
                "retrying after delay"
            );
            tokio::time::sleep(delay).await;
        }

        match timeout(config.timeout(), operation()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if !e.is_retryable() => return Err(RetryError::Permanent(e)),
            Ok(Err(e)) => {
                if attempt < config.max_retries {
                    debug!(
                        operation = operation_name,
                        attempt,
                        error = %e,
                        "request failed, will retry"
                    );
                }
                last_error = Some(e.to_string());
            }
            Err(_) => {
                if attempt < config.max_retries {
                    debug!(
                        operation = operation_name,
                        attempt,
                        timeout_secs = config.timeout_secs,
                        "request timed out, will retry"
                    );
                }
                last_error = Some("request timed out".to_string());
            }
        }
    }

    Err(RetryError::Exhausted {
        attempts: config.max_retries + 1,
        last_error: last_error.unwrap_or_else(|| "unknown error".to_string()),
    })
}

/// Error from retry operation
#[derive(Debug)]
pub enum RetryError {
    /// All retry attempts exhausted
    Exhausted { attempts: u32, last_error: String },
    /// Non-retryable error
    Permanent(ConnectorError),
}

impl std::fmt::Display for RetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryError::Exhausted {
                attempts,
                last_error,
            } => {
                write!(f, "failed after {} attempts: {}", attempts, last_error)
            }
            RetryError::Permanent(e) => write!(f, "permanent error: {}", e),
        }
    }
}

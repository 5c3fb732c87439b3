//! Retry with exponential backoff for transient upstream errors
//!
//! The delay before attempt `n + 1` is `2^n` backoff units, so with the
//! default one-second unit a request waits 2s and then 4s. Nothing waits
//! before the first attempt.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};

use crate::error::{EngineError, Result};

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Base unit the `2^n` delays are measured in
    pub backoff_unit: Duration,

    /// Upper bound for a single delay
    pub max_interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
            max_interval: Duration::from_secs(60),
        }
    }
}

impl fmt::Display for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RetryConfig {{ max_attempts: {}, backoff_unit: {:?}, max_interval: {:?} }}",
            self.max_attempts, self.backoff_unit, self.max_interval
        )
    }
}

/// Executor for retry operations with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new retry executor with the specified configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    fn backoff(&self) -> ExponentialBackoff {
        let first = self.config.backoff_unit * 2;
        let mut backoff = ExponentialBackoff {
            current_interval: first,
            initial_interval: first,
            multiplier: 2.0,
            randomization_factor: 0.0,
            max_interval: self.config.max_interval,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };
        backoff.reset();
        backoff
    }

    /// Execute a fallible operation, retrying errors that report themselves retryable
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with(operation, EngineError::is_retryable).await
    }

    /// Execute a fallible operation, retrying while `should_retry` accepts the error
    pub async fn execute_with<F, Fut, T, P>(&self, mut operation: F, should_retry: P) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&EngineError) -> bool,
    {
        let mut backoff = self.backoff();
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && should_retry(&err) => {
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or(self.config.max_interval);

                    log::warn!(
                        "Upstream call failed with transient error, retrying in {:?} (attempt {}/{}): {}",
                        delay,
                        attempt + 1,
                        max_attempts,
                        err
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    if attempt > 1 {
                        return Err(err.with_context_value("attempts", attempt));
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Get the current retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}

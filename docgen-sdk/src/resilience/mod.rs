//! Resilience patterns for the generation upstream
//!
//! This module provides:
//! - Retry with `2^n` exponential backoff
//! - A two-state circuit breaker
//! - A facade that applies both under one wall-clock deadline

mod circuit_breaker;
mod retry;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics};
pub use retry::{RetryConfig, RetryExecutor};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Composes the circuit breaker, retry and deadline for one logical upstream call
pub struct Resilience {
    retry: RetryExecutor,
    circuit_breaker: Arc<CircuitBreaker>,
    deadline: Duration,
}

impl Clone for Resilience {
    fn clone(&self) -> Self {
        Self {
            retry: self.retry.clone(),
            circuit_breaker: Arc::clone(&self.circuit_breaker),
            deadline: self.deadline,
        }
    }
}

impl Default for Resilience {
    fn default() -> Self {
        Self::from_engine_config(&EngineConfig::default())
    }
}

impl Resilience {
    /// Create a new resilience facade with its own circuit breaker
    pub fn new(
        retry_config: RetryConfig,
        circuit_breaker_config: CircuitBreakerConfig,
        deadline: Duration,
    ) -> Self {
        Self::with_circuit_breaker(
            retry_config,
            Arc::new(CircuitBreaker::new(circuit_breaker_config)),
            deadline,
        )
    }

    /// Create a facade around an existing breaker, so several engines can share one
    pub fn with_circuit_breaker(
        retry_config: RetryConfig,
        circuit_breaker: Arc<CircuitBreaker>,
        deadline: Duration,
    ) -> Self {
        Self {
            retry: RetryExecutor::new(retry_config),
            circuit_breaker,
            deadline,
        }
    }

    /// Build from engine settings
    pub fn from_engine_config(config: &EngineConfig) -> Self {
        Self::new(
            RetryConfig {
                max_attempts: config.max_attempts,
                backoff_unit: config.backoff_unit,
                ..RetryConfig::default()
            },
            CircuitBreakerConfig {
                failure_threshold: config.failure_threshold,
                cooldown: config.cooldown,
            },
            config.deadline,
        )
    }

    /// Run `operation` behind the breaker, retrying transient errors until the
    /// attempt budget or the deadline runs out. Every upstream outcome is
    /// reported to the breaker; calls rejected by the breaker are not.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.circuit_breaker.check()?;

        let cb: &CircuitBreaker = &self.circuit_breaker;
        let op = &operation;

        let attempts = self.retry.execute_with(
            move || async move {
                if let Err(rejected) = cb.check() {
                    return Err(rejected);
                }
                match op().await {
                    Ok(value) => {
                        cb.record_success();
                        Ok(value)
                    }
                    Err(err) => {
                        cb.record_failure();
                        Err(err)
                    }
                }
            },
            |err| err.is_retryable() && cb.status() == CircuitBreakerStatus::Closed,
        );

        match tokio::time::timeout(self.deadline, attempts).await {
            Ok(result) => result,
            Err(_) => {
                cb.record_failure();
                log::warn!(
                    "Upstream deadline of {:?} elapsed, abandoning remaining attempts",
                    self.deadline
                );
                Err(EngineError::timeout(format!(
                    "Generation did not complete within {:?}",
                    self.deadline
                )))
            }
        }
    }

    /// Get the current status of the circuit breaker
    pub fn circuit_breaker_status(&self) -> CircuitBreakerStatus {
        self.circuit_breaker.status()
    }

    /// Shared handle to the circuit breaker
    pub fn circuit_breaker(&self) -> Arc<CircuitBreaker> {
        Arc::clone(&self.circuit_breaker)
    }

    /// Reset the circuit breaker state
    pub fn reset_circuit_breaker(&self) {
        self.circuit_breaker.reset();
    }

    /// Wall-clock budget per logical call
    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

/// Status of a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitBreakerStatus {
    /// Circuit is closed, allowing requests
    Closed,

    /// Circuit is open, rejecting requests
    Open,
}

impl std::fmt::Display for CircuitBreakerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Open => write!(f, "Open"),
        }
    }
}

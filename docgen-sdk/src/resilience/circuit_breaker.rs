//! Circuit breaker guarding the generation upstream
//!
//! Two states only. The breaker opens once `failure_threshold` consecutive
//! failures have been recorded and closes again on the first call attempted
//! after `cooldown` has elapsed since the last failure. There is no
//! half-open probe: that first call goes through unconditionally.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{EngineError, Result};

use super::CircuitBreakerStatus;

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before the circuit opens
    pub failure_threshold: usize,

    /// How long the circuit stays open after the most recent failure
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct BreakerState {
    failure_count: usize,
    last_failure_time: Option<Instant>,
    is_open: bool,
    total_failures: usize,
    total_successes: usize,
}

/// A thread-safe circuit breaker. All counters live behind one mutex so
/// concurrent requests never observe a half-applied transition.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the specified configuration
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: Mutex::new(BreakerState {
                failure_count: 0,
                last_failure_time: None,
                is_open: false,
                total_failures: 0,
                total_successes: 0,
            }),
            config,
        }
    }

    // A panic while holding the lock leaves plain counters behind, so a
    // poisoned mutex is still safe to reuse.
    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check if the circuit allows a call, resetting it when the cooldown has passed
    pub fn check(&self) -> Result<()> {
        let mut state = self.lock();

        if !state.is_open {
            return Ok(());
        }

        let elapsed = state
            .last_failure_time
            .map(|t| t.elapsed())
            .unwrap_or(self.config.cooldown);

        if elapsed > self.config.cooldown {
            log::info!(
                "Circuit breaker cooldown of {:?} elapsed, transitioning to Closed",
                self.config.cooldown
            );
            state.is_open = false;
            state.failure_count = 0;
            Ok(())
        } else {
            let remaining = self.config.cooldown.saturating_sub(elapsed);
            Err(EngineError::service_unavailable(
                format!(
                    "Circuit breaker is open after {} consecutive failures",
                    state.failure_count
                ),
                round_up_to_secs(remaining),
            ))
        }
    }

    /// Record a successful call. Always closes the circuit.
    pub fn record_success(&self) {
        let mut state = self.lock();
        state.total_successes += 1;
        state.failure_count = 0;
        if state.is_open {
            log::info!("Circuit breaker transitioning to Closed state after success");
        }
        state.is_open = false;
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let mut state = self.lock();
        state.total_failures += 1;
        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());

        if !state.is_open && state.failure_count >= self.config.failure_threshold {
            log::warn!(
                "Circuit breaker transitioning to Open state after {} consecutive failures",
                state.failure_count
            );
            state.is_open = true;
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut state = self.lock();
        state.is_open = false;
        state.failure_count = 0;
        state.last_failure_time = None;
    }

    /// Get the current circuit status
    pub fn status(&self) -> CircuitBreakerStatus {
        if self.lock().is_open {
            CircuitBreakerStatus::Open
        } else {
            CircuitBreakerStatus::Closed
        }
    }

    /// Get the current number of consecutive failures
    pub fn failure_count(&self) -> usize {
        self.lock().failure_count
    }

    /// Get metrics about the circuit breaker
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let state = self.lock();
        CircuitBreakerMetrics {
            status: if state.is_open {
                CircuitBreakerStatus::Open
            } else {
                CircuitBreakerStatus::Closed
            },
            failure_count: state.failure_count,
            total_failures: state.total_failures,
            total_successes: state.total_successes,
            since_last_failure: state.last_failure_time.map(|t| t.elapsed()),
            config: self.config.clone(),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }
}

fn round_up_to_secs(d: Duration) -> Duration {
    let secs = d.as_secs() + u64::from(d.subsec_nanos() > 0);
    Duration::from_secs(secs.max(1))
}

/// Metrics for a circuit breaker
#[derive(Debug)]
pub struct CircuitBreakerMetrics {
    /// Current status
    pub status: CircuitBreakerStatus,

    /// Current consecutive failure count
    pub failure_count: usize,

    /// Total failures seen
    pub total_failures: usize,

    /// Total successes seen
    pub total_successes: usize,

    /// Time since the most recent failure, if any
    pub since_last_failure: Option<Duration>,

    /// Current configuration
    pub config: CircuitBreakerConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_circuit_closed_initially() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert!(cb.check().is_ok());
    }

    #[test]
    fn test_circuit_opens_exactly_at_threshold() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert!(cb.check().is_ok());

        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);

        let err = cb.check().unwrap_err();
        assert!(matches!(err, EngineError::ServiceUnavailable { .. }));
        let retry_after = err.retry_after().unwrap();
        assert!(retry_after <= Duration::from_secs(30));
        assert!(retry_after >= Duration::from_secs(29));
    }

    #[test]
    fn test_circuit_resets_after_cooldown() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            cooldown: Duration::from_millis(50),
        });

        cb.record_failure();
        assert!(cb.check().is_err());

        thread::sleep(Duration::from_millis(80));

        assert!(cb.check().is_ok());
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert_eq!(cb.failure_count(), 0);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.failure_count(), 0);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
    }

    #[test]
    fn test_success_while_open_closes() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..CircuitBreakerConfig::default()
        });
        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);

        cb.record_success();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert!(cb.check().is_ok());
    }

    #[test]
    fn test_metrics_track_totals() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        cb.record_failure();
        cb.record_success();
        cb.record_failure();

        let metrics = cb.metrics();
        assert_eq!(metrics.total_failures, 2);
        assert_eq!(metrics.total_successes, 1);
        assert_eq!(metrics.failure_count, 1);
        assert!(metrics.since_last_failure.is_some());
    }

    #[test]
    fn test_reset() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..CircuitBreakerConfig::default()
        });
        cb.record_failure();
        assert_eq!(cb.status(), CircuitBreakerStatus::Open);

        cb.reset();
        assert_eq!(cb.status(), CircuitBreakerStatus::Closed);
        assert_eq!(cb.failure_count(), 0);
    }
}

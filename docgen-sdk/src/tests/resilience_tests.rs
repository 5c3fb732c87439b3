//! Tests for the resilience facade
//!
//! These tests verify how the breaker, the retry loop and the deadline
//! interact for one logical upstream call.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::error::{EngineError, ErrorOutcome, Result};
    use crate::resilience::{
        CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStatus, Resilience, RetryConfig,
    };

    fn retry_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            backoff_unit: Duration::from_millis(1),
            ..RetryConfig::default()
        }
    }

    fn breaker_config(failure_threshold: usize) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold,
            cooldown: Duration::from_millis(100),
        }
    }

    fn overloaded() -> EngineError {
        EngineError::service_unavailable("The model is overloaded", Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_success_resets_failures() {
        let resilience = Resilience::new(retry_config(3), breaker_config(3), Duration::from_secs(5));
        let calls = AtomicUsize::new(0);

        let result = resilience
            .execute(|| async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(overloaded())
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(resilience.circuit_breaker().failure_count(), 0);
        assert_eq!(resilience.circuit_breaker().metrics().total_failures, 1);
    }

    #[tokio::test]
    async fn test_fatal_errors_count_towards_the_breaker() {
        let resilience = Resilience::new(retry_config(3), breaker_config(2), Duration::from_secs(5));
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let result: Result<()> = resilience
                .execute(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(EngineError::invalid_request("prompt too long"))
                })
                .await;
            assert!(matches!(result, Err(EngineError::InvalidRequest(_))));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(resilience.circuit_breaker_status(), CircuitBreakerStatus::Open);
    }

    #[tokio::test]
    async fn test_retries_stop_once_the_breaker_opens() {
        let resilience = Resilience::new(retry_config(5), breaker_config(2), Duration::from_secs(5));
        let calls = AtomicUsize::new(0);

        let result: Result<()> = resilience
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(overloaded())
            })
            .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(resilience.circuit_breaker_status(), CircuitBreakerStatus::Open);
    }

    #[tokio::test]
    async fn test_open_breaker_recovers_after_cooldown() {
        let resilience = Resilience::new(retry_config(1), breaker_config(1), Duration::from_secs(5));

        let _ = resilience
            .execute(|| async { Err::<(), _>(overloaded()) })
            .await;

        let calls = AtomicUsize::new(0);
        let rejected = resilience
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert_eq!(rejected.unwrap_err().outcome(), ErrorOutcome::ServiceUnavailable);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(150)).await;

        let result = resilience
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resilience.circuit_breaker_status(), CircuitBreakerStatus::Closed);
    }

    #[tokio::test]
    async fn test_deadline_aborts_retries_and_records_failure() {
        let resilience = Resilience::new(
            RetryConfig {
                max_attempts: 3,
                backoff_unit: Duration::from_millis(200),
                ..RetryConfig::default()
            },
            breaker_config(5),
            Duration::from_millis(100),
        );
        let calls = AtomicUsize::new(0);

        let result: Result<()> = resilience
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(overloaded())
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.outcome(), ErrorOutcome::TimeoutError);
        assert_eq!(err.outcome().status_code(), 504);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // One failure for the attempt, one for the elapsed deadline
        assert_eq!(resilience.circuit_breaker().failure_count(), 2);
    }

    #[tokio::test]
    async fn test_slow_upstream_hits_the_deadline() {
        let resilience = Resilience::new(retry_config(3), breaker_config(3), Duration::from_millis(50));

        let result = resilience
            .execute(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("late")
            })
            .await;

        assert!(matches!(result, Err(EngineError::Timeout(_))));
        assert_eq!(resilience.circuit_breaker().failure_count(), 1);
    }

    #[tokio::test]
    async fn test_engines_can_share_one_breaker() {
        let breaker = Arc::new(CircuitBreaker::new(breaker_config(2)));
        let first = Resilience::with_circuit_breaker(retry_config(1), Arc::clone(&breaker), Duration::from_secs(5));
        let second = Resilience::with_circuit_breaker(retry_config(1), Arc::clone(&breaker), Duration::from_secs(5));

        let _ = first.execute(|| async { Err::<(), _>(overloaded()) }).await;
        let _ = second.execute(|| async { Err::<(), _>(overloaded()) }).await;

        assert_eq!(breaker.status(), CircuitBreakerStatus::Open);
        assert_eq!(first.circuit_breaker_status(), CircuitBreakerStatus::Open);
    }

    #[test]
    fn test_concurrent_failures_are_all_counted() {
        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1000,
            cooldown: Duration::from_secs(30),
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let breaker = Arc::clone(&breaker);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        breaker.record_failure();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(breaker.failure_count(), 800);
        assert_eq!(breaker.status(), CircuitBreakerStatus::Closed);
    }
}

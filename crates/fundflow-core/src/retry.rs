//! Bounded exponential-backoff retries.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::classify::{Classification, Classify, TaxonomyClassifier};
use crate::ConfigError;

/// Fixed retry policy of a controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(4),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
    ) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::NotPositive {
                name: "max_attempts",
                value: max_attempts.to_string(),
            });
        }
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                name: "multiplier",
                value: multiplier.to_string(),
                expected: "a finite number of at least 1",
            });
        }

        Ok(Self {
            max_attempts,
            initial_delay,
            multiplier,
            max_delay,
        })
    }

    /// Delay to wait after the given failed attempt (1-based) before the next one.
    ///
    /// `min(initial_delay * multiplier^(attempt - 1), max_delay)`
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let seconds = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped_seconds = seconds.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped_seconds)
    }
}

/// Result of running an operation under a [`RetryController`].
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: Result<T, E>,
    /// Attempts consumed, at least 1.
    pub attempts: u32,
    /// Classification of the last failure, if the operation failed.
    pub classification: Option<Classification>,
}

impl<T, E> RetryOutcome<T, E> {
    pub fn retry_count(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Runs a single-attempt operation until it succeeds, fails permanently,
/// exhausts the policy or the run is cancelled.
#[derive(Debug, Clone, Default)]
pub struct RetryController<C = TaxonomyClassifier> {
    policy: RetryPolicy,
    classifier: C,
}

impl RetryController<TaxonomyClassifier> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_classifier(policy, TaxonomyClassifier)
    }
}

impl<C> RetryController<C> {
    pub fn with_classifier(policy: RetryPolicy, classifier: C) -> Self {
        Self { policy, classifier }
    }

    /// `operation` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> RetryOutcome<T, E>
    where
        C: Classify<E>,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            let error = match operation(attempt).await {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                        classification: None,
                    }
                }
                Err(error) => error,
            };

            let classification = self.classifier.classify(&error);
            let exhausted = attempt >= self.policy.max_attempts;
            if !classification.retryable || exhausted || cancel.is_cancelled() {
                debug!(
                    attempt,
                    category = %classification.category,
                    retryable = classification.retryable,
                    exhausted,
                    cancelled = cancel.is_cancelled(),
                    "giving up"
                );
                return RetryOutcome {
                    result: Err(error),
                    attempts: attempt,
                    classification: Some(classification),
                };
            }

            let delay = self.policy.delay_after(attempt);
            warn!(
                attempt,
                category = %classification.category,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "attempt failed with a transient error, backing off"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(attempt, "run cancelled during backoff");
                    return RetryOutcome {
                        result: Err(error),
                        attempts: attempt,
                        classification: Some(classification),
                    };
                }
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::Instant;

    use super::*;
    use crate::ErrorCategory;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Failure {
        Transient,
        Permanent,
    }

    struct FakeClassifier;

    impl Classify<Failure> for FakeClassifier {
        fn classify(&self, error: &Failure) -> Classification {
            match error {
                Failure::Transient => ErrorCategory::NetworkError.into(),
                Failure::Permanent => ErrorCategory::DataQualityError.into(),
            }
        }
    }

    fn controller() -> RetryController<FakeClassifier> {
        RetryController::with_classifier(RetryPolicy::default(), FakeClassifier)
    }

    #[test]
    fn default_policy_doubles_from_four_seconds_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(4));
        assert_eq!(policy.delay_after(2), Duration::from_secs(8));
        assert_eq!(policy.delay_after(3), Duration::from_secs(16));
        assert_eq!(policy.delay_after(5), Duration::from_secs(60));
        assert_eq!(policy.delay_after(40), Duration::from_secs(60));
    }

    #[test]
    fn rejects_zero_attempts() {
        let err = RetryPolicy::new(0, Duration::from_secs(1), 2.0, Duration::from_secs(5))
            .expect_err("must fail");
        assert!(matches!(err, ConfigError::NotPositive { name: "max_attempts", .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_until_success() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        let outcome = controller()
            .run(&CancellationToken::new(), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(Failure::Transient)
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(outcome.result, Ok(3));
        assert_eq!(outcome.retry_count(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_stops_without_backoff() {
        let started = Instant::now();

        let outcome = controller()
            .run(&CancellationToken::new(), |_| async {
                Err::<(), _>(Failure::Permanent)
            })
            .await;

        assert_eq!(outcome.result, Err(Failure::Permanent));
        assert_eq!(outcome.attempts, 1);
        assert_eq!(
            outcome.classification.map(|c| c.category),
            Some(ErrorCategory::DataQualityError)
        );
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempt_ceiling() {
        let outcome = controller()
            .run(&CancellationToken::new(), |_| async {
                Err::<(), _>(Failure::Transient)
            })
            .await;

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.retry_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_returns_last_failure() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let outcome = controller()
            .run(&cancel, |_| async { Err::<(), _>(Failure::Transient) })
            .await;

        assert_eq!(outcome.result, Err(Failure::Transient));
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn cancelled_token_prevents_any_retry() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = controller()
            .run(&cancel, |_| async { Err::<(), _>(Failure::Transient) })
            .await;

        assert_eq!(outcome.attempts, 1);
    }
}

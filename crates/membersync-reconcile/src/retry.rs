//! Classified retry with exponential backoff and a wall-clock budget.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{classify_remote, Classifier, FailureClass, ReconcileError, RemoteError};
use crate::traits::MembershipBackend;
use crate::types::{Category, MutationOp};

/// Backoff configuration.
///
/// There is no attempt limit: retries continue until the operation succeeds,
/// fails fatally, or `timeout` has elapsed since the first attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Upper bound for a single backoff sleep, before jitter.
    pub max_delay: Duration,
    /// Fraction of the delay added as random jitter (0.0 to 1.0).
    pub jitter_factor: f64,
    /// Total wall-clock budget for one operation, including sleeps.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.25,
            timeout: Duration::from_secs(300),
        }
    }
}

/// A successful result and the number of attempts it took.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

impl RetryPolicy {
    /// Policy with no jitter, for tests and deterministic callers.
    #[must_use]
    pub fn fixed(base_delay: Duration, max_delay: Duration, timeout: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter_factor: 0.0,
            timeout,
        }
    }

    /// Backoff before attempt `failed_attempts + 1`, without jitter.
    ///
    /// `min(base_delay * 2^(failed_attempts - 1), max_delay)`.
    #[must_use]
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }

    /// Add up to `jitter_factor * delay` of random delay.
    #[must_use]
    pub fn add_jitter(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as f64;
        let jitter_range = delay_ms * self.jitter_factor;
        if jitter_range <= 0.0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(0.0..=jitter_range);
        Duration::from_millis((delay_ms + jitter) as u64)
    }

    /// Run `op` until it succeeds, fails fatally, or the budget is spent.
    ///
    /// Failures the classifier marks fatal are returned on first occurrence.
    /// When the budget runs out with only retryable failures seen, the last
    /// one is surfaced as [`ReconcileError::RetryBudgetExceeded`].
    /// Cancellation interrupts both the in-flight call and backoff sleeps.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        classifier: Classifier,
        mut op: F,
    ) -> Result<Retried<T>, ReconcileError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let started = Instant::now();
        // A timeout too large to represent means no deadline.
        let deadline = started.checked_add(self.timeout);
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ReconcileError::Cancelled);
            }
            attempt += 1;

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ReconcileError::Cancelled),
                result = op() => result,
            };

            let error = match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempts = attempt, "Operation succeeded after retries");
                    }
                    return Ok(Retried {
                        value,
                        attempts: attempt,
                    });
                }
                Err(error) => error,
            };

            if classifier(&error) == FailureClass::Fatal {
                debug!(operation, attempt, error = %error, "Non-retryable failure");
                return Err(ReconcileError::fatal(error));
            }

            let now = Instant::now();
            if deadline.is_some_and(|deadline| now >= deadline) {
                let elapsed = now.duration_since(started);
                warn!(
                    operation,
                    attempts = attempt,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %error,
                    "Retry budget exhausted"
                );
                return Err(ReconcileError::RetryBudgetExceeded {
                    attempts: attempt,
                    elapsed,
                    source: error,
                });
            }

            let mut delay = self.add_jitter(self.backoff(attempt));
            if let Some(deadline) = deadline {
                delay = delay.min(deadline.duration_since(now));
            }
            debug!(
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying after transient failure"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ReconcileError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Issues one batched mutation, retrying transient failures.
#[derive(Clone)]
pub struct RetryingMutator {
    policy: RetryPolicy,
    classifier: Classifier,
}

impl std::fmt::Debug for RetryingMutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingMutator")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Default for RetryingMutator {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryingMutator {
    /// Mutator using the default failure classification.
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            classifier: classify_remote,
        }
    }

    /// Replace the failure classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    #[must_use]
    pub fn classifier(&self) -> Classifier {
        self.classifier
    }

    /// Apply `op` to `batch` on `key`; returns the number of attempts made.
    pub async fn mutate<B>(
        &self,
        backend: &B,
        key: &str,
        op: MutationOp,
        category: Category,
        batch: &[String],
        cancel: &CancellationToken,
    ) -> Result<u32, ReconcileError>
    where
        B: MembershipBackend + ?Sized,
    {
        let operation = format!("{op} {category}");
        let retried = self
            .policy
            .execute(&operation, cancel, self.classifier, || {
                backend.mutate(key, op, category, batch)
            })
            .await?;
        Ok(retried.attempts)
    }
}

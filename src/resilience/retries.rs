//! Retry logic.
//!
//! # Responsibilities
//! - Decide per outcome whether to stop, abort or retry
//! - Execute retries with exponential backoff + jitter
//! - Count every retry in the shared [`Counters`]
//!
//! The abort predicate is always consulted before the retry predicate.
//! Backoff suspends only the calling task.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::observability::Counters;
use crate::resilience::backoff::jittered_backoff;
use crate::resilience::outcome::CallOutcome;

/// Predicate over a call outcome.
pub type OutcomePredicate<T, E> = Arc<dyn Fn(&CallOutcome<T, E>) -> bool + Send + Sync>;

/// Retry schedule and classification rules.
pub struct RetryPolicy<T, E> {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
    retry_if: OutcomePredicate<T, E>,
    abort_if: OutcomePredicate<T, E>,
}

impl<T: 'static, E: 'static> RetryPolicy<T, E> {
    /// Policy with `max_attempts` total attempts and no delay.
    ///
    /// Retries `RetryableFailure` and aborts on `FatalFailure` by default.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter_factor: 0.0,
            retry_if: Arc::new(CallOutcome::<T, E>::is_retryable),
            abort_if: Arc::new(CallOutcome::<T, E>::is_fatal),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts)
            .with_backoff(
                Duration::from_millis(config.base_delay_ms),
                Duration::from_millis(config.max_delay_ms),
            )
            .with_jitter(config.jitter_factor)
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max.max(base);
        self
    }

    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter_factor = factor.clamp(0.0, 1.0);
        self
    }

    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&CallOutcome<T, E>) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Arc::new(predicate);
        self
    }

    pub fn abort_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&CallOutcome<T, E>) -> bool + Send + Sync + 'static,
    {
        self.abort_if = Arc::new(predicate);
        self
    }
}

impl<T, E> RetryPolicy<T, E> {
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after attempt number `attempt` failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        jittered_backoff(attempt, self.base_delay, self.max_delay, self.jitter_factor)
    }
}

impl<T, E> Clone for RetryPolicy<T, E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            jitter_factor: self.jitter_factor,
            retry_if: self.retry_if.clone(),
            abort_if: self.abort_if.clone(),
        }
    }
}

impl<T, E> std::fmt::Debug for RetryPolicy<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter_factor", &self.jitter_factor)
            .finish()
    }
}

/// Runs an operation under a [`RetryPolicy`].
pub struct RetryExecutor<T, E> {
    policy: RetryPolicy<T, E>,
    counters: Arc<Counters>,
}

impl<T, E> RetryExecutor<T, E> {
    pub fn new(policy: RetryPolicy<T, E>, counters: Arc<Counters>) -> Self {
        Self { policy, counters }
    }

    pub fn policy(&self) -> &RetryPolicy<T, E> {
        &self.policy
    }

    pub async fn execute<F, Fut>(&self, operation: F) -> CallOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CallOutcome<T, E>>,
    {
        self.execute_observed(operation, |_| ControlFlow::Continue(())).await
    }

    /// Like [`execute`](Self::execute), reporting every attempt's outcome
    /// to `on_attempt` as soon as it completes.
    ///
    /// `on_attempt` returning `Break` ends the call with that outcome and no
    /// further attempts.
    pub async fn execute_observed<F, Fut, O>(&self, mut operation: F, mut on_attempt: O) -> CallOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CallOutcome<T, E>>,
        O: FnMut(&CallOutcome<T, E>) -> ControlFlow<()>,
    {
        let mut attempt = 1;
        loop {
            let outcome = operation().await;
            let flow = on_attempt(&outcome);

            if outcome.is_success() {
                return outcome;
            }
            if flow.is_break() {
                tracing::debug!(attempt, outcome = outcome.kind(), "Retry halted by observer");
                return outcome;
            }
            if (self.policy.abort_if)(&outcome) {
                tracing::debug!(attempt, outcome = outcome.kind(), "Retry aborted");
                return outcome;
            }
            if !(self.policy.retry_if)(&outcome) || attempt >= self.policy.max_attempts {
                return outcome;
            }

            let delay = self.policy.delay_for(attempt);
            self.counters.record_retry();
            tracing::info!(attempt, delay = ?delay, outcome = outcome.kind(), "Retrying call");
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }
}

impl<T, E> Clone for RetryExecutor<T, E> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            counters: self.counters.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    type Outcome = CallOutcome<u32, &'static str>;

    fn executor(policy: RetryPolicy<u32, &'static str>) -> (RetryExecutor<u32, &'static str>, Arc<Counters>) {
        let counters = Arc::new(Counters::detached());
        (RetryExecutor::new(policy, counters.clone()), counters)
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_max_attempts() {
        let (exec, counters) = executor(RetryPolicy::new(3).with_backoff(Duration::from_millis(100), Duration::from_secs(1)));
        let calls = AtomicU32::new(0);

        let outcome = exec
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Outcome::RetryableFailure("down") }
            })
            .await;

        assert_eq!(outcome, Outcome::RetryableFailure("down"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(counters.retries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_between_attempts() {
        let (exec, _) = executor(RetryPolicy::new(3).with_backoff(Duration::from_millis(100), Duration::from_secs(1)));
        let start = Instant::now();

        exec.execute(|| async { Outcome::RetryableFailure("down") }).await;

        // 100ms after attempt 1, 200ms after attempt 2, no jitter.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(310), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retry() {
        let (exec, counters) = executor(RetryPolicy::new(5).with_backoff(Duration::from_millis(10), Duration::from_millis(10)));
        let calls = AtomicU32::new(0);

        let outcome = exec
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Outcome::RetryableFailure("busy")
                    } else {
                        Outcome::Success(n)
                    }
                }
            })
            .await;

        assert_eq!(outcome, Outcome::Success(2));
        assert_eq!(counters.retries(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_predicate_wins() {
        let policy = RetryPolicy::new(10)
            .with_backoff(Duration::from_secs(1), Duration::from_secs(1))
            .abort_if(|o: &Outcome| o.error() == Some(&"sql"))
            .retry_if(|_| true);
        let (exec, counters) = executor(policy);
        let calls = AtomicU32::new(0);

        let outcome = exec
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Outcome::RetryableFailure("sql") }
            })
            .await;

        assert_eq!(outcome, Outcome::RetryableFailure("sql"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(counters.retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_failure_not_retried_by_default() {
        let (exec, counters) = executor(RetryPolicy::new(3));
        let calls = AtomicU32::new(0);

        let outcome = exec
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Outcome::FatalFailure("bad request") }
            })
            .await;

        assert!(outcome.is_fatal());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(counters.retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_has_no_delay() {
        let (exec, counters) = executor(RetryPolicy::new(1).with_backoff(Duration::from_secs(1), Duration::from_secs(1)));
        let start = Instant::now();

        let outcome = exec.execute(|| async { Outcome::RetryableFailure("down") }).await;

        assert!(outcome.is_retryable());
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(counters.retries(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_every_attempt() {
        let (exec, _) = executor(RetryPolicy::new(3));
        let mut seen = Vec::new();

        exec.execute_observed(
            || async { Outcome::RetryableFailure("down") },
            |o| {
                seen.push(o.kind());
                ControlFlow::Continue(())
            },
        )
        .await;

        assert_eq!(seen, vec!["retryable_failure"; 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_break_stops_retrying() {
        let (exec, counters) = executor(RetryPolicy::new(5));
        let calls = AtomicU32::new(0);

        let outcome = exec
            .execute_observed(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Outcome::RetryableFailure("down") }
                },
                |_| ControlFlow::Break(()),
            )
            .await;

        assert!(outcome.is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(counters.retries(), 0);
    }

    /// Delay and attempt accessors need no `'static` bound on the payloads.
    fn first_delay<T, E>(executor: &RetryExecutor<T, E>) -> (u32, Duration) {
        (executor.policy().max_attempts(), executor.policy().delay_for(1))
    }

    #[test]
    fn test_policy_accessors_on_borrowed_types() {
        let policy: RetryPolicy<&'static str, &'static str> =
            RetryPolicy::new(2).with_backoff(Duration::from_millis(30), Duration::from_millis(30));
        let exec = RetryExecutor::new(policy, Arc::new(Counters::detached()));

        assert_eq!(first_delay(&exec), (2, Duration::from_millis(30)));
    }

    #[test]
    fn test_policy_from_config() {
        let policy: RetryPolicy<u32, ()> = RetryPolicy::from_config(&RetryConfig {
            max_attempts: 4,
            base_delay_ms: 50,
            max_delay_ms: 3000,
            jitter_factor: 0.0,
        });

        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay_for(1), Duration::from_millis(50));
        assert_eq!(policy.delay_for(3), Duration::from_millis(200));
    }
}

//! Circuit breaker + retry + static fallback, composed.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;

use crate::config::{BreakerConfig, RetryConfig};
use crate::observability::Counters;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::resilience::outcome::CallOutcome;
use crate::resilience::retries::{RetryExecutor, RetryPolicy};

/// What callers invoke to reach a guarded dependency.
///
/// One instance owns one breaker; share it across workers through an `Arc`.
pub struct ResilientCallPipeline<T, E> {
    breaker: Arc<CircuitBreaker>,
    executor: RetryExecutor<T, E>,
    counters: Arc<Counters>,
}

impl<T: 'static, E: 'static> ResilientCallPipeline<T, E> {
    pub fn from_config(
        name: &str,
        breaker: &BreakerConfig,
        retry: &RetryConfig,
        counters: Arc<Counters>,
    ) -> Self {
        Self::new(
            Arc::new(CircuitBreaker::new(name, breaker)),
            RetryPolicy::from_config(retry),
            counters,
        )
    }
}

impl<T, E> ResilientCallPipeline<T, E> {
    pub fn new(breaker: Arc<CircuitBreaker>, policy: RetryPolicy<T, E>, counters: Arc<Counters>) -> Self {
        Self {
            breaker,
            executor: RetryExecutor::new(policy, counters.clone()),
            counters,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    /// Run `operation` through the breaker and retry policy.
    ///
    /// When the breaker refuses, `fallback` is returned untouched and the
    /// operation is never invoked. An attempt that opens the breaker ends
    /// the call with its own outcome; no retry is sent to an open circuit.
    pub async fn call<F, Fut>(&self, operation: F, fallback: CallOutcome<T, E>) -> CallOutcome<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CallOutcome<T, E>>,
    {
        if !self.breaker.allow_request() {
            self.counters.record_service_unavailable();
            tracing::debug!(breaker = %self.breaker.name(), "Circuit open, returning fallback");
            return fallback;
        }

        let breaker = &self.breaker;
        self.executor
            .execute_observed(operation, |outcome| {
                if outcome.is_success() {
                    breaker.record_success();
                } else {
                    breaker.record_failure();
                }
                if breaker.state() == CircuitState::Open {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .await
    }
}

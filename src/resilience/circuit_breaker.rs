//! Circuit breaker for one logical dependency.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: dependency assumed down, requests fail fast
//! - Half-Open: trial calls test whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive_failures >= failure_threshold
//! Open → Half-Open: first allow_request() after cooldown
//! Half-Open → Closed: consecutive_successes >= success_threshold
//! Half-Open → Open: any failure
//! ```
//!
//! Counters reset on every transition. A success in Closed clears the
//! failure streak entirely. Outcomes recorded while Open are ignored.
//!
//! All state sits behind one mutex, so each decision together with the
//! transition it causes is atomic. Observers run after the lock is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::BreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Transition notification delivered to a [`BreakerObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerEvent {
    Opened,
    HalfOpened,
    Closed,
}

impl BreakerEvent {
    fn target(self) -> CircuitState {
        match self {
            BreakerEvent::Opened => CircuitState::Open,
            BreakerEvent::HalfOpened => CircuitState::HalfOpen,
            BreakerEvent::Closed => CircuitState::Closed,
        }
    }
}

/// Side-effect only hook for breaker transitions.
pub trait BreakerObserver: Send + Sync {
    fn on_transition(&self, breaker: &str, event: BreakerEvent);
}

/// Logs each transition at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl BreakerObserver for LoggingObserver {
    fn on_transition(&self, breaker: &str, event: BreakerEvent) {
        match event {
            BreakerEvent::Opened => tracing::info!(breaker = %breaker, "Circuit breaker opened"),
            BreakerEvent::HalfOpened => tracing::info!(breaker = %breaker, "Circuit breaker half-opened"),
            BreakerEvent::Closed => tracing::info!(breaker = %breaker, "Circuit breaker closed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

impl Inner {
    fn transition(&mut self, event: BreakerEvent, now: Instant) -> BreakerEvent {
        self.state = event.target();
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.opened_at = match event {
            BreakerEvent::Opened => Some(now),
            _ => None,
        };
        event
    }
}

pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    success_threshold: u32,
    cooldown: Duration,
    inner: Mutex<Inner>,
    observer: Arc<dyn BreakerObserver>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: &BreakerConfig) -> Self {
        Self {
            name: name.into(),
            failure_threshold: config.failure_threshold.max(1),
            success_threshold: config.success_threshold.max(1),
            cooldown: config.cooldown(),
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
            }),
            observer: Arc::new(LoggingObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn BreakerObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Decide whether a call may be attempted now.
    pub fn allow_request(&self) -> bool {
        self.allow_request_at(Instant::now())
    }

    pub fn allow_request_at(&self, now: Instant) -> bool {
        let (allowed, event) = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed | CircuitState::HalfOpen => (true, None),
                CircuitState::Open => {
                    let elapsed = inner
                        .opened_at
                        .map(|opened| now.saturating_duration_since(opened))
                        .unwrap_or(Duration::MAX);
                    if elapsed >= self.cooldown {
                        (true, Some(inner.transition(BreakerEvent::HalfOpened, now)))
                    } else {
                        (false, None)
                    }
                }
            }
        };
        self.notify(event);
        allowed
    }

    pub fn record_success(&self) {
        self.record_success_at(Instant::now());
    }

    pub fn record_success_at(&self, now: Instant) {
        let event = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => {
                    inner.consecutive_failures = 0;
                    None
                }
                CircuitState::HalfOpen => {
                    inner.consecutive_successes += 1;
                    if inner.consecutive_successes >= self.success_threshold {
                        Some(inner.transition(BreakerEvent::Closed, now))
                    } else {
                        None
                    }
                }
                CircuitState::Open => None,
            }
        };
        self.notify(event);
    }

    pub fn record_failure(&self) {
        self.record_failure_at(Instant::now());
    }

    pub fn record_failure_at(&self, now: Instant) {
        let event = {
            let mut inner = self.lock();
            match inner.state {
                CircuitState::Closed => {
                    inner.consecutive_successes = 0;
                    inner.consecutive_failures += 1;
                    if inner.consecutive_failures >= self.failure_threshold {
                        Some(inner.transition(BreakerEvent::Opened, now))
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen => Some(inner.transition(BreakerEvent::Opened, now)),
                CircuitState::Open => None,
            }
        };
        self.notify(event);
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
        }
    }

    // Counters stay consistent under every critical section, so a poisoned
    // lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: Option<BreakerEvent>) {
        if let Some(event) = event {
            self.observer.on_transition(&self.name, event);
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("failure_threshold", &self.failure_threshold)
            .field("success_threshold", &self.success_threshold)
            .field("cooldown", &self.cooldown)
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

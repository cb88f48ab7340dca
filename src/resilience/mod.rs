//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a remote dependency:
//!     → pipeline.rs (consult breaker, fall back when open)
//!     → retries.rs (run attempts, classify, back off)
//!     → backoff.rs (exponential delay + jitter)
//!     → circuit_breaker.rs (record every attempt, trip on threshold)
//! ```
//!
//! # Design Decisions
//! - One breaker per logical dependency, owned by its pipeline
//! - Fail fast in Open state; the fallback never touches retry machinery
//! - Attempt outcomes are classified once, as `CallOutcome`

pub mod backoff;
pub mod circuit_breaker;
pub mod outcome;
pub mod pipeline;
pub mod retries;

pub use circuit_breaker::{BreakerEvent, BreakerObserver, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use outcome::CallOutcome;
pub use pipeline::ResilientCallPipeline;
pub use retries::{RetryExecutor, RetryPolicy};

//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout
//!     → /prometheus on the harness server
//!     → optional standalone exporter on the load client
//! ```
//!
//! # Design Decisions
//! - Counters are explicit instances shared by Arc, not globals
//! - Metrics are cheap (atomic increments)
//! - The resilience core only depends on the `MetricsSink` trait

pub mod logging;
pub mod metrics;

pub use metrics::{CounterSnapshot, Counters, MetricsSink, NoopSink, PrometheusSink, RecorderSink};

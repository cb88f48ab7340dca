//! Resilience and backpressure load harness.
//!
//! A load-generating client that reaches a CPU-bound server through a
//! circuit breaker and retry pipeline, and a server that sheds load with
//! a bounded admission queue.

pub mod admission;
pub mod client;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod work;
pub mod workers;

pub use config::HarnessConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;

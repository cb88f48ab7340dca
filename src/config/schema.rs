//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the harness.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for both the load client and the harness server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HarnessConfig {
    /// Circuit breaker thresholds and cooldown.
    pub breaker: BreakerConfig,

    /// Retry schedule for remote calls.
    pub retry: RetryConfig,

    /// Load generator settings.
    pub client: ClientConfig,

    /// Server listener and admission settings.
    pub server: ServerConfig,

    /// Simulated work parameters.
    pub work: WorkConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Consecutive half-open successes that close the circuit.
    pub success_threshold: u32,

    /// Time the circuit stays open before a trial call, in milliseconds.
    pub cooldown_ms: u64,
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            cooldown_ms: 60_000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Relative jitter applied to every delay, in `[0, 1]`.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 1000,
            max_delay_ms: 1000,
            jitter_factor: 0.25,
        }
    }
}

/// Load generator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the harness server.
    pub target_url: String,

    /// Fixed number of pool workers.
    pub workers: usize,

    /// Capacity of the submission queue in front of the workers.
    pub queue_capacity: usize,

    /// Number of requests the driver submits.
    pub total_requests: u64,

    /// Delay between two submissions in milliseconds.
    pub submit_interval_ms: u64,

    /// Upper bound on the drain wait during shutdown, in seconds.
    pub shutdown_timeout_secs: u64,

    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Response read timeout in milliseconds.
    pub read_timeout_ms: u64,
}

impl ClientConfig {
    pub fn submit_interval(&self) -> Duration {
        Duration::from_millis(self.submit_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            target_url: "http://localhost:3000".to_string(),
            workers: 40,
            queue_capacity: 512,
            total_requests: 1000,
            submit_interval_ms: 50,
            shutdown_timeout_secs: 100,
            connect_timeout_ms: 1000,
            read_timeout_ms: 5000,
        }
    }
}

/// Harness server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Number of work slots running simulated work concurrently.
    pub worker_threads: usize,

    /// Capacity of the admission queue.
    pub admission_capacity: usize,

    /// Reject arrivals once the admission queue is full.
    pub load_shedding: bool,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// Period of the metrics upkeep task in milliseconds.
    pub metrics_upkeep_ms: u64,
}

impl ServerConfig {
    pub fn metrics_upkeep(&self) -> Duration {
        Duration::from_millis(self.metrics_upkeep_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            worker_threads: 16,
            admission_capacity: 16,
            load_shedding: false,
            request_timeout_secs: 30,
            metrics_upkeep_ms: 5000,
        }
    }
}

/// Simulated work configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkConfig {
    /// Minimum key-pair generation rounds per request.
    pub min_rounds: u32,

    /// Maximum key-pair generation rounds per request.
    pub max_rounds: u32,
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            min_rounds: 4,
            max_rounds: 16,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the standalone metrics endpoint (client side).
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

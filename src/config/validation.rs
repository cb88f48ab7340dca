//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and addresses.
//! Every problem is reported, not just the first one.

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::HarnessConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending key, e.g. `retry.max_attempts`.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &HarnessConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let breaker = &config.breaker;
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("breaker.failure_threshold", "must be at least 1"));
    }
    if breaker.success_threshold == 0 {
        errors.push(ValidationError::new("breaker.success_threshold", "must be at least 1"));
    }

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        errors.push(ValidationError::new("retry.max_attempts", "must be at least 1"));
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        errors.push(ValidationError::new(
            "retry.base_delay_ms",
            format!(
                "base delay {}ms exceeds max delay {}ms",
                retry.base_delay_ms, retry.max_delay_ms
            ),
        ));
    }
    if !(0.0..=1.0).contains(&retry.jitter_factor) {
        errors.push(ValidationError::new(
            "retry.jitter_factor",
            format!("{} is outside [0, 1]", retry.jitter_factor),
        ));
    }

    let client = &config.client;
    if client.workers == 0 {
        errors.push(ValidationError::new("client.workers", "must be at least 1"));
    }
    if client.queue_capacity == 0 {
        errors.push(ValidationError::new("client.queue_capacity", "must be at least 1"));
    }
    if !(client.target_url.starts_with("http://") || client.target_url.starts_with("https://")) {
        errors.push(ValidationError::new(
            "client.target_url",
            format!("'{}' is not an http(s) URL", client.target_url),
        ));
    }

    let server = &config.server;
    if server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", server.bind_address),
        ));
    }
    if server.worker_threads == 0 {
        errors.push(ValidationError::new("server.worker_threads", "must be at least 1"));
    }
    if server.admission_capacity == 0 {
        errors.push(ValidationError::new("server.admission_capacity", "must be at least 1"));
    }
    if server.metrics_upkeep_ms == 0 {
        errors.push(ValidationError::new("server.metrics_upkeep_ms", "must be at least 1"));
    }

    let work = &config.work;
    if work.min_rounds == 0 {
        errors.push(ValidationError::new("work.min_rounds", "must be at least 1"));
    }
    if work.min_rounds > work.max_rounds {
        errors.push(ValidationError::new(
            "work.min_rounds",
            format!("{} exceeds max_rounds {}", work.min_rounds, work.max_rounds),
        ));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

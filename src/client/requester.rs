//! HTTP requester guarded by the resilient call pipeline.
//!
//! Every request is one `GET {target}/json`. Attempts are classified as:
//! - transport errors and 5xx responses → retryable
//! - 4xx responses and undecodable bodies → fatal
//!
//! When the circuit is open the requester answers with a synthetic 503
//! marked `circuit_open` without touching the network.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::config::HarnessConfig;
use crate::observability::Counters;
use crate::resilience::{CallOutcome, ResilientCallPipeline};
use crate::work::WorkReceipt;

/// What a caller gets back from one logical request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
    pub receipt: Option<WorkReceipt>,
    /// True when the breaker refused the call and no request was sent.
    pub circuit_open: bool,
}

impl ApiResponse {
    /// Synthetic response used while the breaker is open.
    pub fn circuit_open() -> Self {
        Self {
            status: 503,
            body: String::new(),
            receipt: None,
            circuit_open: true,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status) && self.receipt.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {}", .0.status)]
    Status(ApiResponse),

    #[error("undecodable body: {0}")]
    Decode(String),
}

impl ApiError {
    /// Best-effort response view of a failed call.
    pub fn into_response(self) -> ApiResponse {
        match self {
            ApiError::Status(response) => response,
            ApiError::Transport(message) | ApiError::Decode(message) => ApiResponse {
                status: 0,
                body: message,
                receipt: None,
                circuit_open: false,
            },
        }
    }
}

pub type ApiOutcome = CallOutcome<ApiResponse, ApiError>;

/// Classify a raw HTTP exchange into a call outcome.
pub fn classify(status: u16, body: String) -> ApiOutcome {
    match status {
        200..=299 => match serde_json::from_str::<WorkReceipt>(&body) {
            Ok(receipt) => CallOutcome::Success(ApiResponse {
                status,
                body,
                receipt: Some(receipt),
                circuit_open: false,
            }),
            Err(e) => CallOutcome::FatalFailure(ApiError::Decode(e.to_string())),
        },
        500..=599 => CallOutcome::RetryableFailure(ApiError::Status(ApiResponse {
            status,
            body,
            receipt: None,
            circuit_open: false,
        })),
        _ => CallOutcome::FatalFailure(ApiError::Status(ApiResponse {
            status,
            body,
            receipt: None,
            circuit_open: false,
        })),
    }
}

pub struct ApiRequester {
    http: reqwest::Client,
    url: String,
    pipeline: Arc<ResilientCallPipeline<ApiResponse, ApiError>>,
}

impl ApiRequester {
    /// Build a requester with its own breaker from `config`.
    pub fn from_config(config: &HarnessConfig, counters: Arc<Counters>) -> Result<Self, ApiError> {
        let pipeline = Arc::new(ResilientCallPipeline::from_config(
            "api",
            &config.breaker,
            &config.retry,
            counters,
        ));
        Self::new(config, pipeline)
    }

    pub fn new(
        config: &HarnessConfig,
        pipeline: Arc<ResilientCallPipeline<ApiResponse, ApiError>>,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .connect_timeout(Duration::from_millis(config.client.connect_timeout_ms))
            .timeout(Duration::from_millis(config.client.read_timeout_ms))
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            url: format!("{}/json", config.client.target_url.trim_end_matches('/')),
            pipeline,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn pipeline(&self) -> &Arc<ResilientCallPipeline<ApiResponse, ApiError>> {
        &self.pipeline
    }

    /// Issue one logical request; never fails, errors become responses.
    pub async fn request(&self) -> ApiResponse {
        let fallback = CallOutcome::FatalFailure(ApiError::Status(ApiResponse::circuit_open()));
        match self.pipeline.call(|| self.attempt(), fallback).await {
            CallOutcome::Success(response) => response,
            CallOutcome::RetryableFailure(e) | CallOutcome::FatalFailure(e) => e.into_response(),
        }
    }

    async fn attempt(&self) -> ApiOutcome {
        let response = match self.http.get(&self.url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url = %self.url, error = %e, "Request failed");
                return CallOutcome::RetryableFailure(ApiError::Transport(e.to_string()));
            }
        };

        let status = response.status().as_u16();
        match response.text().await {
            Ok(body) => classify(status, body),
            Err(e) => CallOutcome::RetryableFailure(ApiError::Transport(e.to_string())),
        }
    }
}

impl std::fmt::Debug for ApiRequester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRequester")
            .field("url", &self.url)
            .field("breaker", &self.pipeline.breaker().state())
            .finish()
    }
}

//! Response bodies and error mapping for the harness endpoints.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::work::DispatchError;

pub const OVERLOADED: &str = "overloaded";

/// Overload indicator returned with 503 when a request is shed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub id: u64,
}

pub fn overloaded(id: u64) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorBody {
            error: OVERLOADED.to_string(),
            id,
        }),
    )
        .into_response()
}

/// Map a dispatch failure for request `id` to a response.
pub fn dispatch_failed(id: u64, error: &DispatchError) -> Response {
    let status = match error {
        DispatchError::Closed => StatusCode::SERVICE_UNAVAILABLE,
        DispatchError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
            id,
        }),
    )
        .into_response()
}

/// Body of `GET /stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsBody {
    pub retries: u64,
    pub rejected: u64,
    pub service_unavailable: u64,
    pub in_flight: usize,
    pub admission_capacity: usize,
    pub load_shedding: bool,
    pub idle_workers: usize,
    pub requests_seen: u64,
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request timeout)
//! - Gate `/json` through admission control, then dispatch simulated work
//! - Expose `/prometheus`, `/stats` and `/health`

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admission::{Admission, AdmissionController};
use crate::config::HarnessConfig;
use crate::http::response::{self, StatsBody};
use crate::observability::metrics::spawn_upkeep;
use crate::observability::{Counters, PrometheusSink};
use crate::work::{KeypairWork, SimulatedWork, WorkDispatcher};
use crate::workers::WorkIdGenerator;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<AdmissionController>,
    pub dispatcher: Arc<WorkDispatcher>,
    pub ids: Arc<WorkIdGenerator>,
    pub counters: Arc<Counters>,
    pub metrics: Arc<PrometheusSink>,
}

/// HTTP server for the load-shedding harness.
pub struct HttpServer {
    router: Router,
    config: HarnessConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a server doing key-pair generation work.
    pub fn new(config: HarnessConfig) -> Self {
        let work = Arc::new(KeypairWork::from_config(&config.work));
        Self::with_work(config, work)
    }

    /// Create a server running `work` for every admitted request.
    pub fn with_work(config: HarnessConfig, work: Arc<dyn SimulatedWork>) -> Self {
        let metrics = Arc::new(PrometheusSink::new());
        let counters = Arc::new(Counters::new(metrics.clone()));

        let state = AppState {
            admission: Arc::new(AdmissionController::from_config(&config.server, counters.clone())),
            dispatcher: Arc::new(WorkDispatcher::new(config.server.worker_threads, work, counters.clone())),
            ids: Arc::new(WorkIdGenerator::new()),
            counters,
            metrics,
        };

        let router = Self::build_router(&config, state.clone());
        Self { router, config, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &HarnessConfig, state: AppState) -> Router {
        Router::new()
            .route("/json", get(json_handler))
            .route("/prometheus", get(prometheus_handler))
            .route("/stats", get(stats_handler))
            .route("/health", get(|| async { "ok" }))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs))),
            )
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            load_shedding = self.config.server.load_shedding,
            admission_capacity = self.config.server.admission_capacity,
            worker_threads = self.config.server.worker_threads,
            "HTTP server starting"
        );

        let upkeep = spawn_upkeep(
            self.state.metrics.clone(),
            self.config.server.metrics_upkeep(),
            shutdown.resubscribe(),
        );

        let dispatcher = self.state.dispatcher.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        dispatcher.close();
        upkeep.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Admit, run simulated work, and report the receipt.
async fn json_handler(State(state): State<AppState>) -> Response {
    let item = state.ids.next_item(());
    let id = item.id;

    match state.admission.try_admit(&item) {
        Admission::Rejected => response::overloaded(id),
        Admission::Accepted(ticket) => match state.dispatcher.dispatch(item, ticket).await {
            Ok(receipt) => Json(receipt).into_response(),
            Err(e) => response::dispatch_failed(id, &e),
        },
    }
}

async fn prometheus_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, state.metrics.render())
}

async fn stats_handler(State(state): State<AppState>) -> Json<StatsBody> {
    let counters = state.counters.snapshot();
    Json(StatsBody {
        retries: counters.retries,
        rejected: counters.rejected,
        service_unavailable: counters.service_unavailable,
        in_flight: state.admission.in_flight(),
        admission_capacity: state.admission.capacity(),
        load_shedding: state.admission.load_shedding(),
        idle_workers: state.dispatcher.idle_workers(),
        requests_seen: state.ids.issued(),
    })
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `harness_retries_total` (counter): retries issued by the retry executor
//! - `harness_rejected_total` (counter): submissions dropped by a full pool queue
//! - `harness_service_unavailable_total` (counter): fallbacks and shed requests
//! - `harness_processing_time_seconds` (histogram): simulated work duration
//!
//! The resilience core only sees [`MetricsSink`]. [`Counters`] keeps its own
//! atomics so totals are readable without scraping.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const RETRIES: &str = "harness_retries_total";
pub const REJECTED: &str = "harness_rejected_total";
pub const SERVICE_UNAVAILABLE: &str = "harness_service_unavailable_total";
pub const PROCESSING_TIME: &str = "harness_processing_time_seconds";

/// Install a global Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Destination for counter increments and duration samples.
pub trait MetricsSink: Send + Sync {
    fn increment(&self, name: &'static str);
    fn record_duration(&self, name: &'static str, value: Duration);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn increment(&self, _name: &'static str) {}
    fn record_duration(&self, _name: &'static str, _value: Duration) {}
}

/// Forwards to whatever global recorder is installed (see [`init_metrics`]).
#[derive(Debug, Default, Clone, Copy)]
pub struct RecorderSink;

impl MetricsSink for RecorderSink {
    fn increment(&self, name: &'static str) {
        metrics::counter!(name).increment(1);
    }

    fn record_duration(&self, name: &'static str, value: Duration) {
        metrics::histogram!(name).record(value.as_secs_f64());
    }
}

/// A Prometheus recorder scoped to one owner.
///
/// Not installed globally, so several servers can live in one process.
/// Histogram samples only drain on render or upkeep; owners that may go
/// unscraped must run [`spawn_upkeep`].
pub struct PrometheusSink {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    upkeep_runs: AtomicU64,
}

impl PrometheusSink {
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        Self {
            recorder,
            handle,
            upkeep_runs: AtomicU64::new(0),
        }
    }

    /// Render the current values in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Fold pending histogram samples into their summaries.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
        self.upkeep_runs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upkeep_runs(&self) -> u64 {
        self.upkeep_runs.load(Ordering::Relaxed)
    }
}

/// Run upkeep on `sink` every `period` until `shutdown` fires.
pub fn spawn_upkeep(
    sink: Arc<PrometheusSink>,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => sink.run_upkeep(),
                _ = shutdown.recv() => break,
            }
        }
        tracing::debug!("Metrics upkeep stopped");
    })
}

impl Default for PrometheusSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSink for PrometheusSink {
    fn increment(&self, name: &'static str) {
        metrics::with_local_recorder(&self.recorder, || {
            metrics::counter!(name).increment(1);
        });
    }

    fn record_duration(&self, name: &'static str, value: Duration) {
        metrics::with_local_recorder(&self.recorder, || {
            metrics::histogram!(name).record(value.as_secs_f64());
        });
    }
}

/// Process-lifetime counters shared by every worker of one pipeline or server.
pub struct Counters {
    retries: AtomicU64,
    rejected: AtomicU64,
    service_unavailable: AtomicU64,
    sink: Arc<dyn MetricsSink>,
}

/// Point-in-time copy of [`Counters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub retries: u64,
    pub rejected: u64,
    pub service_unavailable: u64,
}

impl Counters {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self {
            retries: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            service_unavailable: AtomicU64::new(0),
            sink,
        }
    }

    /// Counters that only keep their atomics.
    pub fn detached() -> Self {
        Self::new(Arc::new(NoopSink))
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        self.sink.increment(RETRIES);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        self.sink.increment(REJECTED);
    }

    pub fn record_service_unavailable(&self) {
        self.service_unavailable.fetch_add(1, Ordering::Relaxed);
        self.sink.increment(SERVICE_UNAVAILABLE);
    }

    pub fn record_processing_time(&self, elapsed: Duration) {
        self.sink.record_duration(PROCESSING_TIME, elapsed);
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    pub fn service_unavailable(&self) -> u64 {
        self.service_unavailable.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            retries: self.retries(),
            rejected: self.rejected(),
            service_unavailable: self.service_unavailable(),
        }
    }
}

impl Default for Counters {
    fn default() -> Self {
        Self::detached()
    }
}

impl std::fmt::Debug for Counters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Counters")
            .field("retries", &self.retries())
            .field("rejected", &self.rejected())
            .field("service_unavailable", &self.service_unavailable())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let counters = Counters::detached();
        counters.record_retry();
        counters.record_retry();
        counters.record_rejected();
        counters.record_service_unavailable();

        assert_eq!(
            counters.snapshot(),
            CounterSnapshot {
                retries: 2,
                rejected: 1,
                service_unavailable: 1,
            }
        );
    }

    #[test]
    fn test_prometheus_sink_renders_counters() {
        let sink = Arc::new(PrometheusSink::new());
        let counters = Counters::new(sink.clone());
        counters.record_service_unavailable();
        counters.record_service_unavailable();
        counters.record_processing_time(Duration::from_millis(20));

        let text = sink.render();
        assert!(text.contains("harness_service_unavailable_total 2"), "{}", text);
        assert!(text.contains(PROCESSING_TIME), "{}", text);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upkeep_runs_until_shutdown() {
        let sink = Arc::new(PrometheusSink::new());
        let counters = Counters::new(sink.clone());
        let (tx, rx) = broadcast::channel(1);
        let handle = spawn_upkeep(sink.clone(), Duration::from_secs(1), rx);

        counters.record_processing_time(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(sink.upkeep_runs(), 3);

        tx.send(()).unwrap();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(sink.upkeep_runs(), 3);
        assert!(sink.render().contains(PROCESSING_TIME));
    }
}

//! Load driver: submits requests at a fixed interval into a bounded pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::client::requester::{ApiRequester, ApiResponse};
use crate::config::ClientConfig;
use crate::observability::Counters;
use crate::workers::{BoundedWorkerPool, LogAndDrop, ShutdownReport};

#[derive(Debug, Default)]
struct Tally {
    succeeded: AtomicU64,
    failed: AtomicU64,
    short_circuited: AtomicU64,
}

impl Tally {
    fn record(&self, response: &ApiResponse) {
        if let Some(receipt) = &response.receipt {
            tracing::debug!(
                id = receipt.id,
                key = %receipt.key,
                elapse_ms = receipt.elapse_ms,
                status = response.status,
                "Received work receipt"
            );
        }
        let counter = if response.circuit_open {
            &self.short_circuited
        } else if response.is_success() {
            &self.succeeded
        } else {
            &self.failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Summary of one driver run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverReport {
    pub submitted: u64,
    pub rejected: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub short_circuited: u64,
    pub retries: u64,
    pub service_unavailable: u64,
    pub abandoned_workers: usize,
    pub timed_out: bool,
}

pub struct LoadDriver {
    config: ClientConfig,
    requester: Arc<ApiRequester>,
    counters: Arc<Counters>,
}

impl LoadDriver {
    pub fn new(config: ClientConfig, requester: Arc<ApiRequester>, counters: Arc<Counters>) -> Self {
        Self {
            config,
            requester,
            counters,
        }
    }

    /// Submit `total_requests` requests, then drain the pool.
    pub async fn run(&self) -> DriverReport {
        let (_never, stop) = broadcast::channel(1);
        self.run_until(stop).await
    }

    /// Like [`run`](Self::run), but stops submitting once `stop` fires.
    /// Work already queued still drains.
    pub async fn run_until(&self, mut stop: broadcast::Receiver<()>) -> DriverReport {
        let pool = BoundedWorkerPool::new(
            "load-driver",
            self.config.workers,
            self.config.queue_capacity,
            Arc::new(LogAndDrop::new(self.counters.clone())),
        );
        let tally = Arc::new(Tally::default());
        let interval = self.config.submit_interval();

        tracing::info!(
            target_url = %self.requester.url(),
            total_requests = self.config.total_requests,
            interval = ?interval,
            "Load driver starting"
        );

        let mut submitted = 0;
        let mut rejected = 0;
        for _ in 0..self.config.total_requests {
            if stop.try_recv().is_ok() {
                pool.close();
            }
            if pool.is_closed() {
                tracing::info!(submitted, "Stop requested, ending submissions");
                break;
            }

            let requester = self.requester.clone();
            let tally = tally.clone();
            let submission = pool.submit(async move {
                let response = requester.request().await;
                tally.record(&response);
            });

            if submission.is_queued() {
                submitted += 1;
            } else {
                rejected += 1;
            }
            if interval > Duration::ZERO {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop.recv() => pool.close(),
                }
            }
        }

        let ShutdownReport {
            abandoned_workers,
            timed_out,
            ..
        } = pool.shutdown(self.config.shutdown_timeout()).await;

        let counters = self.counters.snapshot();
        let report = DriverReport {
            submitted,
            rejected,
            succeeded: tally.succeeded.load(Ordering::Relaxed),
            failed: tally.failed.load(Ordering::Relaxed),
            short_circuited: tally.short_circuited.load(Ordering::Relaxed),
            retries: counters.retries,
            service_unavailable: counters.service_unavailable,
            abandoned_workers,
            timed_out,
        };
        tracing::info!(report = ?report, "Load driver finished");
        report
    }
}

//! Hands admitted work to a fixed set of blocking workers.
//!
//! Each dispatch is a task/result pair: the work runs on the blocking pool
//! while the request task awaits its join handle. At most `workers` items
//! run at once, gated by a semaphore.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::Semaphore;

use crate::admission::AdmissionTicket;
use crate::observability::Counters;
use crate::work::{SimulatedWork, WorkReceipt};
use crate::workers::WorkItem;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("work dispatcher is closed")]
    Closed,

    #[error("worker failed: {0}")]
    Worker(String),
}

pub struct WorkDispatcher {
    permits: Arc<Semaphore>,
    workers: usize,
    work: Arc<dyn SimulatedWork>,
    counters: Arc<Counters>,
}

impl WorkDispatcher {
    pub fn new(workers: usize, work: Arc<dyn SimulatedWork>, counters: Arc<Counters>) -> Self {
        let workers = workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(workers)),
            workers,
            work,
            counters,
        }
    }

    /// Run `item` on a worker and wait for its receipt.
    ///
    /// The ticket is released when the work finishes, even if the caller
    /// stops waiting.
    pub async fn dispatch(&self, item: WorkItem<()>, ticket: AdmissionTicket) -> Result<WorkReceipt, DispatchError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DispatchError::Closed)?;

        let id = item.id;
        let queued_for = item.submitted_at.elapsed();
        let work = self.work.clone();
        let counters = self.counters.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let artifact = work.perform(id);
            let elapsed = started.elapsed();
            counters.record_processing_time(elapsed);
            drop(ticket);
            drop(permit);
            (artifact, elapsed)
        });

        match handle.await {
            Ok((artifact, elapsed)) => {
                tracing::debug!(task_id = id, queued_for = ?queued_for, elapsed = ?elapsed, "Work completed");
                Ok(WorkReceipt {
                    id,
                    key: artifact.key,
                    elapse_ms: elapse_ms(elapsed),
                })
            }
            Err(e) => {
                tracing::error!(task_id = id, outcome = "fatal_failure", error = %e, "Work failed at worker boundary");
                Err(DispatchError::Worker(e.to_string()))
            }
        }
    }

    /// Refuse further dispatches; running work is unaffected.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Workers not currently running anything.
    pub fn idle_workers(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

/// Whole milliseconds in `elapsed`, saturating at `u64::MAX`.
fn elapse_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

impl std::fmt::Debug for WorkDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkDispatcher")
            .field("workers", &self.workers)
            .field("idle_workers", &self.idle_workers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::{Admission, AdmissionController};
    use crate::work::WorkArtifact;
    use crate::workers::WorkIdGenerator;

    struct EchoWork;

    impl SimulatedWork for EchoWork {
        fn perform(&self, id: u64) -> WorkArtifact {
            WorkArtifact {
                key: format!("key-{}", id),
                rounds: 1,
            }
        }
    }

    struct PanickingWork;

    impl SimulatedWork for PanickingWork {
        fn perform(&self, _id: u64) -> WorkArtifact {
            panic!("generator exploded")
        }
    }

    fn admit(controller: &AdmissionController, ids: &WorkIdGenerator) -> (WorkItem<()>, AdmissionTicket) {
        let item = ids.next_item(());
        match controller.try_admit(&item) {
            Admission::Accepted(ticket) => (item, ticket),
            Admission::Rejected => panic!("admission unexpectedly rejected"),
        }
    }

    #[tokio::test]
    async fn test_receipt_and_slot_release() {
        let counters = Arc::new(Counters::detached());
        let controller = AdmissionController::new(1, true, counters.clone());
        let dispatcher = WorkDispatcher::new(2, Arc::new(EchoWork), counters);
        let ids = WorkIdGenerator::new();

        let (item, ticket) = admit(&controller, &ids);
        assert_eq!(controller.in_flight(), 1);

        let receipt = dispatcher.dispatch(item, ticket).await.unwrap();
        assert_eq!(receipt.id, 0);
        assert_eq!(receipt.key, "key-0");
        assert_eq!(controller.in_flight(), 0);
        assert_eq!(dispatcher.idle_workers(), 2);
    }

    #[tokio::test]
    async fn test_panic_becomes_worker_error() {
        let counters = Arc::new(Counters::detached());
        let controller = AdmissionController::new(1, true, counters.clone());
        let dispatcher = WorkDispatcher::new(1, Arc::new(PanickingWork), counters);
        let ids = WorkIdGenerator::new();

        let (item, ticket) = admit(&controller, &ids);
        let err = dispatcher.dispatch(item, ticket).await.unwrap_err();

        assert!(matches!(err, DispatchError::Worker(_)));
        assert_eq!(controller.in_flight(), 0);
        assert_eq!(dispatcher.idle_workers(), 1);
    }

    #[test]
    fn test_elapse_ms_saturates() {
        assert_eq!(elapse_ms(Duration::from_micros(2500)), 2);
        assert_eq!(elapse_ms(Duration::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn test_closed_dispatcher_refuses() {
        let counters = Arc::new(Counters::detached());
        let controller = AdmissionController::new(1, true, counters.clone());
        let dispatcher = WorkDispatcher::new(1, Arc::new(EchoWork), counters);
        let ids = WorkIdGenerator::new();
        dispatcher.close();

        let (item, ticket) = admit(&controller, &ids);
        let err = dispatcher.dispatch(item, ticket).await.unwrap_err();

        assert!(matches!(err, DispatchError::Closed));
        assert_eq!(controller.in_flight(), 0);
    }
}

//! Fixed-size worker pool fed by a bounded queue.
//!
//! # Responsibilities
//! - Run `N` long-lived workers pulling tasks FIFO
//! - Reject submissions synchronously once `Q` tasks are waiting
//! - Contain task panics at the worker boundary
//! - Drain within a deadline on shutdown, then abort what is left

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::observability::Counters;
use crate::workers::item::{WorkIdGenerator, WorkItem};

/// A unit of work accepted by the pool.
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Result of a [`BoundedWorkerPool::submit`] call, carrying the task id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued(u64),
    Rejected(u64),
}

impl Submission {
    pub fn is_queued(&self) -> bool {
        matches!(self, Submission::Queued(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    QueueFull,
    ShutDown,
}

/// Overflow handling for submissions that do not fit in the queue.
pub trait RejectionPolicy: Send + Sync {
    fn on_rejected(&self, pool: &str, task_id: u64, reason: RejectReason);
}

/// Logs the rejection, counts it and drops the task.
pub struct LogAndDrop {
    counters: Arc<Counters>,
}

impl LogAndDrop {
    pub fn new(counters: Arc<Counters>) -> Self {
        Self { counters }
    }
}

impl RejectionPolicy for LogAndDrop {
    fn on_rejected(&self, pool: &str, task_id: u64, reason: RejectReason) {
        self.counters.record_rejected();
        tracing::error!(pool = %pool, task_id, reason = ?reason, "reject request");
    }
}

#[derive(Debug, Default)]
struct PoolStats {
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Summary returned by [`BoundedWorkerPool::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    pub completed: u64,
    pub panicked: u64,
    /// Workers still busy at the deadline and aborted.
    pub abandoned_workers: usize,
    pub timed_out: bool,
}

pub struct BoundedWorkerPool {
    name: String,
    sender: mpsc::Sender<WorkItem<Task>>,
    workers: Vec<JoinHandle<()>>,
    capacity: usize,
    ids: WorkIdGenerator,
    policy: Arc<dyn RejectionPolicy>,
    stats: Arc<PoolStats>,
    closed: AtomicBool,
}

impl BoundedWorkerPool {
    /// Spawn `workers` workers on the current Tokio runtime.
    pub fn new(
        name: impl Into<String>,
        workers: usize,
        capacity: usize,
        policy: Arc<dyn RejectionPolicy>,
    ) -> Self {
        let name = name.into();
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let stats = Arc::new(PoolStats::default());

        let workers = (0..workers.max(1))
            .map(|index| tokio::spawn(worker_loop(index, receiver.clone(), stats.clone())))
            .collect::<Vec<_>>();

        tracing::info!(pool = %name, workers = workers.len(), capacity, "Worker pool started");

        Self {
            name,
            sender,
            workers,
            capacity,
            ids: WorkIdGenerator::new(),
            policy,
            stats,
            closed: AtomicBool::new(false),
        }
    }

    /// Enqueue `task` without waiting.
    ///
    /// A full queue runs the rejection policy; the submitter only learns the
    /// outcome from the returned value.
    pub fn submit<F>(&self, task: F) -> Submission
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let item = self.ids.next_item(Box::pin(task) as Task);
        let id = item.id;

        if self.is_closed() {
            self.policy.on_rejected(&self.name, id, RejectReason::ShutDown);
            return Submission::Rejected(id);
        }

        match self.sender.try_send(item) {
            Ok(()) => Submission::Queued(id),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.policy.on_rejected(&self.name, id, RejectReason::QueueFull);
                Submission::Rejected(id)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.policy.on_rejected(&self.name, id, RejectReason::ShutDown);
                Submission::Rejected(id)
            }
        }
    }

    /// Refuse new submissions. Queued tasks still run and drain on
    /// [`shutdown`](Self::shutdown).
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::info!(pool = %self.name, "Worker pool closed to new submissions");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Tasks waiting in the queue, not counting those being run.
    pub fn queued(&self) -> usize {
        self.capacity - self.sender.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting work and wait up to `timeout` for the queue to drain.
    ///
    /// Workers still running at the deadline are aborted; their tasks are
    /// abandoned, not cancelled cleanly.
    pub async fn shutdown(self, timeout: Duration) -> ShutdownReport {
        let BoundedWorkerPool {
            name,
            sender,
            mut workers,
            stats,
            ..
        } = self;
        drop(sender);

        tracing::info!(pool = %name, timeout = ?timeout, "Worker pool draining");

        let timed_out = tokio::time::timeout(timeout, join_all(workers.iter_mut()))
            .await
            .is_err();

        let mut abandoned_workers = 0;
        if timed_out {
            for worker in &workers {
                if !worker.is_finished() {
                    worker.abort();
                    abandoned_workers += 1;
                }
            }
            tracing::warn!(pool = %name, abandoned_workers, "Shutdown deadline reached, aborting workers");
        }

        let report = ShutdownReport {
            completed: stats.completed.load(Ordering::Relaxed),
            panicked: stats.panicked.load(Ordering::Relaxed),
            abandoned_workers,
            timed_out,
        };
        tracing::info!(pool = %name, report = ?report, "Worker pool stopped");
        report
    }
}

impl std::fmt::Debug for BoundedWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedWorkerPool")
            .field("name", &self.name)
            .field("workers", &self.workers.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

async fn worker_loop(index: usize, receiver: Arc<Mutex<mpsc::Receiver<WorkItem<Task>>>>, stats: Arc<PoolStats>) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(item) = next else {
            break;
        };

        let task_id = item.id;
        tracing::trace!(worker = index, task_id, waited = ?item.submitted_at.elapsed(), "Task started");

        // Catch-all at the worker boundary: a panicking task is a fatal
        // failure of that task only.
        match AssertUnwindSafe(item.into_payload()).catch_unwind().await {
            Ok(()) => {
                stats.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(panic) => {
                stats.panicked.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    worker = index,
                    task_id,
                    outcome = "fatal_failure",
                    panic = %panic_message(panic.as_ref()),
                    "Task failed at worker boundary"
                );
            }
        }
    }
    tracing::debug!(worker = index, "Worker exiting");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

//! Admission gate in front of the work dispatcher.
//!
//! With load shedding enabled, an arrival is admitted only if its id fits in
//! the bounded admission queue. The returned ticket keeps the id queued
//! until the work completes and the ticket is dropped.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::observability::Counters;
use crate::workers::{BoundedQueue, WorkItem};

#[derive(Debug)]
pub enum Admission {
    Accepted(AdmissionTicket),
    Rejected,
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Admission::Accepted(_))
    }
}

/// A RAII guard holding one admission-queue slot.
#[derive(Debug)]
pub struct AdmissionTicket {
    id: u64,
    queue: Option<Arc<BoundedQueue<u64>>>,
}

impl AdmissionTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this ticket occupies a queue slot (shedding enabled).
    pub fn is_tracked(&self) -> bool {
        self.queue.is_some()
    }
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        if let Some(queue) = &self.queue {
            queue.remove(&self.id);
        }
    }
}

#[derive(Debug)]
pub struct AdmissionController {
    queue: Arc<BoundedQueue<u64>>,
    load_shedding: bool,
    counters: Arc<Counters>,
}

impl AdmissionController {
    pub fn new(capacity: usize, load_shedding: bool, counters: Arc<Counters>) -> Self {
        Self {
            queue: Arc::new(BoundedQueue::new(capacity)),
            load_shedding,
            counters,
        }
    }

    pub fn from_config(config: &ServerConfig, counters: Arc<Counters>) -> Self {
        Self::new(config.admission_capacity, config.load_shedding, counters)
    }

    /// Accept or shed `item` without waiting.
    pub fn try_admit<P>(&self, item: &WorkItem<P>) -> Admission {
        if !self.load_shedding {
            return Admission::Accepted(AdmissionTicket {
                id: item.id,
                queue: None,
            });
        }

        match self.queue.offer(item.id) {
            Ok(()) => Admission::Accepted(AdmissionTicket {
                id: item.id,
                queue: Some(self.queue.clone()),
            }),
            Err(id) => {
                self.counters.record_service_unavailable();
                tracing::warn!(task_id = id, in_flight = self.queue.len(), "Admission queue full, shedding request");
                Admission::Rejected
            }
        }
    }

    /// Items currently holding an admission slot.
    pub fn in_flight(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn load_shedding(&self) -> bool {
        self.load_shedding
    }
}

//! Units of work and their id allocation.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::time::Instant;

/// A payload stamped with a monotonic id and its submission time.
#[derive(Debug)]
pub struct WorkItem<P> {
    pub id: u64,
    pub submitted_at: Instant,
    pub payload: P,
}

impl<P> WorkItem<P> {
    pub fn into_payload(self) -> P {
        self.payload
    }
}

/// Hands out strictly increasing ids, starting at zero.
#[derive(Debug, Default)]
pub struct WorkIdGenerator {
    next: AtomicU64,
}

impl WorkIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    pub fn next_item<P>(&self, payload: P) -> WorkItem<P> {
        WorkItem {
            id: self.next_id(),
            submitted_at: Instant::now(),
            payload,
        }
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let ids = WorkIdGenerator::new();
        let a = ids.next_item("a");
        let b = ids.next_item("b");

        assert_eq!(a.id, 0);
        assert_eq!(b.id, 1);
        assert!(b.submitted_at >= a.submitted_at);
        assert_eq!(ids.issued(), 2);
        assert_eq!(b.into_payload(), "b");
    }
}

//! Fixed-capacity FIFO queue with a non-blocking `offer`.
//!
//! There is no blocking enqueue: a full queue is reported to the caller,
//! who decides what overflow means.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
pub struct BoundedQueue<T> {
    capacity: usize,
    items: Mutex<VecDeque<T>>,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append `item` unless the queue is full, handing it back if it is.
    pub fn offer(&self, item: T) -> Result<(), T> {
        let mut items = self.lock();
        if items.len() >= self.capacity {
            return Err(item);
        }
        items.push_back(item);
        Ok(())
    }

    /// Remove the oldest item.
    pub fn poll(&self) -> Option<T> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.lock().len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: PartialEq> BoundedQueue<T> {
    /// Remove the first occurrence of `item`, wherever it sits.
    pub fn remove(&self, item: &T) -> bool {
        let mut items = self.lock();
        match items.iter().position(|queued| queued == item) {
            Some(index) => {
                items.remove(index);
                true
            }
            None => false,
        }
    }
}

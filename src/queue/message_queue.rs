//! Per-category message queue
//!
//! Written from the async I/O tasks, drained from the tick thread. Each
//! message category gets its own queue so a backlog in one cannot hold up
//! another. Each queue is bounded; a full queue hands the item back.

use parking_lot::Mutex;
use std::collections::VecDeque;
use tracing::warn;

/// Items a queue holds before refusing more
pub const DEFAULT_MESSAGE_QUEUE_CAPACITY: usize = 64;

#[derive(Debug)]
pub struct MessageQueue<T> {
    name: &'static str,
    capacity: usize,
    inner: Mutex<VecDeque<T>>,
}

impl<T> MessageQueue<T> {
    pub fn new(name: &'static str) -> Self {
        Self::with_capacity(name, DEFAULT_MESSAGE_QUEUE_CAPACITY)
    }

    pub fn with_capacity(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `item`, or give it back if the queue is full
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut queue = self.inner.lock();
        if queue.len() >= self.capacity {
            warn!(queue = self.name, capacity = self.capacity, "Queue full, refusing message");
            return Err(item);
        }
        queue.push_back(item);
        Ok(())
    }

    pub fn pop(&self) -> Option<T> {
        self.inner.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Take everything queued so far
    pub fn drain(&self) -> Vec<T> {
        self.inner.lock().drain(..).collect()
    }
}

//! Pending request correlation
//!
//! Each outbound request that expects a reply is registered under its
//! request ID with a callback. A reply resolves and removes it; anything
//! left unanswered past the expiry window is swept away.
//!
//! Entries are swept in registration order, which is also age order, so a
//! sweep stops at the first entry that is still young enough.

use crate::time::Timestamp;
use crate::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::{debug, warn};

/// How long a request waits for its reply
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(300);

pub type ResponseCallback<T> = Box<dyn FnOnce(T) + Send>;

struct PendingRequest<T> {
    created: Timestamp,
    callback: ResponseCallback<T>,
}

pub struct ResponseStore<T> {
    pending: HashMap<String, PendingRequest<T>>,
    order: VecDeque<(String, Timestamp)>,
    expiry: Duration,
}

impl<T> ResponseStore<T> {
    pub fn new() -> Self {
        Self::with_expiry(DEFAULT_EXPIRY)
    }

    pub fn with_expiry(expiry: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            order: VecDeque::new(),
            expiry,
        }
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.pending.contains_key(request_id)
    }

    pub fn register(&mut self, request_id: &str, callback: ResponseCallback<T>) -> Result<()> {
        self.register_at(request_id, callback, Timestamp::now())
    }

    /// Register a callback for `request_id`. An empty ID can never be
    /// answered and is refused.
    pub fn register_at(&mut self, request_id: &str, callback: ResponseCallback<T>, now: Timestamp) -> Result<()> {
        if request_id.is_empty() {
            return Err(Error::Protocol("request requires a non-empty requestID".into()));
        }

        if self
            .pending
            .insert(request_id.to_string(), PendingRequest { created: now, callback })
            .is_some()
        {
            debug!(request_id, "replaced pending request");
        }
        self.order.push_back((request_id.to_string(), now));
        Ok(())
    }

    /// Hand `payload` to the callback registered for `request_id`.
    /// Returns false when nothing was waiting for it.
    pub fn resolve(&mut self, request_id: &str, payload: T) -> bool {
        match self.pending.remove(request_id) {
            Some(request) => {
                (request.callback)(payload);
                true
            }
            None => {
                warn!(request_id, "response for a request that is not pending");
                false
            }
        }
    }

    /// Drop requests older than the expiry window. Returns how many expired.
    pub fn sweep_at(&mut self, now: Timestamp) -> usize {
        let mut expired = 0;

        while let Some((request_id, created)) = self.order.front() {
            let live = self
                .pending
                .get(request_id)
                .is_some_and(|request| request.created == *created);

            if !live {
                // Resolved or re-registered since
                self.order.pop_front();
                continue;
            }

            if now.duration_since(*created) <= self.expiry {
                break;
            }

            self.pending.remove(request_id);
            self.order.pop_front();
            expired += 1;
        }

        if expired > 0 {
            debug!(expired, remaining = self.pending.len(), "swept expired requests");
        }
        expired
    }

    pub fn sweep(&mut self) -> usize {
        self.sweep_at(Timestamp::now())
    }
}

impl<T> Default for ResponseStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_callback(counter: &Arc<AtomicUsize>) -> ResponseCallback<u32> {
        let counter = Arc::clone(counter);
        Box::new(move |value| {
            counter.fetch_add(value as usize, Ordering::SeqCst);
        })
    }

    fn secs(s: u64) -> Timestamp {
        Timestamp::from_millis(s * 1000)
    }

    #[test]
    fn test_resolve_invokes_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut store = ResponseStore::new();
        store.register_at("a", counting_callback(&counter), secs(0)).unwrap();

        assert!(store.resolve("a", 5));
        assert!(!store.resolve("a", 5));
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert!(store.is_empty());
    }

    #[test]
    fn test_empty_request_id_refused() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut store = ResponseStore::new();
        assert!(store.register_at("", counting_callback(&counter), secs(0)).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_unmatched_resolve_is_not_an_error() {
        let mut store: ResponseStore<u32> = ResponseStore::new();
        assert!(!store.resolve("never-registered", 1));
    }

    #[test]
    fn test_expiry_window() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut store = ResponseStore::new();
        store.register_at("a", counting_callback(&counter), secs(10)).unwrap();

        assert_eq!(store.sweep_at(secs(10 + 299)), 0);
        assert!(store.contains("a"));

        assert_eq!(store.sweep_at(secs(10 + 301)), 1);
        assert!(!store.resolve("a", 1));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sweep_stops_at_first_young_entry() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut store = ResponseStore::with_expiry(Duration::from_secs(10));
        store.register_at("old", counting_callback(&counter), secs(0)).unwrap();
        store.register_at("resolved", counting_callback(&counter), secs(1)).unwrap();
        store.register_at("young", counting_callback(&counter), secs(8)).unwrap();
        store.resolve("resolved", 1);

        assert_eq!(store.sweep_at(secs(15)), 1);
        assert!(store.contains("young"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reregistered_id_uses_newest_time() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut store = ResponseStore::with_expiry(Duration::from_secs(10));
        store.register_at("a", counting_callback(&counter), secs(0)).unwrap();
        store.register_at("a", counting_callback(&counter), secs(9)).unwrap();

        assert_eq!(store.sweep_at(secs(15)), 0);
        assert!(store.resolve("a", 2));
    }
}

//! Bounded access-log FIFO with peek/commit delivery semantics (spec §4.7,
//! §6).
//!
//! The teacher's `events.rs` `EventBuffer` solves the same problem — don't
//! drop an event until the server has acknowledged it — with a fixed-size
//! ring buffer and a `(count, tail_snapshot)` peek/commit protocol, because
//! `push` (Core 0) and `peek`/`commit` (Core 1) run concurrently and the
//! buffer can overflow mid-sync. Under the single-task loop there is no
//! concurrent pusher, so a `VecDeque` with front-peek/pop gives the same
//! at-least-once guarantee without the tail-reconciliation arithmetic:
//! nothing else can move the front while a delivery is in flight, and the
//! spec's controller protocol posts one log entry per request (§6) rather
//! than a batch, so there's no count to reconcile either.

use crate::model::AccessLogEntry;
use std::collections::VecDeque;

pub const CAPACITY: usize = 500;

#[derive(Debug, Default)]
pub struct LogQueue {
    entries: VecDeque<AccessLogEntry>,
}

impl LogQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, dropping the oldest if the queue is at capacity.
    pub fn push(&mut self, entry: AccessLogEntry) {
        if self.entries.len() >= CAPACITY {
            self.entries.pop_front();
            tracing::warn!("log_queue: at capacity, dropped oldest entry");
        }
        self.entries.push_back(entry);
    }

    /// Returns the oldest undelivered entry without removing it.
    pub fn peek(&self) -> Option<&AccessLogEntry> {
        self.entries.front()
    }

    /// Removes the oldest entry after the caller has confirmed delivery.
    pub fn commit(&mut self) {
        self.entries.pop_front();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CredentialType, DoorId};

    fn entry(monotonic_ms: u64) -> AccessLogEntry {
        AccessLogEntry {
            timestamp: monotonic_ms.to_string(),
            door: DoorId::One,
            principal: "alice".to_string(),
            credential: "30 33993".to_string(),
            credential_type: CredentialType::Card,
            granted: true,
            reason: "Access granted".to_string(),
            reason_code: "granted".to_string(),
            monotonic_ms,
        }
    }

    #[test]
    fn overflow_drops_oldest_not_newest() {
        let mut queue = LogQueue::new();
        for i in 0..CAPACITY as u64 + 5 {
            queue.push(entry(i));
        }
        assert_eq!(queue.len(), CAPACITY);
        assert_eq!(queue.peek().unwrap().monotonic_ms, 5);
    }

    #[test]
    fn peek_does_not_remove_until_committed() {
        let mut queue = LogQueue::new();
        queue.push(entry(1));
        queue.push(entry(2));
        assert_eq!(queue.peek().unwrap().monotonic_ms, 1);
        assert_eq!(queue.peek().unwrap().monotonic_ms, 1);
        queue.commit();
        assert_eq!(queue.peek().unwrap().monotonic_ms, 2);
    }

    #[test]
    fn commit_on_empty_queue_is_harmless() {
        let mut queue = LogQueue::new();
        queue.commit();
        assert!(queue.is_empty());
    }
}

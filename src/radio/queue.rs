//! Thread-safe FIFO queues with time-to-live eviction
//!
//! One instance holds inbound traffic, another outbound; an entry's direction
//! is the owning instance. Entries are enqueued in non-decreasing time order,
//! so eviction only ever needs to scan a prefix from the front.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct QueueEntry<T> {
    enqueued_at: Instant,
    item: T,
}

/// Mutex-guarded FIFO with TTL eviction.
///
/// The lock is held only for the duration of a single push/pop/evict call;
/// callers wanting blocking semantics compose `pop` with their own waits.
pub struct PacketQueue<T> {
    entries: Mutex<VecDeque<QueueEntry<T>>>,
}

impl<T> PacketQueue<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// O(1) append. FIFO order is preserved across concurrent producers.
    /// The timestamp is taken under the lock so enqueue times are
    /// non-decreasing, which the eviction prefix scan depends on.
    pub fn push(&self, item: T) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push_back(QueueEntry {
            enqueued_at: Instant::now(),
            item,
        });
    }

    fn push_at(&self, item: T, enqueued_at: Instant) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push_back(QueueEntry { enqueued_at, item });
    }

    /// O(1) non-blocking pop from the front
    pub fn pop(&self) -> Option<T> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.pop_front().map(|entry| entry.item)
    }

    /// Remove entries older than `retention` as of `now`, returning how many
    /// were dropped. A prefix scan suffices: no entry behind the front can
    /// expire before one ahead of it.
    pub fn evict_expired(&self, now: Instant, retention: Duration) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut evicted = 0;

        while let Some(front) = entries.front() {
            if now.duration_since(front.enqueued_at) > retention {
                entries.pop_front();
                evicted += 1;
            } else {
                break;
            }
        }

        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for PacketQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

//! Recency queue: the ordered lines of one conversation.
//!
//! A queue is either exclusive to one agent's conversation record or shared
//! by every agent observing the same public conversation. Cloning a
//! [`RecencyQueue`] clones the handle, not the lines.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use hindsight_types::line::LineEntry;
use parking_lot::RwLock;
use tracing::debug;

/// Initial capacity for a fresh queue.
const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct RecencyQueue {
    shared: bool,
    entries: Arc<RwLock<Vec<LineEntry>>>,
}

impl RecencyQueue {
    /// Create an empty queue owned by a single conversation record.
    pub fn exclusive() -> Self {
        Self::with_entries(false, Vec::with_capacity(QUEUE_CAPACITY))
    }

    /// Create an empty queue for a public conversation.
    pub fn shared() -> Self {
        Self::with_entries(true, Vec::with_capacity(QUEUE_CAPACITY))
    }

    pub(crate) fn with_entries(shared: bool, entries: Vec<LineEntry>) -> Self {
        Self {
            shared,
            entries: Arc::new(RwLock::new(entries)),
        }
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Whether both handles point at the same physical queue.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }

    pub(crate) fn lock(&self) -> &Arc<RwLock<Vec<LineEntry>>> {
        &self.entries
    }

    /// Append `line` stamped with the current time.
    ///
    /// Returns `false` when a shared queue skipped the line because it
    /// repeats the current last line.
    pub fn append(&self, line: &str) -> bool {
        self.append_at(line, Utc::now())
    }

    /// Append `line` with an explicit timestamp.
    pub fn append_at(&self, line: &str, at: DateTime<Utc>) -> bool {
        let mut entries = self.entries.write();

        // Several agents observe the same broadcast message.
        if self.shared && entries.last().is_some_and(|last| last.text == line) {
            debug!(line, "line skipped as already queued");
            return false;
        }

        entries.push(LineEntry::at(line, at));
        debug!(line, queue_len = entries.len(), "line added");
        true
    }

    /// Up to `limit` most recent lines, oldest first.
    pub fn window(&self, limit: usize) -> Vec<String> {
        let entries = self.entries.read();
        let start = entries.len().saturating_sub(limit);
        let window: Vec<String> = entries[start..].iter().map(|e| e.text.clone()).collect();
        debug!(window_len = window.len(), "got recent window");
        window
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry older than `ttl` in a single compacting pass.
    ///
    /// Returns the number of evicted entries.
    pub fn evict_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| entry.is_fresh(now, ttl));
        before - entries.len()
    }
}

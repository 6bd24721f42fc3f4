//! Bounded in-memory event log.
//!
//! Newest entries sit at the front.  Appending beyond
//! [`EVENT_LOG_CAPACITY`] evicts the oldest entry.  Entries are immutable
//! once appended; the only bulk operation is [`EventLog::clear`].

use heapless::Deque;

use crate::model::Timestamp;

/// Maximum number of retained entries.
pub const EVENT_LOG_CAPACITY: usize = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLogEntry {
    /// Unique within a session, increasing with insertion order.
    pub id: u64,
    pub at: Timestamp,
    pub label: String,
    pub detail: String,
}

pub struct EventLog {
    entries: Deque<EventLogEntry, EVENT_LOG_CAPACITY>,
    next_id: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            entries: Deque::new(),
            next_id: 1,
        }
    }

    /// Insert at the front, evicting the oldest entry when full.
    /// Returns the new entry's id.
    pub fn append(&mut self, at: Timestamp, label: &str, detail: &str) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        if self.entries.is_full() {
            self.entries.pop_back();
        }
        let entry = EventLogEntry {
            id,
            at,
            label: label.to_string(),
            detail: detail.to_string(),
        };
        // Capacity was freed above, so this cannot fail.
        let _ = self.entries.push_front(entry);
        id
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &EventLogEntry> {
        self.entries.iter()
    }

    pub fn newest(&self) -> Option<&EventLogEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of retained entries carrying `label`.
    pub fn count_label(&self, label: &str) -> usize {
        self.iter().filter(|e| e.label == label).count()
    }
}

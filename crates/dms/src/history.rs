//! Bounded detection history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Logged detection outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub detected: bool,
    pub confidence_percent: u8,
    /// Monotonic time of the entry (not serialized)
    #[serde(skip, default = "Instant::now")]
    pub timestamp: Instant,
    /// Wall-clock time of the entry
    pub recorded_at: DateTime<Utc>,
}

/// Most-recent-first log with a fixed capacity.
///
/// A new entry is only accepted when the log is empty, the detection flag
/// changed, or the newest entry is older than `interval`.
#[derive(Debug, Clone)]
pub struct DetectionHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
    interval: Duration,
}

impl DetectionHistory {
    pub fn new(capacity: usize, interval: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(64) + 1),
            capacity,
            interval,
        }
    }

    /// Whether an observation at `now` would be recorded
    pub fn should_record(&self, detected: bool, now: Instant) -> bool {
        match self.entries.front() {
            None => true,
            Some(newest) => {
                newest.detected != detected || now.saturating_duration_since(newest.timestamp) > self.interval
            }
        }
    }

    /// Apply the append rule. Returns `true` if the entry was stored.
    pub fn record(&mut self, entry: HistoryEntry) -> bool {
        if !self.should_record(entry.detected, entry.timestamp) {
            return false;
        }

        self.entries.push_front(entry);
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
        true
    }

    /// Newest entry
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Entries, newest first
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Snapshot of the entries, newest first
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

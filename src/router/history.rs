//! Bounded record of routed events, kept for observability only.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::common::types::EventCategory;

/// One routed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedRecord {
    pub event_id: u64,
    pub category: EventCategory,
    pub subject: Option<String>,
    pub destination_ids: Vec<String>,
    pub screenshot: bool,
    pub routed_at: DateTime<Utc>,
}

/// Ring of the most recent routed events; the oldest entry is evicted first.
#[derive(Debug)]
pub struct RouteHistory {
    entries: VecDeque<RoutedRecord>,
    capacity: usize,
}

impl RouteHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, record: RoutedRecord) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(record);
    }

    /// Records from oldest to newest.
    pub fn recent(&self) -> Vec<RoutedRecord> {
        self.entries.iter().cloned().collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

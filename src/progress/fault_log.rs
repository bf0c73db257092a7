use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Number of recent faults retained for reports.
pub const FAULT_LOG_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultEntry {
    pub timestamp: DateTime<Utc>,
    pub detail: String,
}

/// Rolling window of the most recent engine faults, oldest evicted first.
///
/// The log is owned by a single orchestrator and mutated through `&mut self`,
/// so `record` and `snapshot` never interleave.
#[derive(Debug, Clone)]
pub struct FaultLog {
    entries: VecDeque<FaultEntry>,
    capacity: usize,
    total_recorded: u64,
}

impl Default for FaultLog {
    fn default() -> Self {
        Self::new()
    }
}

impl FaultLog {
    pub fn new() -> Self {
        Self::with_capacity(FAULT_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            total_recorded: 0,
        }
    }

    pub fn record(&mut self, detail: impl Into<String>) {
        self.record_at(Utc::now(), detail);
    }

    pub fn record_at(&mut self, timestamp: DateTime<Utc>, detail: impl Into<String>) {
        self.entries.push_back(FaultEntry {
            timestamp,
            detail: detail.into(),
        });
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.total_recorded = self.total_recorded.saturating_add(1);
    }

    /// Owned copy of the retained entries in arrival order.
    pub fn snapshot(&self) -> Vec<FaultEntry> {
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

    /// Faults seen over the whole run, including evicted ones.
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }
}

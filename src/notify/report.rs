//! Presentation form of a [`Snapshot`]. Numbers become fixed-precision strings and
//! durations become humantime strings here, and nowhere earlier.

use crate::progress::{FaultEntry, Snapshot};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// Rendering used for values that cannot be derived from the current inputs.
pub const NOT_APPLICABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub total_requests: u64,
    pub elapsed_time: String,
    pub simulated_elapsed_time: String,
    pub throughput: String,
    pub delayed_rate: String,
    pub error_rate: String,
    pub pending_time: String,
    pub simulated_pending_time: String,
    pub errors: Vec<FaultRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultRecord {
    pub timestamp: DateTime<Utc>,
    pub detail: String,
}

impl From<&FaultEntry> for FaultRecord {
    fn from(entry: &FaultEntry) -> Self {
        Self {
            timestamp: entry.timestamp,
            detail: entry.detail.clone(),
        }
    }
}

impl Report {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            total_requests: snapshot.total_requests,
            elapsed_time: human_duration(snapshot.elapsed_time),
            simulated_elapsed_time: human_duration(snapshot.simulated_elapsed_time),
            throughput: fixed(snapshot.throughput),
            delayed_rate: fixed(snapshot.delayed_rate_pct),
            error_rate: fixed(snapshot.error_rate_pct),
            pending_time: optional_duration(snapshot.pending_time),
            simulated_pending_time: optional_duration(snapshot.simulated_pending_time),
            errors: snapshot.faults.iter().map(FaultRecord::from).collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Renders whole seconds, e.g. `2h 3m 4s`.
pub fn human_duration(duration: Duration) -> String {
    let truncated = Duration::from_secs(duration.as_secs());
    humantime::format_duration(truncated).to_string()
}

fn optional_duration(duration: Option<Duration>) -> String {
    duration
        .map(human_duration)
        .unwrap_or_else(|| NOT_APPLICABLE.to_owned())
}

fn fixed(value: Option<f64>) -> String {
    match value {
        Some(value) => format!("{value:.2}"),
        None => NOT_APPLICABLE.to_owned(),
    }
}

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Cumulative counters reported by the engine on every progress tick.
///
/// The engine is expected to keep `updates_processed <= updates_requested` and
/// `delayed + error <= processed`, but nothing downstream relies on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProgressEvent {
    pub updates_requested: u64,
    pub updates_processed: u64,
    #[serde(default)]
    pub delayed_update_requests: u64,
    #[serde(default)]
    pub error_update_requests: u64,
    /// Wall-clock time since the run started.
    #[serde(with = "duration_millis")]
    pub elapsed_time: Duration,
    /// Distance covered along the simulated timeline.
    #[serde(with = "duration_millis")]
    pub simulated_elapsed_time: Duration,
}

/// Events emitted by the engine, consumed in arrival order by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EngineEvent {
    ProgressMetrics(RawProgressEvent),
    Fault {
        detail: String,
    },
    Informational {
        message: String,
    },
    StopAcknowledged,
    Completed,
    /// Any event kind this layer does not understand.
    #[serde(other)]
    Unknown,
}

impl EngineEvent {
    /// Decodes a single event from its JSON wire form.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("failed to decode engine event")
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EngineEvent::ProgressMetrics(_) => "progress-metrics",
            EngineEvent::Fault { .. } => "fault",
            EngineEvent::Informational { .. } => "informational",
            EngineEvent::StopAcknowledged => "stop-acknowledged",
            EngineEvent::Completed => "completed",
            EngineEvent::Unknown => "unknown",
        }
    }

    /// Whether the engine considers itself finished after this event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineEvent::StopAcknowledged | EngineEvent::Completed)
    }
}

mod duration_millis {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = value.as_millis().min(u128::from(u64::MAX)) as u64;
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

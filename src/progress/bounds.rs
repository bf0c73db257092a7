use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Simulated-timeline window the engine is fast-forwarding through.
///
/// `to == None` means the run is open-ended and nothing can be projected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunBounds {
    from: DateTime<Utc>,
    to: Option<DateTime<Utc>>,
}

impl RunBounds {
    /// Resolves configured bounds. A missing `from` falls back to `run_started_at`.
    pub fn new(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        run_started_at: DateTime<Utc>,
    ) -> Result<Self> {
        let from = from.unwrap_or(run_started_at);
        if let Some(to) = to {
            if to < from {
                bail!("simulation end ({to}) must not precede simulation start ({from})");
            }
        }
        Ok(Self { from, to })
    }

    pub fn open_ended(from: DateTime<Utc>) -> Self {
        Self { from, to: None }
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to(&self) -> Option<DateTime<Utc>> {
        self.to
    }

    pub fn is_open_ended(&self) -> bool {
        self.to.is_none()
    }

    /// Length of the simulated window, if bounded.
    pub fn span(&self) -> Option<Duration> {
        let to = self.to?;
        (to - self.from).to_std().ok()
    }
}

use crate::progress::fault_log::FaultEntry;
use std::time::Duration;

/// One fully derived progress report. `None` marks a value that is not
/// applicable for the current inputs (zero divisor, open-ended run).
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub total_requests: u64,
    pub elapsed_time: Duration,
    pub simulated_elapsed_time: Duration,
    /// Requests per wall-clock second.
    pub throughput: Option<f64>,
    pub delayed_rate_pct: Option<f64>,
    pub error_rate_pct: Option<f64>,
    /// Projected wall-clock time until the simulated end is reached.
    pub pending_time: Option<Duration>,
    /// Simulated time left until the configured end.
    pub simulated_pending_time: Option<Duration>,
    pub faults: Vec<FaultEntry>,
}

impl Snapshot {
    /// Replaces the attached fault history with an owned copy.
    pub fn with_faults(mut self, faults: Vec<FaultEntry>) -> Self {
        self.faults = faults;
        self
    }
}

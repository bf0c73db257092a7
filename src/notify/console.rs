use crate::notify::report::Report;

/// Emits reports as structured log lines on the `simwatch::progress` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink {
    silent: bool,
}

impl ConsoleSink {
    pub fn new(silent: bool) -> Self {
        Self { silent }
    }

    /// Returns whether a line was emitted.
    pub fn deliver(&self, report: &Report) -> bool {
        if self.silent {
            return false;
        }

        tracing::info!(
            target: "simwatch::progress",
            total_requests = report.total_requests,
            elapsed = %report.elapsed_time,
            simulated_elapsed = %report.simulated_elapsed_time,
            throughput = %report.throughput,
            delayed_rate = %report.delayed_rate,
            error_rate = %report.error_rate,
            pending = %report.pending_time,
            simulated_pending = %report.simulated_pending_time,
            recent_faults = report.errors.len(),
            "simulation progress"
        );
        true
    }

    pub fn deliver_final(&self, report: &Report) -> bool {
        if self.silent {
            return false;
        }

        tracing::info!(
            target: "simwatch::progress",
            total_requests = report.total_requests,
            elapsed = %report.elapsed_time,
            simulated_elapsed = %report.simulated_elapsed_time,
            throughput = %report.throughput,
            delayed_rate = %report.delayed_rate,
            error_rate = %report.error_rate,
            recent_faults = report.errors.len(),
            "final simulation state"
        );
        true
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs a basic tracing subscriber (if one is not already active).
///
/// The subscriber honours `RUST_LOG` if it is present, otherwise it falls back to `info`.
/// Calling this function multiple times is harmless.
pub fn init_tracing() {
    if TRACING_INIT.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();

    let _ = TRACING_INIT.set(());
}

/// Per-run event counters kept by the orchestrator.
#[derive(Default, Debug)]
pub struct RunTelemetry {
    metrics_events: AtomicU64,
    faults: AtomicU64,
    informational: AtomicU64,
    ignored: AtomicU64,
    lifecycle: AtomicU64,
    console_lines: AtomicU64,
}

impl RunTelemetry {
    pub fn record_metrics_event(&self) {
        self.metrics_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_informational(&self) {
        self.informational.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lifecycle(&self) {
        self.lifecycle.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_console_line(&self, emitted: bool) {
        if emitted {
            self.console_lines.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            metrics_events: self.metrics_events.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            informational: self.informational.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            lifecycle: self.lifecycle.load(Ordering::Relaxed),
            console_lines: self.console_lines.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub metrics_events: u64,
    pub faults: u64,
    pub informational: u64,
    pub ignored: u64,
    pub lifecycle: u64,
    pub console_lines: u64,
}

impl TelemetrySnapshot {
    /// Total engine events the orchestrator consumed, including ignored ones.
    pub fn events_handled(&self) -> u64 {
        self.metrics_events + self.faults + self.informational + self.ignored + self.lifecycle
    }
}

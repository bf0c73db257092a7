pub mod engine;
pub mod notify;
pub mod progress;
pub mod runtime;

pub use engine::{CancellationControl, ControlFuture, EngineControl, EngineEvent, RawProgressEvent};
pub use notify::{
    DeliveryError, Dispatcher, FinalDelivery, FinalRetryPolicy, HttpReportSink, Report,
    ReportSink, SinkConfig, SinkFuture,
};
pub use progress::{project, FaultEntry, FaultLog, RunBounds, Snapshot};
pub use runtime::config::{MonitorConfig, MonitorConfigBuilder, MonitorConfigParams};
pub use runtime::fatal::{AbortReason, AbortTrigger};
pub use runtime::orchestrator::{Orchestrator, RunOutcome};
pub use runtime::state::{RunState, StopReason};
pub use runtime::telemetry::{init_tracing, RunTelemetry, TelemetrySnapshot};

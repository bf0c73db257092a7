//! Snapshot delivery: rendering into reports, the console sink, the external
//! HTTP sink, and the bounded final-retry policy.

pub mod console;
pub mod dispatcher;
pub mod error;
pub mod report;
pub mod retry;
pub mod sink;

pub use console::ConsoleSink;
pub use dispatcher::{spawn_external_reporter, Dispatcher};
pub use error::DeliveryError;
pub use report::{FaultRecord, Report, NOT_APPLICABLE};
pub use retry::{FinalDelivery, FinalRetryPolicy};
pub use sink::{HttpReportSink, ReportSink, SinkConfig, SinkFuture};

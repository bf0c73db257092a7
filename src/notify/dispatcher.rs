use crate::notify::console::ConsoleSink;
use crate::notify::error::DeliveryError;
use crate::notify::report::Report;
use crate::notify::retry::{self, FinalDelivery, FinalRetryPolicy};
use crate::notify::sink::ReportSink;
use std::sync::Arc;
use tokio::select;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Routes reports to the console and, when configured, the external sink.
#[derive(Clone)]
pub struct Dispatcher {
    console: ConsoleSink,
    external: Option<Arc<dyn ReportSink>>,
    final_policy: FinalRetryPolicy,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("console", &self.console)
            .field("external", &self.external.is_some())
            .field("final_policy", &self.final_policy)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        console: ConsoleSink,
        external: Option<Arc<dyn ReportSink>>,
        final_policy: FinalRetryPolicy,
    ) -> Self {
        Self {
            console,
            external,
            final_policy,
        }
    }

    pub fn has_external(&self) -> bool {
        self.external.is_some()
    }

    pub fn deliver_console(&self, report: &Report) -> bool {
        self.console.deliver(report)
    }

    pub fn deliver_console_final(&self, report: &Report) -> bool {
        self.console.deliver_final(report)
    }

    /// Single external attempt. Succeeds trivially without a sink or a report.
    pub async fn deliver_external(&self, report: Option<&Report>) -> Result<(), DeliveryError> {
        match (&self.external, report) {
            (Some(sink), Some(report)) => sink.deliver(report).await,
            _ => Ok(()),
        }
    }

    /// Final external delivery with the bounded retry policy.
    pub async fn deliver_external_with_retry(
        &self,
        report: Option<&Report>,
        force: Option<&CancellationToken>,
    ) -> FinalDelivery {
        match (&self.external, report) {
            (Some(sink), Some(report)) => {
                retry::deliver_with_retry(sink.as_ref(), report, self.final_policy, force).await
            }
            (None, _) => {
                tracing::debug!(target: "simwatch::notify", "no report sink configured; skipping final delivery");
                FinalDelivery::Skipped
            }
            (Some(_), None) => {
                tracing::info!(target: "simwatch::notify", "no progress observed; nothing to report");
                FinalDelivery::Skipped
            }
        }
    }
}

/// Spawns the periodic external reporter. It delivers the newest published report
/// once per change, without retries; reports superseded while a delivery is in
/// flight are skipped.
pub fn spawn_external_reporter(
    dispatcher: Dispatcher,
    mut updates: watch::Receiver<Option<Report>>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            select! {
                biased;
                _ = shutdown.cancelled() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            let report = updates.borrow_and_update().clone();
            select! {
                biased;
                _ = shutdown.cancelled() => break,
                result = dispatcher.deliver_external(report.as_ref()) => {
                    if let Err(err) = result {
                        tracing::warn!(
                            target: "simwatch::notify",
                            error = %err,
                            "periodic report delivery failed; dropping update"
                        );
                    }
                }
            }
        }
        tracing::debug!(target: "simwatch::notify", "external reporter stopped");
    })
}

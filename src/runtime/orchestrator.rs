use crate::engine::{EngineControl, EngineEvent, RawProgressEvent};
use crate::notify::{
    spawn_external_reporter, ConsoleSink, Dispatcher, FinalDelivery, HttpReportSink, Report,
    ReportSink,
};
use crate::notify::retry::duration_to_millis;
use crate::progress::{project, FaultLog, Snapshot};
use crate::runtime::config::MonitorConfig;
use crate::runtime::fatal::{AbortReason, AbortTrigger};
use crate::runtime::state::{RunState, StopReason};
use crate::runtime::telemetry::{RunTelemetry, TelemetrySnapshot};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub final_state: RunState,
    pub stop_reason: StopReason,
    pub final_delivery: FinalDelivery,
    pub final_report: Option<Report>,
    pub telemetry: TelemetrySnapshot,
}

impl RunOutcome {
    /// Every outcome exits cleanly once the final notification was attempted.
    pub fn exit_code(&self) -> i32 {
        0
    }

    /// Terminates the process with [`RunOutcome::exit_code`].
    pub fn exit(self) -> ! {
        std::process::exit(self.exit_code())
    }
}

enum Step {
    Abort,
    Forced,
    AckTimeout,
    Event(Option<EngineEvent>),
}

enum Flow {
    Continue,
    Finish(StopReason),
}

/// Consumes the engine's event stream one event at a time and owns all mutable
/// run state: the fault log, the last snapshot, and the [`RunState`] machine.
pub struct Orchestrator<E: EngineControl> {
    config: MonitorConfig,
    engine: E,
    events: mpsc::Receiver<EngineEvent>,
    dispatcher: Dispatcher,
    abort: AbortTrigger,
    faults: FaultLog,
    last_snapshot: Option<Snapshot>,
    state: RunState,
    stop_requested: bool,
    pending_reason: Option<StopReason>,
    telemetry: Arc<RunTelemetry>,
}

impl<E: EngineControl> Orchestrator<E> {
    /// Wires the configured HTTP sink. A sink that cannot be built disables external
    /// reporting instead of failing the run.
    pub fn new(config: MonitorConfig, engine: E, events: mpsc::Receiver<EngineEvent>) -> Self {
        let sink = config.sink().and_then(|sink_config| {
            match HttpReportSink::new(sink_config) {
                Ok(sink) => Some(Arc::new(sink) as Arc<dyn ReportSink>),
                Err(err) => {
                    tracing::warn!(
                        target: "simwatch::runtime",
                        error = %err,
                        "failed to build report sink; external reporting disabled"
                    );
                    None
                }
            }
        });
        Self::with_sink(config, engine, events, sink)
    }

    /// Uses `sink` instead of the configured HTTP sink.
    pub fn with_sink(
        config: MonitorConfig,
        engine: E,
        events: mpsc::Receiver<EngineEvent>,
        sink: Option<Arc<dyn ReportSink>>,
    ) -> Self {
        let dispatcher = Dispatcher::new(
            ConsoleSink::new(config.silent()),
            sink,
            config.final_retry(),
        );

        Self {
            config,
            engine,
            events,
            dispatcher,
            abort: AbortTrigger::new(),
            faults: FaultLog::new(),
            last_snapshot: None,
            state: RunState::Running,
            stop_requested: false,
            pending_reason: None,
            telemetry: Arc::new(RunTelemetry::default()),
        }
    }

    /// Handle for raising interrupts or fatal faults from outside the event loop.
    pub fn abort_trigger(&self) -> AbortTrigger {
        self.abort.clone()
    }

    pub fn telemetry(&self) -> Arc<RunTelemetry> {
        self.telemetry.clone()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Runs until the engine completes or an abort trigger fires, then performs the
    /// final notification.
    pub async fn run(mut self) -> RunOutcome {
        let signals = CancellationToken::new();
        let signal_handle = self
            .config
            .handle_ctrl_c()
            .then(|| self.abort.spawn_signal_listener(signals.clone()));

        let reporter_shutdown = CancellationToken::new();
        let (report_tx, report_rx) = watch::channel(None);
        let reporter_handle = self.dispatcher.has_external().then(|| {
            spawn_external_reporter(
                self.dispatcher.clone(),
                report_rx,
                reporter_shutdown.clone(),
            )
        });

        tracing::info!(
            target: "simwatch::runtime",
            from = %self.config.bounds().from(),
            to = ?self.config.bounds().to(),
            external_sink = self.dispatcher.has_external(),
            "monitoring simulation run"
        );

        let stop_reason = self.event_loop(&report_tx).await;

        reporter_shutdown.cancel();
        if let Some(handle) = reporter_handle {
            if let Err(err) = handle.await {
                tracing::warn!(target: "simwatch::runtime", error = %err, "external reporter task panicked");
            }
        }

        let (final_report, final_delivery) = self.flush_final().await;

        signals.cancel();
        if let Some(handle) = signal_handle {
            if let Err(err) = handle.await {
                tracing::warn!(target: "simwatch::runtime", error = %err, "signal listener task panicked");
            }
        }

        tracing::info!(
            target: "simwatch::runtime",
            state = ?self.state,
            reason = %stop_reason,
            final_delivery = ?final_delivery,
            "simulation run finished"
        );

        RunOutcome {
            final_state: self.state,
            stop_reason,
            final_delivery,
            final_report,
            telemetry: self.telemetry.snapshot(),
        }
    }

    async fn event_loop(&mut self, report_tx: &watch::Sender<Option<Report>>) -> StopReason {
        let abort = self.abort.abort_token();
        let force = self.abort.force_token();
        let mut ack_deadline: Option<Instant> = None;

        loop {
            let running = self.state.is_running();
            let waiting = ack_deadline.is_some();
            let deadline = ack_deadline.unwrap_or_else(Instant::now);

            let step = tokio::select! {
                biased;
                _ = abort.cancelled(), if running => Step::Abort,
                _ = force.cancelled(), if waiting => Step::Forced,
                _ = sleep_until(deadline), if waiting => Step::AckTimeout,
                event = self.events.recv() => Step::Event(event),
            };

            let flow = match step {
                Step::Abort => {
                    let reason = match self.abort.reason() {
                        Some(AbortReason::Fatal(message)) => StopReason::Fatal(message),
                        _ => StopReason::Interrupted,
                    };
                    match self.begin_stop(reason).await {
                        Flow::Continue => {
                            ack_deadline = Some(Instant::now() + self.config.stop_ack_timeout());
                            Flow::Continue
                        }
                        finish => finish,
                    }
                }
                Step::Forced => {
                    tracing::warn!(target: "simwatch::runtime", "forced shutdown; not waiting for engine acknowledgment");
                    Flow::Finish(self.take_pending_reason())
                }
                Step::AckTimeout => {
                    tracing::warn!(
                        target: "simwatch::runtime",
                        timeout_ms = duration_to_millis(self.config.stop_ack_timeout()),
                        "engine did not acknowledge stop in time"
                    );
                    Flow::Finish(self.take_pending_reason())
                }
                Step::Event(Some(event)) => self.handle_event(event, report_tx),
                Step::Event(None) => self.handle_stream_closed(),
            };

            if let Flow::Finish(reason) = flow {
                return reason;
            }
        }
    }

    fn handle_event(
        &mut self,
        event: EngineEvent,
        report_tx: &watch::Sender<Option<Report>>,
    ) -> Flow {
        tracing::trace!(target: "simwatch::engine", kind = event.kind(), "engine event received");
        match event {
            EngineEvent::ProgressMetrics(raw) => {
                self.telemetry.record_metrics_event();
                self.handle_metrics(&raw, report_tx);
                Flow::Continue
            }
            EngineEvent::Fault { detail } => {
                self.telemetry.record_fault();
                tracing::warn!(target: "simwatch::engine", detail = %detail, "engine fault");
                self.faults.record(detail);
                Flow::Continue
            }
            EngineEvent::Informational { message } => {
                self.telemetry.record_informational();
                tracing::info!(target: "simwatch::engine", "{message}");
                Flow::Continue
            }
            EngineEvent::Completed => {
                self.telemetry.record_lifecycle();
                if self.state.end() {
                    tracing::info!(target: "simwatch::runtime", "simulation completed");
                    Flow::Finish(StopReason::Completed)
                } else {
                    tracing::info!(target: "simwatch::runtime", "simulation completed while stopping");
                    Flow::Finish(self.take_pending_reason())
                }
            }
            EngineEvent::StopAcknowledged => {
                self.telemetry.record_lifecycle();
                if self.state.begin_stop() {
                    tracing::warn!(target: "simwatch::runtime", "engine stopped without a stop request");
                    Flow::Finish(StopReason::EngineStopped)
                } else {
                    tracing::info!(target: "simwatch::runtime", "engine acknowledged stop");
                    Flow::Finish(self.take_pending_reason())
                }
            }
            EngineEvent::Unknown => {
                self.telemetry.record_ignored();
                tracing::debug!(target: "simwatch::engine", "ignoring unknown engine event");
                Flow::Continue
            }
        }
    }

    fn handle_metrics(
        &mut self,
        raw: &RawProgressEvent,
        report_tx: &watch::Sender<Option<Report>>,
    ) {
        let snapshot = project(raw, self.config.bounds()).with_faults(self.faults.snapshot());
        let report = Report::from_snapshot(&snapshot);

        self.telemetry
            .record_console_line(self.dispatcher.deliver_console(&report));
        report_tx.send_replace(Some(report));
        self.last_snapshot = Some(snapshot);
    }

    fn handle_stream_closed(&mut self) -> Flow {
        if self.state.begin_stop() {
            tracing::error!(
                target: "simwatch::runtime",
                "engine event stream closed before completion; treating as unrecoverable"
            );
            return Flow::Finish(StopReason::EngineClosed);
        }
        tracing::debug!(target: "simwatch::runtime", "engine event stream closed while stopping");
        Flow::Finish(self.take_pending_reason())
    }

    /// Running -> Stopping and asks the engine to stop, at most once per run.
    async fn begin_stop(&mut self, reason: StopReason) -> Flow {
        if !self.state.begin_stop() {
            return Flow::Continue;
        }
        self.pending_reason = Some(reason.clone());

        if self.stop_requested {
            return Flow::Continue;
        }
        self.stop_requested = true;

        match self.engine.request_stop().await {
            Ok(()) => {
                tracing::info!(
                    target: "simwatch::runtime",
                    reason = %reason,
                    "stop requested; waiting for engine acknowledgment"
                );
                Flow::Continue
            }
            Err(err) => {
                tracing::warn!(
                    target: "simwatch::runtime",
                    error = %err,
                    "engine rejected stop request; finishing without acknowledgment"
                );
                Flow::Finish(reason)
            }
        }
    }

    fn take_pending_reason(&mut self) -> StopReason {
        self.pending_reason
            .take()
            .unwrap_or(StopReason::Interrupted)
    }

    async fn flush_final(&mut self) -> (Option<Report>, FinalDelivery) {
        let final_report = self.last_snapshot.as_ref().map(|snapshot| {
            Report::from_snapshot(&snapshot.clone().with_faults(self.faults.snapshot()))
        });

        if let Some(report) = &final_report {
            self.telemetry
                .record_console_line(self.dispatcher.deliver_console_final(report));
        }

        let force = self.abort.force_token();
        let delivery = self
            .dispatcher
            .deliver_external_with_retry(final_report.as_ref(), Some(&force))
            .await;
        (final_report, delivery)
    }
}

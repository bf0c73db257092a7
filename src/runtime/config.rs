use crate::notify::retry::{DEFAULT_FINAL_ATTEMPTS, DEFAULT_FINAL_RETRY_INTERVAL};
use crate::notify::sink::DEFAULT_SINK_REQUEST_TIMEOUT;
use crate::notify::{FinalRetryPolicy, SinkConfig};
use crate::progress::RunBounds;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;

const DEFAULT_STOP_ACK_TIMEOUT_SECS: u64 = 3;

/// Runtime configuration for a monitored simulation run.
///
/// All instances must be constructed via [`MonitorConfig::builder`] or [`MonitorConfig::new`]
/// so invariants are validated before the orchestrator observes the values.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    bounds: RunBounds,
    sink: Option<SinkConfig>,
    sink_disabled_reason: Option<String>,
    silent: bool,
    final_retry: FinalRetryPolicy,
    stop_ack_timeout: Duration,
    handle_ctrl_c: bool,
}

pub struct MonitorConfigParams {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub run_started_at: DateTime<Utc>,
    pub sink_endpoint: Option<String>,
    pub sink_id: Option<String>,
    pub sink_token: Option<String>,
    pub sink_request_timeout: Duration,
    pub silent: bool,
    pub final_attempts: usize,
    pub final_retry_interval: Duration,
    pub stop_ack_timeout: Duration,
    pub handle_ctrl_c: bool,
}

impl MonitorConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    ///
    /// A malformed sink never fails construction: it disables external reporting
    /// for the run and the reason is kept in
    /// [`MonitorConfig::sink_disabled_reason`].
    pub fn new(params: MonitorConfigParams) -> Result<Self> {
        let MonitorConfigParams {
            from,
            to,
            run_started_at,
            sink_endpoint,
            sink_id,
            sink_token,
            sink_request_timeout,
            silent,
            final_attempts,
            final_retry_interval,
            stop_ack_timeout,
            handle_ctrl_c,
        } = params;

        let bounds = RunBounds::new(from, to, run_started_at)?;
        let (sink, sink_disabled_reason) =
            match resolve_sink(sink_endpoint, sink_id, sink_token, sink_request_timeout) {
                Ok(sink) => (sink, None),
                Err(err) => {
                    tracing::warn!(
                        target: "simwatch::runtime",
                        error = %err,
                        "malformed report sink configuration; external reporting disabled"
                    );
                    (None, Some(format!("{err:#}")))
                }
            };

        let config = Self {
            bounds,
            sink,
            sink_disabled_reason,
            silent,
            final_retry: FinalRetryPolicy {
                max_attempts: final_attempts,
                interval: final_retry_interval,
            },
            stop_ack_timeout,
            handle_ctrl_c,
        };

        config.validate()?;
        Ok(config)
    }

    /// Simulated window of the run.
    pub fn bounds(&self) -> &RunBounds {
        &self.bounds
    }

    /// External sink, if one is configured and well-formed.
    pub fn sink(&self) -> Option<&SinkConfig> {
        self.sink.as_ref()
    }

    /// Why a configured sink was discarded.
    pub fn sink_disabled_reason(&self) -> Option<&str> {
        self.sink_disabled_reason.as_deref()
    }

    /// Suppresses console progress lines.
    pub fn silent(&self) -> bool {
        self.silent
    }

    /// Retry policy applied to the final external report.
    pub fn final_retry(&self) -> FinalRetryPolicy {
        self.final_retry
    }

    /// Upper bound on waiting for the engine to acknowledge a stop request.
    pub fn stop_ack_timeout(&self) -> Duration {
        self.stop_ack_timeout
    }

    /// Whether the orchestrator listens for Ctrl-C itself.
    pub fn handle_ctrl_c(&self) -> bool {
        self.handle_ctrl_c
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        if self.final_retry.max_attempts == 0 {
            bail!("final_attempts must be greater than 0");
        }

        if self.final_retry.interval.is_zero() {
            bail!("final_retry_interval must be greater than 0");
        }

        if self.stop_ack_timeout.is_zero() {
            bail!("stop_ack_timeout must be greater than 0");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MonitorConfigBuilder {
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    run_started_at: Option<DateTime<Utc>>,
    sink_endpoint: Option<String>,
    sink_id: Option<String>,
    sink_token: Option<String>,
    sink_request_timeout: Option<Duration>,
    silent: Option<bool>,
    final_attempts: Option<usize>,
    final_retry_interval: Option<Duration>,
    stop_ack_timeout: Option<Duration>,
    handle_ctrl_c: Option<bool>,
}

impl MonitorConfigBuilder {
    pub fn simulation_from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn simulation_to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn run_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.run_started_at = Some(started_at);
        self
    }

    pub fn sink_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.sink_endpoint = Some(endpoint.into());
        self
    }

    pub fn sink_id(mut self, id: impl Into<String>) -> Self {
        self.sink_id = Some(id.into());
        self
    }

    pub fn sink_token(mut self, token: impl Into<String>) -> Self {
        self.sink_token = Some(token.into());
        self
    }

    pub fn sink_request_timeout(mut self, timeout: Duration) -> Self {
        self.sink_request_timeout = Some(timeout);
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = Some(silent);
        self
    }

    pub fn final_attempts(mut self, attempts: usize) -> Self {
        self.final_attempts = Some(attempts);
        self
    }

    pub fn final_retry_interval(mut self, interval: Duration) -> Self {
        self.final_retry_interval = Some(interval);
        self
    }

    pub fn stop_ack_timeout(mut self, timeout: Duration) -> Self {
        self.stop_ack_timeout = Some(timeout);
        self
    }

    pub fn handle_ctrl_c(mut self, enabled: bool) -> Self {
        self.handle_ctrl_c = Some(enabled);
        self
    }

    pub fn build(self) -> Result<MonitorConfig> {
        let params = MonitorConfigParams {
            from: self.from,
            to: self.to,
            run_started_at: self.run_started_at.unwrap_or_else(Utc::now),
            sink_endpoint: self.sink_endpoint,
            sink_id: self.sink_id,
            sink_token: self.sink_token,
            sink_request_timeout: self
                .sink_request_timeout
                .unwrap_or(DEFAULT_SINK_REQUEST_TIMEOUT),
            silent: self.silent.unwrap_or(false),
            final_attempts: self.final_attempts.unwrap_or(DEFAULT_FINAL_ATTEMPTS),
            final_retry_interval: self
                .final_retry_interval
                .unwrap_or(DEFAULT_FINAL_RETRY_INTERVAL),
            stop_ack_timeout: self
                .stop_ack_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_STOP_ACK_TIMEOUT_SECS)),
            handle_ctrl_c: self.handle_ctrl_c.unwrap_or(true),
        };

        MonitorConfig::new(params)
    }
}

fn resolve_sink(
    endpoint: Option<String>,
    sink_id: Option<String>,
    token: Option<String>,
    request_timeout: Duration,
) -> Result<Option<SinkConfig>> {
    let endpoint = endpoint.filter(|value| !value.trim().is_empty());
    let sink_id = sink_id.filter(|value| !value.trim().is_empty());

    match (endpoint, sink_id) {
        (None, None) => Ok(None),
        (Some(_), None) => bail!("sink_id is required when sink_endpoint is set"),
        (None, Some(_)) => bail!("sink_endpoint is required when sink_id is set"),
        (Some(endpoint), Some(sink_id)) => {
            SinkConfig::new(endpoint, sink_id, token, request_timeout).map(Some)
        }
    }
}

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use simwatch::{ControlFuture, EngineControl, EngineEvent, RawProgressEvent};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

use super::mock_sink::SinkScript;

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

pub fn simulation_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

pub fn metrics(
    requested: u64,
    delayed: u64,
    errors: u64,
    elapsed_secs: u64,
    simulated_secs: u64,
) -> EngineEvent {
    EngineEvent::ProgressMetrics(RawProgressEvent {
        updates_requested: requested,
        updates_processed: requested,
        delayed_update_requests: delayed,
        error_update_requests: errors,
        elapsed_time: Duration::from_secs(elapsed_secs),
        simulated_elapsed_time: Duration::from_secs(simulated_secs),
    })
}

/// Engine stand-in that counts stop requests and, when configured, answers each one
/// with `StopAcknowledged` on the event stream.
pub struct ScriptedEngine {
    stop_requests: Arc<AtomicUsize>,
    acknowledge: Option<mpsc::Sender<EngineEvent>>,
}

impl ScriptedEngine {
    pub fn acknowledging(events: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            stop_requests: Arc::new(AtomicUsize::new(0)),
            acknowledge: Some(events),
        }
    }

    pub fn unresponsive() -> Self {
        Self {
            stop_requests: Arc::new(AtomicUsize::new(0)),
            acknowledge: None,
        }
    }

    pub fn stop_requests(&self) -> Arc<AtomicUsize> {
        self.stop_requests.clone()
    }
}

impl EngineControl for ScriptedEngine {
    fn request_stop(&mut self) -> ControlFuture<'_> {
        self.stop_requests.fetch_add(1, Ordering::SeqCst);
        let acknowledged = match &self.acknowledge {
            Some(events) => events
                .try_send(EngineEvent::StopAcknowledged)
                .map_err(|err| anyhow!("failed to acknowledge stop: {err}")),
            None => Ok(()),
        };
        Box::pin(async move { acknowledged })
    }
}

pub async fn wait_for_requests(
    script: &SinkScript,
    target: usize,
    timeout: Duration,
) -> Result<()> {
    let start = Instant::now();
    loop {
        let current = script.request_count();
        if current >= target {
            return Ok(());
        }
        if start.elapsed() > timeout {
            bail!(
                "mock sink saw {current} requests, expected at least {target} within {timeout:?}"
            );
        }
        sleep(Duration::from_millis(20)).await;
    }
}

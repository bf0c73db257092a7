use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use chrono::Utc;
use simwatch::{
    CancellationControl, EngineEvent, MonitorConfig, MonitorConfigBuilder, Orchestrator,
    RawProgressEvent,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const DEFAULT_SPAN_MINUTES: u64 = 60;
const DEFAULT_SPEEDUP: u32 = 120;
const DEFAULT_TICK_MS: u64 = 500;
const DEFAULT_UPDATES_PER_TICK: u64 = 250;
const DEFAULT_FAULT_EVERY: u64 = 7;
const DEFAULT_LOG_DIRECTIVE: &str = "info";
const EVENT_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    init_example_tracing();

    let args = DemoArgs::from_env()?;
    let config = args.to_monitor_config()?;

    let (wire_tx, wire_rx) = mpsc::channel::<String>(EVENT_BUFFER);
    let (event_tx, event_rx) = mpsc::channel::<EngineEvent>(EVENT_BUFFER);
    let stop = CancellationToken::new();

    let engine_handle = spawn_demo_engine(args.clone(), wire_tx, stop.clone());
    let bridge_handle = spawn_wire_bridge(wire_rx, event_tx);

    let orchestrator = Orchestrator::new(config, CancellationControl::new(stop), event_rx);
    orchestrator.abort_trigger().install_panic_hook();

    let outcome = orchestrator.run().await;
    engine_handle.abort();
    bridge_handle.abort();
    outcome.exit()
}

fn init_example_tracing() {
    if env::var_os("RUST_LOG").is_none() {
        env::set_var("RUST_LOG", DEFAULT_LOG_DIRECTIVE);
    }
    simwatch::init_tracing();
}

#[derive(Clone, Debug)]
struct DemoArgs {
    span: Duration,
    speedup: u32,
    tick: Duration,
    updates_per_tick: u64,
    fault_every: u64,
    sink_url: Option<String>,
    sink_id: Option<String>,
    sink_token: Option<String>,
    silent: bool,
}

impl DemoArgs {
    fn from_env() -> Result<Self> {
        let span_minutes =
            parse_env_with_default::<u64>("SIMWATCH_SPAN_MINUTES", DEFAULT_SPAN_MINUTES)?;
        let speedup = parse_env_with_default::<u32>("SIMWATCH_SPEEDUP", DEFAULT_SPEEDUP)?;
        let tick_ms = parse_env_with_default::<u64>("SIMWATCH_TICK_MS", DEFAULT_TICK_MS)?;
        let updates_per_tick =
            parse_env_with_default::<u64>("SIMWATCH_UPDATES_PER_TICK", DEFAULT_UPDATES_PER_TICK)?;
        let fault_every =
            parse_env_with_default::<u64>("SIMWATCH_FAULT_EVERY", DEFAULT_FAULT_EVERY)?;
        let silent = parse_env_with_default::<bool>("SIMWATCH_SILENT", false)?;

        ensure!(span_minutes > 0, "SIMWATCH_SPAN_MINUTES must be greater than 0");
        ensure!(speedup > 0, "SIMWATCH_SPEEDUP must be greater than 0");
        ensure!(tick_ms > 0, "SIMWATCH_TICK_MS must be greater than 0");

        Ok(Self {
            span: Duration::from_secs(span_minutes * 60),
            speedup,
            tick: Duration::from_millis(tick_ms),
            updates_per_tick,
            fault_every,
            sink_url: read_env("SIMWATCH_SINK_URL"),
            sink_id: read_env("SIMWATCH_SINK_ID"),
            sink_token: read_env("SIMWATCH_SINK_TOKEN"),
            silent,
        })
    }

    fn to_monitor_config(&self) -> Result<MonitorConfig> {
        let started_at = Utc::now();
        let span = chrono::Duration::from_std(self.span).context("simulation span out of range")?;

        let mut builder: MonitorConfigBuilder = MonitorConfig::builder()
            .run_started_at(started_at)
            .simulation_from(started_at)
            .simulation_to(started_at + span)
            .silent(self.silent);
        if let Some(url) = &self.sink_url {
            builder = builder.sink_endpoint(url.as_str());
        }
        if let Some(id) = &self.sink_id {
            builder = builder.sink_id(id.as_str());
        }
        if let Some(token) = &self.sink_token {
            builder = builder.sink_token(token.as_str());
        }
        builder.build()
    }
}

fn read_env(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => None,
    }
}

fn parse_env_with_default<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("failed to parse {key}='{value}'")),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("failed to read {key}")),
    }
}

/// Fake engine that advances simulated time `speedup` times faster than wall time and
/// writes its events as JSON lines.
fn spawn_demo_engine(
    args: DemoArgs,
    wire: mpsc::Sender<String>,
    stop: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(args.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut raw = RawProgressEvent::default();
        let mut tick: u64 = 0;

        let _ = emit(
            &wire,
            &EngineEvent::Informational {
                message: format!("fast-forwarding {:?} at {}x", args.span, args.speedup),
            },
        )
        .await;

        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    let _ = emit(&wire, &EngineEvent::StopAcknowledged).await;
                    return;
                }
                _ = ticker.tick() => {}
            }

            tick += 1;
            raw.updates_requested += args.updates_per_tick;
            raw.updates_processed += args.updates_per_tick;
            raw.delayed_update_requests += args.updates_per_tick / 20;
            raw.elapsed_time += args.tick;
            raw.simulated_elapsed_time =
                (raw.simulated_elapsed_time + args.tick.saturating_mul(args.speedup)).min(args.span);

            if args.fault_every > 0 && tick % args.fault_every == 0 {
                raw.error_update_requests += 1;
                let fault = EngineEvent::Fault {
                    detail: format!("device {} rejected update at tick {tick}", tick % 97),
                };
                if emit(&wire, &fault).await.is_err() {
                    return;
                }
            }

            if emit(&wire, &EngineEvent::ProgressMetrics(raw)).await.is_err() {
                return;
            }

            if raw.simulated_elapsed_time >= args.span {
                let _ = emit(&wire, &EngineEvent::Completed).await;
                return;
            }
        }
    })
}

async fn emit(wire: &mpsc::Sender<String>, event: &EngineEvent) -> Result<()> {
    let line = serde_json::to_string(event).context("failed to encode engine event")?;
    wire.send(line)
        .await
        .context("engine event stream closed")
}

/// Decodes JSON lines into [`EngineEvent`]s; malformed lines are logged and dropped.
fn spawn_wire_bridge(
    mut wire: mpsc::Receiver<String>,
    events: mpsc::Sender<EngineEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(line) = wire.recv().await {
            match EngineEvent::from_json(&line) {
                Ok(event) => {
                    if events.send(event).await.is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, line = %line, "dropping malformed engine event");
                }
            }
        }
    })
}

use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::support::{
    helpers::{init_tracing, metrics, simulation_start, wait_for_requests, ScriptedEngine},
    mock_sink::MockSinkServer,
};
use anyhow::Result;
use chrono::Duration as ChronoDuration;
use serde_json::json;
use simwatch::{
    CancellationControl, EngineEvent, FinalDelivery, MonitorConfig, MonitorConfigBuilder,
    Orchestrator, RunState, StopReason,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const RUN_DEADLINE: Duration = Duration::from_secs(20);

fn base_config(server: &MockSinkServer) -> MonitorConfigBuilder {
    MonitorConfig::builder()
        .simulation_from(simulation_start())
        .simulation_to(simulation_start() + ChronoDuration::hours(1))
        .sink_endpoint(server.url())
        .sink_id("run-17")
        .sink_token("s3cret")
        .final_retry_interval(Duration::from_millis(50))
        .silent(true)
        .handle_ctrl_c(false)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn completed_run_posts_periodic_and_final_reports() -> Result<()> {
    init_tracing();
    let server = MockSinkServer::start().await?;
    let (tx, rx) = mpsc::channel(64);
    let engine = ScriptedEngine::unresponsive();
    let stops = engine.stop_requests();

    let orchestrator = Orchestrator::new(base_config(&server).build()?, engine, rx);
    let run = tokio::spawn(orchestrator.run());

    tx.send(metrics(500, 10, 0, 5, 900)).await?;
    wait_for_requests(server.script(), 1, Duration::from_secs(5)).await?;

    tx.send(EngineEvent::Fault {
        detail: "device 12: firmware rejected".into(),
    })
    .await?;
    tx.send(metrics(1000, 50, 10, 10, 1800)).await?;
    tx.send(EngineEvent::Completed).await?;

    let outcome = timeout(RUN_DEADLINE, run).await??;
    assert_eq!(outcome.final_state, RunState::Ended);
    assert_eq!(outcome.stop_reason, StopReason::Completed);
    assert_eq!(outcome.final_delivery, FinalDelivery::Delivered { attempts: 1 });
    assert_eq!(stops.load(Ordering::SeqCst), 0);

    let requests = server.script().requests();
    let last = requests.last().expect("final report posted");
    assert_eq!(last.path, "/run-17");
    assert_eq!(last.authorization.as_deref(), Some("Bearer s3cret"));
    assert_eq!(last.body["totalRequests"], 1000);
    assert_eq!(last.body["simulatedPendingTime"], "30m");
    assert_eq!(last.body["errors"][0]["detail"], "device 12: firmware rejected");

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn interrupt_stops_engine_and_reports_final_state() -> Result<()> {
    init_tracing();
    let server = MockSinkServer::start().await?;
    let (tx, rx) = mpsc::channel(64);
    let engine = ScriptedEngine::acknowledging(tx.clone());
    let stops = engine.stop_requests();

    let orchestrator = Orchestrator::new(base_config(&server).build()?, engine, rx);
    let trigger = orchestrator.abort_trigger();
    let run = tokio::spawn(orchestrator.run());

    tx.send(metrics(200, 0, 0, 2, 360)).await?;
    wait_for_requests(server.script(), 1, Duration::from_secs(5)).await?;
    trigger.interrupt();

    let outcome = timeout(RUN_DEADLINE, run).await??;
    assert_eq!(outcome.final_state, RunState::Stopping);
    assert_eq!(outcome.stop_reason, StopReason::Interrupted);
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert!(outcome.final_delivery.is_delivered());
    assert_eq!(outcome.exit_code(), 0);

    let requests = server.script().requests();
    assert_eq!(
        requests.last().map(|request| &request.body["totalRequests"]),
        Some(&json!(200))
    );

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancellation_control_engine_acknowledges_stop() -> Result<()> {
    init_tracing();
    let server = MockSinkServer::start().await?;
    let (tx, rx) = mpsc::channel(64);
    let token = CancellationToken::new();
    let control = CancellationControl::new(token.clone());

    let engine_task = tokio::spawn(async move {
        let mut requested = 0;
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    let _ = tx.send(EngineEvent::StopAcknowledged).await;
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(20)) => {
                    requested += 10;
                    if tx.send(metrics(requested, 0, 0, 1, 60)).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    let orchestrator = Orchestrator::new(base_config(&server).build()?, control, rx);
    let trigger = orchestrator.abort_trigger();
    let run = tokio::spawn(orchestrator.run());

    wait_for_requests(server.script(), 1, Duration::from_secs(5)).await?;
    trigger.interrupt();

    let outcome = timeout(RUN_DEADLINE, run).await??;
    engine_task.await?;
    assert_eq!(outcome.stop_reason, StopReason::Interrupted);
    assert!(outcome.telemetry.metrics_events >= 1);
    assert!(outcome.final_delivery.is_delivered());

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unacknowledged_stop_times_out() -> Result<()> {
    init_tracing();
    let server = MockSinkServer::start().await?;
    let (tx, rx) = mpsc::channel(64);
    let engine = ScriptedEngine::unresponsive();

    let config = base_config(&server)
        .stop_ack_timeout(Duration::from_millis(200))
        .build()?;
    let orchestrator = Orchestrator::new(config, engine, rx);
    let trigger = orchestrator.abort_trigger();
    let run = tokio::spawn(orchestrator.run());

    tx.send(metrics(20, 0, 0, 1, 60)).await?;
    wait_for_requests(server.script(), 1, Duration::from_secs(5)).await?;
    trigger.interrupt();

    let outcome = timeout(RUN_DEADLINE, run).await??;
    assert_eq!(outcome.final_state, RunState::Stopping);
    assert_eq!(outcome.stop_reason, StopReason::Interrupted);
    assert!(outcome.final_delivery.is_delivered());
    drop(tx);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_sink_exhausts_final_attempts_and_exits() -> Result<()> {
    init_tracing();
    let server = MockSinkServer::start().await?;
    server.script().fail_next(usize::MAX);
    let (tx, rx) = mpsc::channel(64);

    let orchestrator = Orchestrator::new(
        base_config(&server).build()?,
        ScriptedEngine::unresponsive(),
        rx,
    );
    let run = tokio::spawn(orchestrator.run());

    tx.send(metrics(30, 3, 3, 3, 600)).await?;
    wait_for_requests(server.script(), 1, Duration::from_secs(5)).await?;
    let periodic = server.script().request_count();
    tx.send(EngineEvent::Completed).await?;

    let outcome = timeout(RUN_DEADLINE, run).await??;
    match &outcome.final_delivery {
        FinalDelivery::Exhausted { attempts, .. } => assert_eq!(*attempts, 5),
        other => panic!("expected exhausted delivery, got {other:?}"),
    }
    assert_eq!(server.script().request_count(), periodic + 5);
    assert_eq!(outcome.exit_code(), 0);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_without_metrics_skips_final_report() -> Result<()> {
    init_tracing();
    let server = MockSinkServer::start().await?;
    let (tx, rx) = mpsc::channel(64);

    let orchestrator = Orchestrator::new(
        base_config(&server).build()?,
        ScriptedEngine::unresponsive(),
        rx,
    );
    let run = tokio::spawn(orchestrator.run());

    tx.send(EngineEvent::Informational {
        message: "warming up device pool".into(),
    })
    .await?;
    tx.send(EngineEvent::Unknown).await?;
    tx.send(EngineEvent::Completed).await?;

    let outcome = timeout(RUN_DEADLINE, run).await??;
    assert_eq!(outcome.stop_reason, StopReason::Completed);
    assert_eq!(outcome.final_delivery, FinalDelivery::Skipped);
    assert!(outcome.final_report.is_none());
    assert_eq!(outcome.telemetry.ignored, 1);
    assert_eq!(server.script().request_count(), 0);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_event_stream_ends_run() -> Result<()> {
    init_tracing();
    let server = MockSinkServer::start().await?;
    let (tx, rx) = mpsc::channel(64);

    let orchestrator = Orchestrator::new(
        base_config(&server).build()?,
        ScriptedEngine::unresponsive(),
        rx,
    );
    let run = tokio::spawn(orchestrator.run());

    tx.send(metrics(40, 0, 0, 4, 120)).await?;
    drop(tx);

    let outcome = timeout(RUN_DEADLINE, run).await??;
    assert_eq!(outcome.stop_reason, StopReason::EngineClosed);
    assert!(outcome.final_delivery.is_delivered());
    assert_eq!(
        server.script().requests().last().map(|request| &request.body["totalRequests"]),
        Some(&json!(40))
    );

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panic_in_any_task_stops_run_as_fatal() -> Result<()> {
    init_tracing();
    let server = MockSinkServer::start().await?;
    let (tx, rx) = mpsc::channel(64);
    let engine = ScriptedEngine::acknowledging(tx.clone());
    let stops = engine.stop_requests();

    let orchestrator = Orchestrator::new(base_config(&server).build()?, engine, rx);
    let trigger = orchestrator.abort_trigger();
    trigger.install_panic_hook();

    tx.send(metrics(80, 0, 0, 8, 240)).await?;
    let crashed = tokio::spawn(async { panic!("engine scheduler blew up") }).await;
    assert!(crashed.is_err_and(|err| err.is_panic()));
    assert!(trigger.is_triggered());

    let outcome = timeout(RUN_DEADLINE, orchestrator.run()).await;
    // drop the hook so later panics in this binary go to the default handler
    drop(std::panic::take_hook());
    let outcome = outcome?;

    match &outcome.stop_reason {
        StopReason::Fatal(message) => {
            assert!(message.contains("engine scheduler blew up"), "got {message}");
        }
        other => panic!("expected fatal stop, got {other:?}"),
    }
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert!(outcome.final_delivery.is_delivered());
    assert_eq!(
        server.script().requests().last().map(|request| &request.body["totalRequests"]),
        Some(&json!(80))
    );

    server.shutdown().await;
    Ok(())
}

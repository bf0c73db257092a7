use std::time::Duration;

use crate::support::{
    helpers::{init_tracing, metrics, simulation_start},
    mock_sink::MockSinkServer,
};
use anyhow::Result;
use chrono::Duration as ChronoDuration;
use simwatch::{
    project, DeliveryError, EngineEvent, HttpReportSink, Report, ReportSink, RunBounds,
    SinkConfig,
};

fn sample_report() -> Report {
    let bounds = RunBounds::new(
        Some(simulation_start()),
        Some(simulation_start() + ChronoDuration::hours(1)),
        simulation_start(),
    )
    .expect("valid bounds");
    let EngineEvent::ProgressMetrics(raw) = metrics(1000, 50, 10, 10, 1800) else {
        unreachable!("metrics helper builds a metrics event");
    };
    Report::from_snapshot(&project(&raw, &bounds))
}

fn sink_for(server: &MockSinkServer, token: Option<&str>) -> Result<HttpReportSink> {
    let config = SinkConfig::new(
        server.url(),
        "run-17",
        token.map(str::to_owned),
        Duration::from_secs(2),
    )?;
    HttpReportSink::new(&config)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn posts_report_as_json_with_bearer_token() -> Result<()> {
    init_tracing();
    let server = MockSinkServer::start().await?;
    let sink = sink_for(&server, Some("s3cret"))?;

    sink.deliver(&sample_report()).await?;

    let requests = server.script().requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.path, "/run-17");
    assert_eq!(request.authorization.as_deref(), Some("Bearer s3cret"));
    assert_eq!(request.content_type.as_deref(), Some("application/json"));

    let body = &request.body;
    assert_eq!(body["totalRequests"], 1000);
    assert_eq!(body["throughput"], "100.00");
    assert_eq!(body["delayedRate"], "5.00");
    assert_eq!(body["errorRate"], "1.00");
    assert_eq!(body["pendingTime"], "10s");
    assert_eq!(body["simulatedPendingTime"], "30m");
    assert!(body["errors"].as_array().is_some_and(Vec::is_empty));

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn anonymous_sink_sends_no_authorization() -> Result<()> {
    init_tracing();
    let server = MockSinkServer::start().await?;
    let sink = sink_for(&server, None)?;

    sink.deliver(&sample_report()).await?;

    let requests = server.script().requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].authorization, None);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn server_error_is_rejected() -> Result<()> {
    init_tracing();
    let server = MockSinkServer::start().await?;
    server.script().fail_next(1);
    let sink = sink_for(&server, None)?;

    let err = sink
        .deliver(&sample_report())
        .await
        .expect_err("500 must fail delivery");
    assert_eq!(err, DeliveryError::Rejected { status: 500 });

    sink.deliver(&sample_report()).await?;
    assert_eq!(server.script().request_count(), 2);

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn acknowledged_error_field_fails_delivery() -> Result<()> {
    init_tracing();
    let server = MockSinkServer::start().await?;
    server.script().report_error_next(1);
    let sink = sink_for(&server, None)?;

    let err = sink
        .deliver(&sample_report())
        .await
        .expect_err("error field must fail delivery");
    match err {
        DeliveryError::Reported { message } => assert_eq!(message, "sink rejected report"),
        other => panic!("expected reported error, got {other:?}"),
    }

    server.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_sink_is_a_network_failure() -> Result<()> {
    init_tracing();
    let server = MockSinkServer::start().await?;
    let sink = sink_for(&server, None)?;
    server.shutdown().await;

    let err = sink
        .deliver(&sample_report())
        .await
        .expect_err("closed listener must fail delivery");
    assert!(
        matches!(err, DeliveryError::Network { .. } | DeliveryError::Timeout),
        "unexpected error {err:?}"
    );
    Ok(())
}

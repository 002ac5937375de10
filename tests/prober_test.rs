//! Health prober behaviour against scripted and real HTTP transports.

mod common;

use std::sync::Arc;
use std::time::Duration;

use chaos_monitor::{
    HealthProber, HttpTransport, ProbeMode, ProbeResponse, ServiceDescriptor, ServiceKind,
    ServiceState, TransportError,
};
use common::{
    closed_port_url, health_url, service, spawn_http_server, spawn_silent_server, MockTransport,
};

fn prober(transport: MockTransport) -> HealthProber {
    HealthProber::new(Arc::new(transport))
}

/// Paused-clock timings land on the scripted delay, give or take a tick
fn assert_ms_near(actual: Option<u64>, expected: u64) {
    let actual = actual.expect("response time should be recorded");
    assert!(
        actual >= expected && actual <= expected + 5,
        "expected ~{expected}ms, got {actual}ms"
    );
}

#[tokio::test(start_paused = true)]
async fn test_completed_2xx_is_healthy_with_elapsed_time() {
    let prober = prober(MockTransport::new().respond(health_url("a"), 50, 204));

    let status = prober.probe(&service("a")).await;

    assert_eq!(status.state, ServiceState::Healthy);
    assert_ms_near(status.response_time_ms, 50);
    assert!(status.last_checked_at.is_some());
    assert_eq!(status.detail, None);
}

#[tokio::test(start_paused = true)]
async fn test_error_status_is_unhealthy_in_status_aware_mode() {
    let prober = prober(MockTransport::new().respond(health_url("a"), 20, 503));

    let status = prober.probe(&service("a")).await;

    assert_eq!(status.state, ServiceState::Unhealthy);
    assert_ms_near(status.response_time_ms, 20);
    assert_eq!(status.detail.as_deref(), Some("HTTP 503"));
}

#[tokio::test(start_paused = true)]
async fn test_opaque_mode_treats_any_completed_request_as_healthy() {
    let prober =
        prober(MockTransport::new().respond(health_url("a"), 20, 503)).with_mode(ProbeMode::Opaque);

    let status = prober.probe(&service("a")).await;

    assert_eq!(status.state, ServiceState::Healthy);
    assert_ms_near(status.response_time_ms, 20);
}

#[tokio::test(start_paused = true)]
async fn test_unobservable_status_counts_as_healthy() {
    let prober =
        prober(MockTransport::new().respond_with(health_url("a"), 10, ProbeResponse::opaque()));

    let status = prober.probe(&service("a")).await;

    assert_eq!(status.state, ServiceState::Healthy);
    assert_eq!(status.version, None);
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_is_unknown_without_response_time() {
    let prober = prober(MockTransport::new().fail(
        health_url("a"),
        5,
        TransportError::Connect("dns error: no such host".to_string()),
    ));

    let status = prober.probe(&service("a")).await;

    assert_eq!(status.state, ServiceState::Unknown);
    assert_eq!(status.response_time_ms, None);
    assert!(status.last_checked_at.is_some());
    assert_eq!(
        status.detail.as_deref(),
        Some("connection failed: dns error: no such host")
    );
}

#[tokio::test(start_paused = true)]
async fn test_timeout_enforced_even_when_transport_ignores_it() {
    let prober =
        prober(MockTransport::new().hang(health_url("slow"))).with_timeout(Duration::from_millis(5_000));

    let started = tokio::time::Instant::now();
    let status = prober.probe(&service("slow")).await;

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(5_000) && elapsed < Duration::from_millis(5_010));
    assert_eq!(status.state, ServiceState::Unknown);
    assert_eq!(status.response_time_ms, None);
    assert_eq!(status.detail.as_deref(), Some("timed out after 5000ms"));
}

#[tokio::test(start_paused = true)]
async fn test_version_read_from_health_body() {
    let body = r#"{"status":"ok","version":"2.4.1"}"#;
    let prober = prober(MockTransport::new().respond_with(
        health_url("a"),
        10,
        ProbeResponse::with_status(200).with_body(body),
    ));

    let status = prober.probe(&service("a")).await;

    assert_eq!(status.state, ServiceState::Healthy);
    assert_eq!(status.version.as_deref(), Some("2.4.1"));
}

#[tokio::test]
async fn test_http_transport_probes_kind_specific_path() {
    let base_url = spawn_http_server(|request_line| {
        if request_line.starts_with("GET /api/health ") {
            (200, r#"{"database":"ok","version":"10.2.3"}"#.to_string())
        } else {
            (404, String::new())
        }
    })
    .await;

    let transport = HttpTransport::new("chaos-monitor-test").unwrap();
    let prober = HealthProber::new(Arc::new(transport)).with_timeout(Duration::from_secs(2));

    let grafana = ServiceDescriptor::new("Grafana", &base_url, ServiceKind::Grafana);
    let status = prober.probe(&grafana).await;
    assert_eq!(status.state, ServiceState::Healthy);
    assert_eq!(status.version.as_deref(), Some("10.2.3"));
    assert!(status.response_time_ms.is_some());

    let generic = ServiceDescriptor::new("Edge", &base_url, ServiceKind::Generic);
    let status = prober.probe(&generic).await;
    assert_eq!(status.state, ServiceState::Unhealthy);
    assert_eq!(status.detail.as_deref(), Some("HTTP 404"));
}

#[tokio::test]
async fn test_http_transport_uses_health_url_override() {
    let server_url = spawn_http_server(|request_line| {
        if request_line.starts_with("GET /ready?deep=1 ") {
            (200, r#"{"version":"0.9.0"}"#.to_string())
        } else {
            (404, String::new())
        }
    })
    .await;

    let transport = HttpTransport::new("chaos-monitor-test").unwrap();
    let prober = HealthProber::new(Arc::new(transport)).with_timeout(Duration::from_secs(2));

    let unreachable_base = closed_port_url().await;
    let cms = ServiceDescriptor::new("CMS Service", unreachable_base, ServiceKind::Generic)
        .with_health_url(format!("{server_url}/ready?deep=1"));
    let status = prober.probe(&cms).await;
    assert_eq!(status.state, ServiceState::Healthy);
    assert_eq!(status.version.as_deref(), Some("0.9.0"));
}

#[tokio::test]
async fn test_http_transport_connection_refused_is_unknown() {
    let base_url = closed_port_url().await;
    let transport = HttpTransport::new("chaos-monitor-test").unwrap();
    let prober = HealthProber::new(Arc::new(transport)).with_timeout(Duration::from_secs(2));

    let status = prober
        .probe(&ServiceDescriptor::new("Down", base_url, ServiceKind::Generic))
        .await;

    assert_eq!(status.state, ServiceState::Unknown);
    assert_eq!(status.response_time_ms, None);
    assert!(status.detail.is_some());
}

#[tokio::test]
async fn test_http_transport_silent_server_times_out() {
    let base_url = spawn_silent_server().await;
    let transport = HttpTransport::new("chaos-monitor-test").unwrap();
    let prober = HealthProber::new(Arc::new(transport)).with_timeout(Duration::from_millis(200));

    let status = prober
        .probe(&ServiceDescriptor::new("Silent", base_url, ServiceKind::Generic))
        .await;

    assert_eq!(status.state, ServiceState::Unknown);
    assert_eq!(status.detail.as_deref(), Some("timed out after 200ms"));
}

#[tokio::test]
async fn test_http_transport_ignores_oversized_body() {
    let padding = "x".repeat(chaos_monitor::transport::MAX_BODY_BYTES + 1);
    let base_url = spawn_http_server(move |_| {
        (
            200,
            format!(r#"{{"version":"9.9.9","padding":"{padding}"}}"#),
        )
    })
    .await;

    let transport = HttpTransport::new("chaos-monitor-test").unwrap();
    let prober = HealthProber::new(Arc::new(transport)).with_timeout(Duration::from_secs(2));

    let status = prober
        .probe(&ServiceDescriptor::new("Chatty", base_url, ServiceKind::Generic))
        .await;

    assert_eq!(status.state, ServiceState::Healthy);
    assert_eq!(status.version, None);
    assert!(status.response_time_ms.is_some());
}

#[tokio::test]
async fn test_http_transport_reads_body_under_limit() {
    let body = format!(r#"{{"version":"1.0.0","pad":"{}"}}"#, "y".repeat(1_000));
    let base_url = spawn_http_server(move |_| (200, body.clone())).await;

    let transport = HttpTransport::new("chaos-monitor-test").unwrap();
    let prober = HealthProber::new(Arc::new(transport)).with_timeout(Duration::from_secs(2));

    let status = prober
        .probe(&ServiceDescriptor::new("Small", base_url, ServiceKind::Generic))
        .await;

    assert_eq!(status.version.as_deref(), Some("1.0.0"));
}

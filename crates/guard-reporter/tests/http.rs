//! # HTTP Reporter Tests
//!
//! Delivery against an in-process stub backend, plus the failure paths that
//! must never reach the trap controller.

use std::rc::Rc;
use std::time::Duration;

use guard_monitor::{
    DetectionEvent, GuardConfig, Host, InspectionMonitor, KeyEvent, MonitorState, SimulatedHost,
    ViolationReport, ViolationReporter, VIOLATION_NOTICE,
};
use guard_reporter::{HttpReporter, ReporterError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Accepts one request, answers with `status`, and hands back the request body.
async fn stub_backend(status: u16) -> (String, oneshot::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        let body = loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break String::new();
            }
            raw.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&raw).to_string();
            let Some(split) = text.find("\r\n\r\n") else {
                continue;
            };
            let content_length = text[..split]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            let body = &text[split + 4..];
            if body.len() >= content_length {
                break body.to_string();
            }
        };
        let response = format!("HTTP/1.1 {status} Stub\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = tx.send(body);
    });

    (format!("http://{addr}/api/security/log"), rx)
}

/// An address nothing listens on.
async fn dead_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/api/security/log")
}

// ============================================================================
// Direct Delivery
// ============================================================================

#[tokio::test]
async fn test_deliver_posts_json_report() {
    let (endpoint, body) = stub_backend(200).await;
    let reporter = HttpReporter::new(endpoint).unwrap();

    reporter
        .deliver(&ViolationReport::for_event(DetectionEvent::ResizeAnomaly))
        .await
        .unwrap();

    let body: serde_json::Value = serde_json::from_str(&body.await.unwrap()).unwrap();
    assert_eq!(body["event_type"], "DEV_TOOLS_VIOLATION");
    assert!(body["description"].as_str().unwrap().contains("Developer Tools"));
}

#[tokio::test]
async fn test_deliver_surfaces_error_status() {
    let (endpoint, _body) = stub_backend(500).await;
    let reporter = HttpReporter::new(endpoint).unwrap();

    let result = reporter
        .deliver(&ViolationReport::for_event(DetectionEvent::ConsoleProbe))
        .await;
    assert!(matches!(result, Err(ReporterError::Status { status: 500 })));
}

#[tokio::test]
async fn test_deliver_surfaces_connection_error() {
    let reporter = HttpReporter::new(dead_endpoint().await).unwrap();

    let result = reporter
        .deliver(&ViolationReport::for_event(DetectionEvent::BlockedKeyCombo))
        .await;
    assert!(matches!(result, Err(ReporterError::Http(_))));
}

// ============================================================================
// Fire-and-Forget
// ============================================================================

#[tokio::test]
async fn test_report_is_spawned_and_settles() {
    let (endpoint, body) = stub_backend(200).await;
    let reporter = HttpReporter::new(endpoint).unwrap();

    reporter.report(ViolationReport::for_event(DetectionEvent::BlockedKeyCombo));
    // Nothing has run yet on the current-thread runtime.
    assert_eq!(reporter.in_flight(), 1);

    reporter.settle().await;
    assert_eq!(reporter.in_flight(), 0);
    assert!(body.await.unwrap().contains("DEV_TOOLS_VIOLATION"));
}

#[tokio::test]
async fn test_failed_report_is_swallowed() {
    let reporter = HttpReporter::new(dead_endpoint().await).unwrap();

    reporter.report(ViolationReport::for_event(DetectionEvent::BlockedKeyCombo));
    reporter.settle().await;
    assert_eq!(reporter.in_flight(), 0);
}

#[tokio::test]
async fn test_lockdown_does_not_wait_for_delivery() {
    let sim = Rc::new(SimulatedHost::new());
    let host: Rc<dyn Host> = sim.clone();
    let config = GuardConfig::default();
    let reporter = Rc::new(HttpReporter::new(dead_endpoint().await).unwrap());

    let monitor = InspectionMonitor::activate(host, reporter.clone(), &config).unwrap();
    sim.dispatch_keydown(KeyEvent::new("F12"));

    // Delivery is still pending, lockdown already applied.
    assert_eq!(reporter.in_flight(), 1);
    assert_eq!(monitor.state(), MonitorState::Violated);
    assert_eq!(sim.content(), VIOLATION_NOTICE);

    sim.advance(Duration::from_millis(3000));
    assert_eq!(sim.location(), "about:blank");

    // Deactivation leaves the delivery alone; it still runs to completion.
    drop(monitor);
    reporter.settle().await;
    assert_eq!(reporter.in_flight(), 0);
}

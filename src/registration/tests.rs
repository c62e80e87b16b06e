use super::mock::{test_identity, CallKind, ScriptedCoordinator};
use super::*;
use crate::config::CoordinatorConfig;
use crate::error::ServiceError;
use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

const RETRY: Duration = Duration::from_secs(10);
const PROBE: Duration = Duration::from_secs(10);

fn timing() -> SessionTiming {
    SessionTiming {
        retry_interval: RETRY,
        probe_interval: PROBE,
    }
}

fn assert_about(actual: Duration, expected: Duration) {
    let slack = Duration::from_millis(50);
    assert!(
        actual >= expected && actual <= expected + slack,
        "expected about {:?}, got {:?}",
        expected,
        actual
    );
}

#[tokio::test(start_paused = true)]
async fn test_registration_retries_on_fixed_interval() {
    let tracker = Arc::new(ConnectionTracker::new());
    let coordinator =
        Arc::new(ScriptedCoordinator::new().register_results(&[false, false, false, true]));
    let client = RegistrationClient::new(
        coordinator.clone(),
        Arc::clone(&tracker),
        RETRY,
        CancellationToken::new(),
    );

    let start = Instant::now();
    let state = client.register(&test_identity()).await;

    assert_eq!(state, ConnectionState::Connected);
    assert_eq!(tracker.current(), ConnectionState::Connected);
    assert_about(start.elapsed(), Duration::from_secs(30));
    assert_eq!(tracker.registration_attempts(), 4);
    assert!(tracker.last_contact().is_some());

    // No exponential growth: every gap is the same fixed interval
    let calls = coordinator.calls();
    assert_eq!(calls.len(), 4);
    for pair in calls.windows(2) {
        assert_about(pair[1].at - pair[0].at, RETRY);
    }
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_coordinator_then_one_registration_then_probes() {
    let tracker = Arc::new(ConnectionTracker::new());
    let coordinator = Arc::new(
        ScriptedCoordinator::new()
            .observing(Arc::clone(&tracker))
            .register_results(&[false, false, false]),
    );
    let shutdown = CancellationToken::new();
    let session = RegistrationSession::new(
        test_identity(),
        coordinator.clone(),
        Arc::clone(&tracker),
        timing(),
        shutdown.clone(),
    );
    let handle = tokio::spawn(session.run());

    sleep(Duration::from_secs(55)).await;

    let calls = coordinator.calls();
    assert_eq!(coordinator.count(CallKind::Register), 4);
    assert_eq!(coordinator.successes(CallKind::Register), 1);
    assert!(coordinator.count(CallKind::Probe) >= 2);

    // Every registration happens before the first probe
    let first_probe = calls
        .iter()
        .position(|c| c.kind == CallKind::Probe)
        .unwrap();
    assert!(calls[..first_probe]
        .iter()
        .all(|c| c.kind == CallKind::Register));
    assert!(calls[first_probe - 1].succeeded);

    // Probes only run while connected
    assert!(calls
        .iter()
        .filter(|c| c.kind == CallKind::Probe)
        .all(|c| c.state == Some(ConnectionState::Connected)));

    shutdown.cancel();
    assert_eq!(handle.await.unwrap(), ConnectionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_probe_failure_resumes_registration_before_probing_again() {
    let tracker = Arc::new(ConnectionTracker::new());
    let coordinator = Arc::new(
        ScriptedCoordinator::new()
            .observing(Arc::clone(&tracker))
            .register_results(&[true, false, false, true])
            .probe_results(&[true, false]),
    );
    let shutdown = CancellationToken::new();
    let session = RegistrationSession::new(
        test_identity(),
        coordinator.clone(),
        Arc::clone(&tracker),
        timing(),
        shutdown.clone(),
    );
    let handle = tokio::spawn(session.run());

    sleep(Duration::from_secs(45)).await;
    shutdown.cancel();
    assert_eq!(handle.await.unwrap(), ConnectionState::Stopped);

    let calls = coordinator.calls();
    let failed_probe = calls
        .iter()
        .position(|c| c.kind == CallKind::Probe && !c.succeeded)
        .unwrap();
    let next_success = failed_probe
        + calls[failed_probe..]
            .iter()
            .position(|c| c.kind == CallKind::Register && c.succeeded)
            .unwrap();

    // Registration resumes right away, without sleeping after the failed probe
    assert_eq!(calls[failed_probe + 1].kind, CallKind::Register);
    assert_about(calls[failed_probe + 1].at - calls[failed_probe].at, Duration::ZERO);

    // Nothing but registration until it succeeds again, and never while connected
    for call in &calls[failed_probe + 1..=next_success] {
        assert_eq!(call.kind, CallKind::Register);
        assert_ne!(call.state, Some(ConnectionState::Connected));
    }

    // Probing picks up again afterwards
    assert_eq!(calls[next_success + 1].kind, CallKind::Probe);
}

#[tokio::test(start_paused = true)]
async fn test_connected_iff_latest_attempt_succeeded() {
    let tracker = Arc::new(ConnectionTracker::new());
    let coordinator = Arc::new(
        ScriptedCoordinator::new()
            .register_results(&[false, true, false, true, true])
            .probe_results(&[true, false, true, true, false, false, true]),
    );
    let shutdown = CancellationToken::new();
    let session = RegistrationSession::new(
        test_identity(),
        coordinator.clone(),
        Arc::clone(&tracker),
        timing(),
        shutdown.clone(),
    );
    let handle = tokio::spawn(session.run());

    // Sample halfway between calls, while the session sleeps
    sleep(Duration::from_secs(5)).await;
    for _ in 0..12 {
        let last = coordinator.calls().last().cloned().unwrap();
        assert_eq!(
            tracker.is_connected(),
            last.succeeded,
            "state {} after {:?}",
            tracker.current(),
            last
        );
        sleep(Duration::from_secs(10)).await;
    }

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_monitor_probes_on_fixed_interval() {
    let tracker = Arc::new(ConnectionTracker::new());
    tracker.transition(ConnectionState::Connected);
    let coordinator = Arc::new(ScriptedCoordinator::new());
    let shutdown = CancellationToken::new();
    let monitor = LivenessMonitor::new(
        coordinator.clone(),
        Arc::clone(&tracker),
        PROBE,
        shutdown.clone(),
    );
    let handle = tokio::spawn(async move { monitor.monitor(&test_identity()).await });

    sleep(Duration::from_secs(35)).await;
    shutdown.cancel();
    assert_eq!(handle.await.unwrap(), ConnectionState::Stopped);

    // Probes at 0, 10, 20 and 30 seconds
    let calls = coordinator.calls();
    assert_eq!(calls.len(), 4);
    assert!(calls.iter().all(|c| c.kind == CallKind::Probe && c.succeeded));
    for pair in calls.windows(2) {
        assert_about(pair[1].at - pair[0].at, PROBE);
    }
    assert_eq!(tracker.probes_sent(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_demotes_without_sleeping() {
    let tracker = Arc::new(ConnectionTracker::new());
    tracker.transition(ConnectionState::Connected);
    let coordinator = Arc::new(ScriptedCoordinator::new().probe_results(&[false]));
    let monitor = LivenessMonitor::new(
        coordinator.clone(),
        Arc::clone(&tracker),
        PROBE,
        CancellationToken::new(),
    );

    let start = Instant::now();
    let state = monitor.monitor(&test_identity()).await;

    assert_eq!(state, ConnectionState::Disconnected);
    assert_eq!(tracker.current(), ConnectionState::Disconnected);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(coordinator.count(CallKind::Probe), 1);
}

#[tokio::test(start_paused = true)]
async fn test_monitor_only_runs_while_connected() {
    let tracker = Arc::new(ConnectionTracker::new());
    let coordinator = Arc::new(ScriptedCoordinator::new());
    let monitor = LivenessMonitor::new(
        coordinator.clone(),
        Arc::clone(&tracker),
        PROBE,
        CancellationToken::new(),
    );

    let state = monitor.monitor(&test_identity()).await;

    assert_eq!(state, ConnectionState::Unregistered);
    assert_eq!(coordinator.count(CallKind::Probe), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_during_backoff_stops_registration() {
    let tracker = Arc::new(ConnectionTracker::new());
    let coordinator = Arc::new(ScriptedCoordinator::new().register_fallback(false));
    let shutdown = CancellationToken::new();
    let client = RegistrationClient::new(
        coordinator.clone(),
        Arc::clone(&tracker),
        RETRY,
        shutdown.clone(),
    );
    let handle = tokio::spawn(async move { client.register(&test_identity()).await });

    sleep(Duration::from_secs(25)).await;
    assert_eq!(coordinator.count(CallKind::Register), 3);

    let cancelled_at = Instant::now();
    shutdown.cancel();
    assert_eq!(handle.await.unwrap(), ConnectionState::Stopped);
    // The backoff sleep is interrupted, not waited out
    assert_eq!(cancelled_at.elapsed(), Duration::ZERO);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(coordinator.count(CallKind::Register), 3);
    assert_eq!(tracker.current(), ConnectionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_while_connected_issues_no_further_calls() {
    let tracker = Arc::new(ConnectionTracker::new());
    let coordinator = Arc::new(ScriptedCoordinator::new());
    let shutdown = CancellationToken::new();
    let session = RegistrationSession::new(
        test_identity(),
        coordinator.clone(),
        Arc::clone(&tracker),
        timing(),
        shutdown.clone(),
    );
    let handle = tokio::spawn(session.run());

    sleep(Duration::from_secs(25)).await;
    shutdown.cancel();
    assert_eq!(handle.await.unwrap(), ConnectionState::Stopped);

    let calls_at_shutdown = coordinator.calls().len();
    sleep(Duration::from_secs(60)).await;
    assert_eq!(coordinator.calls().len(), calls_at_shutdown);
    assert_eq!(coordinator.count(CallKind::Register), 1);
    assert_eq!(tracker.current(), ConnectionState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_session_cancelled_before_start_makes_no_calls() {
    let tracker = Arc::new(ConnectionTracker::new());
    let coordinator = Arc::new(ScriptedCoordinator::new());
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let session = RegistrationSession::new(
        test_identity(),
        coordinator.clone(),
        Arc::clone(&tracker),
        timing(),
        shutdown,
    );

    assert_eq!(session.run().await, ConnectionState::Stopped);
    assert!(coordinator.calls().is_empty());
}

#[test]
fn test_stopped_is_terminal() {
    let tracker = ConnectionTracker::new();
    assert_eq!(tracker.current(), ConnectionState::Unregistered);

    assert!(tracker.transition(ConnectionState::Registering));
    assert!(!tracker.transition(ConnectionState::Registering));
    assert!(tracker.transition(ConnectionState::Stopped));

    assert!(!tracker.transition(ConnectionState::Registering));
    assert!(!tracker.transition(ConnectionState::Connected));
    assert_eq!(tracker.current(), ConnectionState::Stopped);
}

#[test]
fn test_register_request_wire_format() {
    let body = RegisterRequest {
        model_name: "resnet",
        model_port: 8000,
    };

    assert_eq!(
        serde_json::to_value(&body).unwrap(),
        serde_json::json!({ "modelName": "resnet", "modelPort": 8000 })
    );
}

async fn spawn_coordinator(register_status: StatusCode) -> (SocketAddr, Arc<Mutex<Vec<Value>>>) {
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&bodies);

    let app = Router::new()
        .route("/", get(|| async { "coordinator up" }))
        .route(
            "/model/register",
            post(move |Json(body): Json<Value>| {
                let recorded = Arc::clone(&recorded);
                async move {
                    recorded.lock().push(body);
                    register_status
                }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, bodies)
}

fn http_coordinator() -> HttpCoordinator {
    let config = CoordinatorConfig {
        request_timeout_secs: 2,
        ..crate::config::ModelServiceConfig::default().coordinator
    };
    HttpCoordinator::new(&config).unwrap()
}

fn identity_for(addr: SocketAddr) -> ServiceIdentity {
    ServiceIdentity {
        coordinator_port: addr.port(),
        ..test_identity()
    }
}

#[tokio::test]
async fn test_http_coordinator_register_and_probe() {
    let (addr, bodies) = spawn_coordinator(StatusCode::OK).await;
    let coordinator = http_coordinator();
    let identity = identity_for(addr);

    coordinator.register(&identity).await.unwrap();
    coordinator.probe(&identity).await.unwrap();

    let bodies = bodies.lock();
    assert_eq!(bodies.len(), 1);
    assert_eq!(
        bodies[0],
        serde_json::json!({ "modelName": "test-model", "modelPort": 8000 })
    );
}

#[tokio::test]
async fn test_http_coordinator_error_status_is_failure() {
    let (addr, _) = spawn_coordinator(StatusCode::INTERNAL_SERVER_ERROR).await;
    let coordinator = http_coordinator();

    let err = coordinator.register(&identity_for(addr)).await.unwrap_err();

    assert!(matches!(
        err,
        ServiceError::Coordinator { status: 500, .. }
    ));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_http_coordinator_connection_refused_is_transient() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = http_coordinator()
        .probe(&identity_for(addr))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Http(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_session_registers_once_over_http() {
    let (addr, bodies) = spawn_coordinator(StatusCode::CREATED).await;
    let tracker = Arc::new(ConnectionTracker::new());
    let shutdown = CancellationToken::new();
    let session = RegistrationSession::new(
        identity_for(addr),
        Arc::new(http_coordinator()),
        Arc::clone(&tracker),
        SessionTiming {
            retry_interval: Duration::from_millis(50),
            probe_interval: Duration::from_millis(50),
        },
        shutdown.clone(),
    );
    let handle = tokio::spawn(session.run());

    let mut changes = tracker.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        changes.wait_for(|state| *state == ConnectionState::Connected),
    )
    .await
    .unwrap()
    .unwrap();

    // A few probe rounds go by without another registration
    tokio::time::timeout(Duration::from_secs(5), async {
        while tracker.probes_sent() < 3 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(bodies.lock().len(), 1);

    shutdown.cancel();
    assert_eq!(handle.await.unwrap(), ConnectionState::Stopped);
}

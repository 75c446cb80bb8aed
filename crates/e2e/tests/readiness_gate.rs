//! Backend readiness gate and API login against the fake backend

mod support;

use reqwest::StatusCode;

use rwa_common::fixtures::{INVALID_USER, VALID_USER, VALID_USER_2};
use rwa_e2e::api::LoginBody;
use rwa_e2e::backend::{BackendProcess, ReadinessGate};
use rwa_e2e::config::BackendConfig;
use rwa_e2e::{ApiClient, E2eError, ErrorCategory};

use support::{closed_port_url, BackendOptions, FakeBackend, SESSION_ID};

const UI: &str = "http://localhost:3000";

#[tokio::test]
async fn test_gate_seeds_once() {
    let backend = FakeBackend::start(BackendOptions::default()).await;
    let api = ApiClient::new(&backend.url, UI).unwrap();

    ReadinessGate::new(&api, &BackendConfig::default())
        .ensure_ready()
        .await
        .unwrap();
    assert_eq!(backend.seeds(), 1);
}

#[tokio::test]
async fn test_gate_unreachable_backend() {
    let api = ApiClient::new(&closed_port_url().await, UI).unwrap();

    let err = ReadinessGate::new(&api, &BackendConfig::default())
        .ensure_ready()
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Environment);
    let message = err.to_string();
    assert!(message.contains("cd ../new-project && yarn dev"), "{message}");
}

#[tokio::test]
async fn test_gate_seed_failure_is_not_retried() {
    let backend = FakeBackend::start(BackendOptions {
        seed_fails: true,
        ..BackendOptions::default()
    })
    .await;
    let api = ApiClient::new(&backend.url, UI).unwrap();

    let err = ReadinessGate::new(&api, &BackendConfig::default())
        .ensure_ready()
        .await
        .unwrap_err();
    assert!(matches!(err, E2eError::SeedFailed(_)), "{err}");
    assert!(err.is_fatal());
    assert_eq!(backend.seeds(), 1);
}

#[tokio::test]
async fn test_backend_already_running() {
    let backend = FakeBackend::start(BackendOptions::default()).await;
    let api = ApiClient::new(&backend.url, UI).unwrap();

    let process = BackendProcess::ensure_running(&api, &BackendConfig::default())
        .await
        .unwrap();
    assert!(process.is_none());
}

#[tokio::test]
async fn test_gate_treats_bad_gateway_as_unreachable() {
    let backend = FakeBackend::start(BackendOptions {
        bad_gateway: true,
        ..BackendOptions::default()
    })
    .await;
    let api = ApiClient::new(&backend.url, UI).unwrap();

    assert!(api.ping().await.is_err());
    let err = ReadinessGate::new(&api, &BackendConfig::default())
        .ensure_ready()
        .await
        .unwrap_err();
    assert!(matches!(err, E2eError::BackendUnreachable { .. }), "{err}");
    assert_eq!(backend.seeds(), 0);
}

#[tokio::test]
async fn test_backend_without_start_command() {
    let api = ApiClient::new(&closed_port_url().await, UI).unwrap();
    let config = BackendConfig {
        start_command: None,
        ..BackendConfig::default()
    };

    let err = BackendProcess::ensure_running(&api, &config).await.unwrap_err();
    assert!(matches!(err, E2eError::BackendUnreachable { .. }), "{err}");
}

#[tokio::test]
async fn test_login_valid_users() {
    let backend = FakeBackend::start(BackendOptions::default()).await;
    let api = ApiClient::new(&backend.url, UI).unwrap();

    for user in [VALID_USER, VALID_USER_2] {
        let outcome = api.login(user.username, user.password).await.unwrap();
        assert_eq!(outcome.status, StatusCode::OK);
        assert!(outcome.is_authenticated());
        assert_eq!(outcome.user().unwrap().username, user.username);
        assert_eq!(outcome.user().unwrap().id, user.id.unwrap());
        assert_eq!(outcome.session_token().as_deref(), Some(SESSION_ID));
    }
    assert_eq!(backend.logins(), 2);
}

#[tokio::test]
async fn test_login_invalid_user_is_200_unauthorized() {
    let backend = FakeBackend::start(BackendOptions::default()).await;
    let api = ApiClient::new(&backend.url, UI).unwrap();

    let outcome = api
        .login(INVALID_USER.username, INVALID_USER.password)
        .await
        .unwrap();
    assert_eq!(outcome.status, StatusCode::OK);
    assert!(matches!(outcome.body, LoginBody::Unauthorized));
    assert!(!outcome.is_authenticated());
    assert!(outcome.session_token().is_none());
}

/// True once `pid` has exited; a zombie waiting to be reaped counts as gone
#[cfg(target_os = "linux")]
fn exited(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(')')
            .map_or(false, |(_, rest)| rest.trim_start().starts_with('Z')),
        Err(_) => true,
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_stopping_backend_stops_its_children() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("server.pid");
    let mut process =
        BackendProcess::spawn("sleep 300 & echo $! > server.pid; wait", dir.path()).unwrap();

    let mut server = None;
    for _ in 0..100 {
        if let Some(pid) = std::fs::read_to_string(&pid_file)
            .ok()
            .and_then(|s| s.trim().parse::<i32>().ok())
        {
            server = Some(pid);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    let server = server.expect("start command never wrote its pid");
    assert!(!exited(server));

    process.stop().unwrap();
    assert_eq!(process.id(), None);

    let mut gone = false;
    for _ in 0..100 {
        if exited(server) {
            gone = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(gone, "server {server} outlived the backend process");

    // Stopping twice is a no-op
    process.stop().unwrap();
}

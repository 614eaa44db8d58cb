use super::*;

use axum::http::StatusCode;
use shared::error::ErrorCode;

use crate::{
    api_status::{ApiStatus, ApiStatusMonitor},
    error_handler::classify_validation,
    notifications::NotificationStore,
    session::{MemoryCredentialStore, SessionEvents},
    test_support::spawn_inventory_server,
};

fn client(base_url: &str, credentials: Arc<dyn CredentialStore>) -> ApiClient {
    let url = Url::parse(base_url).expect("base url");
    ApiClient::new(url, credentials, Duration::from_secs(5)).expect("client")
}

fn reporting_handler() -> ErrorHandler {
    ErrorHandler::new(
        NotificationStore::default(),
        SessionEvents::default(),
        Duration::from_secs(10),
    )
}

fn login_request(password: &str) -> TokenAcquireRequest {
    TokenAcquireRequest {
        email: "admin@example.org".into(),
        password: password.into(),
        device_name: "Inventory Management UI".into(),
        wipe_tokens: true,
    }
}

#[test]
fn endpoint_joins_without_double_slashes() {
    let api = client("http://localhost:8000/api/", Arc::new(MemoryCredentialStore::default()));
    assert_eq!(api.endpoint("/info/version"), "http://localhost:8000/api/info/version");
    assert_eq!(api.endpoint("mobile/wipe"), "http://localhost:8000/api/mobile/wipe");
}

#[tokio::test]
async fn stored_token_is_sent_as_bearer() {
    let (base_url, server) = spawn_inventory_server().await.expect("spawn server");
    let api = client(&base_url, Arc::new(MemoryCredentialStore::with_token("abc")));

    let version = api.version().await.expect("version");
    assert_eq!(version["version"], "1.4.2");
    assert_eq!(server.last_authorization().as_deref(), Some("Bearer abc"));
}

#[tokio::test]
async fn anonymous_requests_carry_no_authorization() {
    let (base_url, server) = spawn_inventory_server().await.expect("spawn server");
    let api = client(&base_url, Arc::new(MemoryCredentialStore::default()));

    api.version().await.expect("version");
    assert_eq!(server.recorded().authorization, vec![None]);
}

#[tokio::test]
async fn acquire_token_parses_counted_body() {
    let (base_url, _server) = spawn_inventory_server().await.expect("spawn server");
    let api = client(&base_url, Arc::new(MemoryCredentialStore::default()));

    let acquired = api.acquire_token(&login_request("secret")).await.expect("token");
    assert_eq!(acquired.token, "1|token-abc");
    assert_eq!(acquired.active_tokens, Some(2));
}

#[tokio::test]
async fn validation_body_survives_the_transport() {
    let (base_url, _server) = spawn_inventory_server().await.expect("spawn server");
    let api = client(&base_url, Arc::new(MemoryCredentialStore::default()));

    let failure = api
        .acquire_token(&login_request(""))
        .await
        .expect_err("empty password");
    assert_eq!(failure.status(), Some(422));
    let entries = classify_validation(&failure);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].field, "password");
    assert_eq!(entries[0].message, "The password field is required.");
}

#[tokio::test]
async fn failures_are_reported_with_request_context() {
    let (base_url, server) = spawn_inventory_server().await.expect("spawn server");
    server.fail_version_with(StatusCode::INTERNAL_SERVER_ERROR);
    let handler = reporting_handler();
    let api = client(&base_url, Arc::new(MemoryCredentialStore::default()))
        .with_error_reporting(handler.clone());

    let failure = api.version().await.expect_err("server error");
    assert_eq!(failure.status(), Some(500));

    let state = handler.state();
    assert!(state.visible);
    assert_eq!(state.errors.len(), 1);
    assert_eq!(state.errors[0].code, ErrorCode::ServerError);
    assert_eq!(state.errors[0].details["context"], "API Request");
    assert_eq!(handler.notifications().len(), 1);
}

#[tokio::test]
async fn failure_keeps_the_response_body() {
    let (base_url, server) = spawn_inventory_server().await.expect("spawn server");
    server.fail_version_with(StatusCode::SERVICE_UNAVAILABLE);
    let api = client(&base_url, Arc::new(MemoryCredentialStore::default()));

    let failure = api.version().await.expect_err("unavailable");
    assert_eq!(failure.status(), Some(503));
    assert_eq!(
        failure.body().and_then(|body| body.get("message")),
        Some(&serde_json::json!("maintenance"))
    );
}

#[tokio::test]
async fn unreachable_server_is_a_network_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let handler = reporting_handler();
    let api = client(
        &format!("http://{addr}/api"),
        Arc::new(MemoryCredentialStore::default()),
    )
    .with_error_reporting(handler.clone());

    let failure = api.version().await.expect_err("connection refused");
    assert!(failure.is_network());
    assert_eq!(handler.state().errors[0].code, ErrorCode::NetworkError);
}

#[tokio::test]
async fn status_monitor_tracks_reachability() {
    let (base_url, server) = spawn_inventory_server().await.expect("spawn server");
    let monitor = ApiStatusMonitor::new(client(
        &base_url,
        Arc::new(MemoryCredentialStore::default()),
    ));
    assert_eq!(monitor.status(), ApiStatus::default());

    let up = monitor.check().await;
    assert!(up.is_api_up);
    assert!(!up.loading);
    assert_eq!(up.error, None);
    assert_eq!(
        up.version.as_ref().map(|v| v["name"].clone()),
        Some(serde_json::json!("inventory-management-api"))
    );

    server.fail_version_with(StatusCode::BAD_GATEWAY);
    let down = monitor.check().await;
    assert!(!down.is_api_up);
    assert!(!down.loading);
    assert!(down.error.is_some());
    assert_eq!(down.version, None);
    assert_eq!(*monitor.subscribe().borrow(), down);
}

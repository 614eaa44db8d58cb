//! In-process stand-in for the inventory API used by the HTTP tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use shared::protocol::TokenAcquireRequest;
use tokio::net::TcpListener;

pub const VALID_PASSWORD: &str = "secret";
pub const ISSUED_TOKEN: &str = "1|token-abc";

#[derive(Default)]
pub struct Recorded {
    pub logins: Vec<TokenAcquireRequest>,
    pub authorization: Vec<Option<String>>,
    pub wipes: usize,
    pub version_status: Option<StatusCode>,
}

#[derive(Clone, Default)]
pub struct InventoryServer {
    recorded: Arc<Mutex<Recorded>>,
}

impl InventoryServer {
    pub fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_version_with(&self, status: StatusCode) {
        self.recorded().version_status = Some(status);
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.recorded().authorization.last().cloned().flatten()
    }

    fn note_authorization(&self, headers: &HeaderMap) -> Option<String> {
        let value = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        self.recorded().authorization.push(value.clone());
        value
    }
}

/// Returns the API base url (`http://127.0.0.1:<port>/api`) and the
/// recorder shared with the handlers.
pub async fn spawn_inventory_server() -> std::io::Result<(String, InventoryServer)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = InventoryServer::default();
    let app = Router::new()
        .route("/api/mobile/acquire-token", post(acquire_token))
        .route("/api/mobile/wipe", get(wipe))
        .route("/api/info/version", get(version))
        .with_state(server.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api"), server))
}

async fn acquire_token(
    State(server): State<InventoryServer>,
    Json(request): Json<TokenAcquireRequest>,
) -> Response {
    let password = request.password.clone();
    server.recorded().logins.push(request);
    match password.as_str() {
        "" => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "message": "The given data was invalid.",
                "errors": {"password": ["The password field is required."]}
            })),
        )
            .into_response(),
        VALID_PASSWORD => format!("2;{ISSUED_TOKEN}").into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid credentials"})),
        )
            .into_response(),
    }
}

async fn wipe(State(server): State<InventoryServer>, headers: HeaderMap) -> StatusCode {
    if server.note_authorization(&headers).is_none() {
        return StatusCode::UNAUTHORIZED;
    }
    server.recorded().wipes += 1;
    StatusCode::NO_CONTENT
}

async fn version(State(server): State<InventoryServer>, headers: HeaderMap) -> Response {
    server.note_authorization(&headers);
    let failure = server.recorded().version_status;
    match failure {
        Some(status) => (status, Json(json!({"message": "maintenance"}))).into_response(),
        None => {
            Json(json!({"name": "inventory-management-api", "version": "1.4.2"})).into_response()
        }
    }
}

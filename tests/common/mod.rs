#![allow(dead_code)]

//! A fake restaurant backend served on a random local port.
//!
//! `/api/admin/*` routes accept only the bearer token in `valid_token`
//! (`new` unless a test changes it); the refresh endpoint hands out `new`
//! and counts how often it was hit. Flags on `BackendState` make the
//! refresh fail, stall or answer garbage.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, post},
};
use restaurantos::ServerConfig;
use restaurantos::jwt::JwtConfig;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

pub const JWT_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough!";

pub fn jwt() -> JwtConfig {
    JwtConfig::new(JWT_SECRET)
}

/// One request the backend saw.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub tenant: Option<String>,
}

#[derive(Default)]
pub struct BackendState {
    pub calls: Mutex<Vec<RecordedCall>>,
    pub refresh_count: AtomicUsize,
    pub refresh_fails: AtomicBool,
    pub refresh_stalls: AtomicBool,
    pub refresh_garbage: AtomicBool,
    pub valid_token: Mutex<String>,
}

impl BackendState {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.path == path)
            .collect()
    }

    pub fn refreshes(&self) -> usize {
        self.refresh_count.load(Ordering::SeqCst)
    }

    fn record(&self, method: &Method, uri: &Uri, headers: &HeaderMap) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.calls.lock().unwrap().push(RecordedCall {
            method: method.clone(),
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            authorization: header("authorization"),
            tenant: header("x-tenant-slug"),
        });
    }
}

pub struct FakeBackend {
    pub url: Url,
    pub state: Arc<BackendState>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state = Arc::new(BackendState {
            valid_token: Mutex::new("new".to_string()),
            ..Default::default()
        });

        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/register-restaurant", post(register))
            .route("/api/auth/refresh", post(refresh))
            .route("/api/auth/logout", post(logout))
            .route("/api/admin/{*rest}", any(admin))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: Url::parse(&format!("http://{}", addr)).unwrap(),
            state,
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.url.clone(), JWT_SECRET.to_vec())
    }
}

async fn login(
    State(state): State<Arc<BackendState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record(&method, &uri, &headers);

    match (body["email"].as_str(), body["password"].as_str()) {
        (Some("notoken@bella.test"), Some("secret")) => {
            Json(json!({ "user": { "email": body["email"] } })).into_response()
        }
        (Some("lapsed@bella.test"), _) => (
            StatusCode::FORBIDDEN,
            Json(json!({ "message": "Subscription inactive. Contact support." })),
        )
            .into_response(),
        (Some(_), Some("secret")) => Json(json!({
            "token": "abc",
            "refreshToken": "r1",
            "user": { "email": body["email"] }
        }))
        .into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid credentials" })),
        )
            .into_response(),
    }
}

async fn register(
    State(state): State<Arc<BackendState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record(&method, &uri, &headers);

    match body["restaurant"]["name"].as_str() {
        Some(name) if !name.is_empty() => Json(json!({
            "token": "reg",
            "refreshToken": "reg-r",
            "restaurant": { "name": name, "slug": "bella" }
        }))
        .into_response(),
        // No message in the body
        _ => (StatusCode::BAD_REQUEST, Json(json!({}))).into_response(),
    }
}

async fn refresh(
    State(state): State<Arc<BackendState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record(&method, &uri, &headers);
    state.refresh_count.fetch_add(1, Ordering::SeqCst);

    // Long enough for concurrent callers to pile up behind the first refresh
    tokio::time::sleep(Duration::from_millis(50)).await;

    if state.refresh_stalls.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
    if state.refresh_garbage.load(Ordering::SeqCst) {
        return "<html>gateway hiccup</html>".into_response();
    }

    if state.refresh_fails.load(Ordering::SeqCst) || body["refreshToken"] != "r1" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid refresh token" })),
        )
            .into_response();
    }

    Json(json!({ "token": "new", "refreshToken": "new2" })).into_response()
}

async fn logout(
    State(state): State<Arc<BackendState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> StatusCode {
    state.record(&method, &uri, &headers);
    StatusCode::OK
}

async fn admin(
    State(state): State<Arc<BackendState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    state.record(&method, &uri, &headers);

    match uri.path() {
        "/api/admin/locked" => {
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "message": "Subscription inactive" })),
            )
                .into_response();
        }
        "/api/admin/broken" => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Database unavailable" })),
            )
                .into_response();
        }
        "/api/admin/invalid" => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "message": "Name is required", "fields": ["name"] })),
            )
                .into_response();
        }
        _ => {}
    }

    let expected = format!("Bearer {}", state.valid_token.lock().unwrap());
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Token expired" })),
        )
            .into_response();
    }

    if method == Method::DELETE {
        return StatusCode::NO_CONTENT.into_response();
    }

    match uri.path() {
        "/api/admin/dashboard/summary" => Json(json!({
            "todaysOrdersCount": 7,
            "todaysRevenue": 182.25,
            "lowStockItems": []
        }))
        .into_response(),
        _ => Json(json!({ "ok": true, "path": uri.path() })).into_response(),
    }
}

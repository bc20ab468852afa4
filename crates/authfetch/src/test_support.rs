// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: a scripted backend with an auth refresh
//! endpoint and bearer-protected resources.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::RwLock;
use tokio::net::TcpListener;

use crate::client::AuthClient;
use crate::credential::{Credential, CredentialStore, MemoryStore};
use crate::session::{Location, SessionTeardown, StaticLocation};

/// Scripted refresh responses plus the token the resources accept.
pub struct BackendScript {
    /// `(status, body)` returned by successive refresh calls; the last entry repeats.
    pub refresh_responses: Vec<(u16, String)>,
    /// Delay before the refresh endpoint answers.
    pub refresh_delay: Duration,
    /// Bearer token accepted by protected resources.
    pub valid_token: String,
    /// Statuses returned by successive authorized booking fetches; the last entry repeats.
    pub booking_statuses: Vec<String>,
}

impl Default for BackendScript {
    fn default() -> Self {
        Self {
            refresh_responses: vec![(200, refreshed_body("fresh"))],
            refresh_delay: Duration::ZERO,
            valid_token: "fresh".to_owned(),
            booking_statuses: vec!["PENDING".to_owned(), "CONFIRMED".to_owned()],
        }
    }
}

/// JSON body of a successful refresh carrying `token`.
pub fn refreshed_body(token: &str) -> String {
    serde_json::json!({ "access_token": token }).to_string()
}

#[derive(Clone)]
struct BackendState {
    script: Arc<BackendScript>,
    refresh_calls: Arc<AtomicU32>,
    resource_calls: Arc<AtomicU32>,
    booking_calls: Arc<AtomicU32>,
    valid_token: Arc<RwLock<String>>,
}

/// A running mock backend.
pub struct MockBackend {
    pub addr: SocketAddr,
    pub refresh_calls: Arc<AtomicU32>,
    pub resource_calls: Arc<AtomicU32>,
    valid_token: Arc<RwLock<String>>,
}

impl MockBackend {
    #[allow(clippy::expect_used)]
    pub async fn start(script: BackendScript) -> Self {
        let refresh_calls = Arc::new(AtomicU32::new(0));
        let resource_calls = Arc::new(AtomicU32::new(0));
        let valid_token = Arc::new(RwLock::new(script.valid_token.clone()));
        let state = BackendState {
            script: Arc::new(script),
            refresh_calls: Arc::clone(&refresh_calls),
            resource_calls: Arc::clone(&resource_calls),
            booking_calls: Arc::new(AtomicU32::new(0)),
            valid_token: Arc::clone(&valid_token),
        };

        let app = Router::new()
            .route("/auth/refresh", post(refresh))
            .route("/api/private", get(private))
            .route("/api/orders/{id}", get(order))
            .route("/api/bookings/{id}", get(booking))
            .route("/api/forbidden", get(forbidden))
            .route("/api/expired", get(expired))
            .route("/api/missing", get(missing))
            .route("/api/echo", post(echo))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self { addr, refresh_calls, resource_calls, valid_token }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn refresh_url(&self) -> String {
        self.url("/auth/refresh")
    }

    pub fn refresh_count(&self) -> u32 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn resource_count(&self) -> u32 {
        self.resource_calls.load(Ordering::SeqCst)
    }

    /// Change the token protected resources accept.
    pub fn set_valid_token(&self, token: &str) {
        *self.valid_token.write() = token.to_owned();
    }
}

/// Assert that `$expr` is an `Err` whose message contains `$substr`.
#[macro_export]
macro_rules! assert_err_contains {
    ($expr:expr, $substr:expr) => {{
        let result = $expr;
        let err = result.expect_err(concat!("expected Err for: ", stringify!($expr)));
        let msg = err.to_string();
        assert!(msg.contains($substr), "expected error containing {:?}, got: {msg:?}", $substr);
    }};
}

/// Client wired to `backend`, seeded with `credential`, located at `/checkout`.
#[allow(clippy::expect_used)]
pub fn client_for(
    backend: &MockBackend,
    credential: Credential,
) -> (AuthClient, Arc<MemoryStore>, Arc<SessionTeardown>) {
    let store = Arc::new(MemoryStore::with_credential(credential));
    let location: Arc<dyn Location> = Arc::new(StaticLocation::new("/checkout"));
    let teardown = Arc::new(SessionTeardown::new(
        Arc::clone(&store) as Arc<dyn CredentialStore>,
        location,
    ));
    let client = AuthClient::builder(backend.url("/api/"), backend.refresh_url())
        .store(Arc::clone(&store) as Arc<dyn CredentialStore>)
        .teardown(Arc::clone(&teardown))
        .build()
        .expect("build client");
    (client, store, teardown)
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers.get("authorization")?.to_str().ok()?.strip_prefix("Bearer ")
}

async fn refresh(State(state): State<BackendState>, _body: String) -> impl IntoResponse {
    let idx = state.refresh_calls.fetch_add(1, Ordering::SeqCst) as usize;
    if !state.script.refresh_delay.is_zero() {
        tokio::time::sleep(state.script.refresh_delay).await;
    }
    let resps = &state.script.refresh_responses;
    let (status, body) = if idx < resps.len() {
        resps[idx].clone()
    } else {
        resps.last().cloned().unwrap_or((500, "{}".to_owned()))
    };
    (StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), body)
}

async fn private(State(state): State<BackendState>, headers: HeaderMap) -> impl IntoResponse {
    state.resource_calls.fetch_add(1, Ordering::SeqCst);
    if bearer(&headers) == Some(state.valid_token.read().as_str()) {
        (StatusCode::OK, "private data".to_owned())
    } else {
        (StatusCode::UNAUTHORIZED, r#"{"message":"Token expired"}"#.to_owned())
    }
}

async fn order(
    State(state): State<BackendState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> axum::response::Response {
    state.resource_calls.fetch_add(1, Ordering::SeqCst);
    if bearer(&headers) == Some(state.valid_token.read().as_str()) {
        Json(serde_json::json!({ "id": id, "status": "CONFIRMED" })).into_response()
    } else {
        (StatusCode::UNAUTHORIZED, "JWT expired").into_response()
    }
}

async fn booking(
    State(state): State<BackendState>,
    Path(id): Path<u64>,
    headers: HeaderMap,
) -> axum::response::Response {
    state.resource_calls.fetch_add(1, Ordering::SeqCst);
    if bearer(&headers) != Some(state.valid_token.read().as_str()) {
        return (StatusCode::UNAUTHORIZED, r#"{"error":"Session expired"}"#).into_response();
    }
    let idx = state.booking_calls.fetch_add(1, Ordering::SeqCst) as usize;
    let statuses = &state.script.booking_statuses;
    let status = statuses.get(idx).or(statuses.last()).cloned().unwrap_or_default();
    Json(serde_json::json!({ "id": id, "status": status, "seats": 2 })).into_response()
}

async fn forbidden(State(state): State<BackendState>) -> impl IntoResponse {
    state.resource_calls.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::UNAUTHORIZED,
        [("x-reason", "acl")],
        r#"{"message":"insufficient permissions"}"#,
    )
}

async fn expired(State(state): State<BackendState>) -> impl IntoResponse {
    state.resource_calls.fetch_add(1, Ordering::SeqCst);
    (StatusCode::UNAUTHORIZED, "jwt expired")
}

async fn missing(State(state): State<BackendState>) -> impl IntoResponse {
    state.resource_calls.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NOT_FOUND, "not here")
}

async fn echo(headers: HeaderMap, body: String) -> Json<serde_json::Value> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(String::from);
    Json(serde_json::json!({
        "authorization": header("authorization"),
        "x-request-id": header("x-request-id"),
        "content-type": header("content-type"),
        "body": body,
    }))
}

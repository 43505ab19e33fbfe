//! Ephemeral mock of the Mentorlink auth/user API for integration tests.
//! Token scheme: the only valid access token is `acc-{av}` and the only valid
//! refresh token is `ref-{rv}` for the current versions; a successful refresh
//! bumps both, `expire_access` bumps only the access side so the stored
//! refresh token stays usable.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde_json::{json, Value};

pub struct MockApi {
    access_version: AtomicU64,
    refresh_version: AtomicU64,
    refresh_ok: AtomicBool,
    refresh_calls: AtomicU64,
    refresh_delay_ms: AtomicU64,
    logout_fail: AtomicBool,
    always_unauthorized: AtomicBool,
    profile_calls: AtomicU64,
}

pub const VALID_EMAIL: &str = "ada@example.test";
pub const VALID_PASSWORD: &str = "s3cret";

impl MockApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            access_version: AtomicU64::new(1),
            refresh_version: AtomicU64::new(1),
            refresh_ok: AtomicBool::new(true),
            refresh_calls: AtomicU64::new(0),
            refresh_delay_ms: AtomicU64::new(0),
            logout_fail: AtomicBool::new(false),
            always_unauthorized: AtomicBool::new(false),
            profile_calls: AtomicU64::new(0),
        })
    }

    pub fn current_access(&self) -> String {
        format!("acc-{}", self.access_version.load(Ordering::SeqCst))
    }

    pub fn current_refresh(&self) -> String {
        format!("ref-{}", self.refresh_version.load(Ordering::SeqCst))
    }

    /// Invalidate the currently issued access token without telling the client.
    pub fn expire_access(&self) {
        self.access_version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn refresh_calls(&self) -> u64 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn profile_calls(&self) -> u64 {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn set_refresh_ok(&self, ok: bool) {
        self.refresh_ok.store(ok, Ordering::SeqCst);
    }

    pub fn set_refresh_delay(&self, ms: u64) {
        self.refresh_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn set_logout_fail(&self, fail: bool) {
        self.logout_fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_always_unauthorized(&self, on: bool) {
        self.always_unauthorized.store(on, Ordering::SeqCst);
    }

    fn bearer_ok(&self, headers: &HeaderMap) -> bool {
        if self.always_unauthorized.load(Ordering::SeqCst) {
            return false;
        }
        let expected = format!("Bearer {}", self.current_access());
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(|v| v == expected)
            .unwrap_or(false)
    }

    fn user_json(&self) -> Value {
        json!({
            "id": 1,
            "email": VALID_EMAIL,
            "name": "Ada",
            "age": 36,
            "roles": ["user", "admin"],
            "createdAt": "2024-01-15T10:30:00Z",
            "updatedAt": "2024-01-20T14:30:00Z"
        })
    }

    fn auth_payload(&self) -> Value {
        json!({
            "access_token": self.current_access(),
            "refresh_token": self.current_refresh(),
            "user": self.user_json()
        })
    }
}

fn unauthorized() -> (StatusCode, Json<Value>) {
    (StatusCode::UNAUTHORIZED, Json(json!({"message": "Unauthorized"})))
}

async fn login(State(m): State<Arc<MockApi>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let email = body.get("email").and_then(|v| v.as_str()).unwrap_or("");
    let password = body.get("password").and_then(|v| v.as_str()).unwrap_or("");
    if email == VALID_EMAIL && password == VALID_PASSWORD {
        (StatusCode::OK, Json(m.auth_payload()))
    } else {
        (StatusCode::UNAUTHORIZED, Json(json!({"message": "Invalid credentials"})))
    }
}

async fn register(State(m): State<Arc<MockApi>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let age = body.get("age").and_then(|v| v.as_u64()).unwrap_or(0);
    if age < 18 {
        return (StatusCode::BAD_REQUEST, Json(json!({"message": "age must be at least 18"})));
    }
    (StatusCode::OK, Json(m.auth_payload()))
}

async fn profile(State(m): State<Arc<MockApi>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    m.profile_calls.fetch_add(1, Ordering::SeqCst);
    if m.bearer_ok(&headers) {
        (StatusCode::OK, Json(m.user_json()))
    } else {
        unauthorized()
    }
}

async fn refresh(State(m): State<Arc<MockApi>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    m.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = m.refresh_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }
    if !m.refresh_ok.load(Ordering::SeqCst) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "refresh token expired"})));
    }
    let presented = body.get("refreshToken").and_then(|v| v.as_str()).unwrap_or("");
    if presented != m.current_refresh() {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "unknown refresh token"})));
    }
    m.access_version.fetch_add(1, Ordering::SeqCst);
    m.refresh_version.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::OK,
        Json(json!({
            "access_token": m.current_access(),
            "refresh_token": m.current_refresh()
        })),
    )
}

async fn logout(State(m): State<Arc<MockApi>>) -> (StatusCode, Json<Value>) {
    if m.logout_fail.load(Ordering::SeqCst) {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"message": "logout failed"})))
    } else {
        (StatusCode::OK, Json(json!({})))
    }
}

async fn update_roles(
    State(m): State<Arc<MockApi>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !m.bearer_ok(&headers) {
        return unauthorized();
    }
    let mut user = m.user_json();
    user["id"] = json!(id);
    user["roles"] = body.get("roles").cloned().unwrap_or_else(|| json!([]));
    (StatusCode::OK, Json(user))
}

async fn list_users(State(m): State<Arc<MockApi>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !m.bearer_ok(&headers) {
        return unauthorized();
    }
    (StatusCode::OK, Json(json!([m.user_json()])))
}

async fn get_user(State(m): State<Arc<MockApi>>, Path(id): Path<i64>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !m.bearer_ok(&headers) {
        return unauthorized();
    }
    let mut user = m.user_json();
    user["id"] = json!(id);
    (StatusCode::OK, Json(user))
}

async fn update_user(
    State(m): State<Arc<MockApi>>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    if !m.bearer_ok(&headers) {
        return unauthorized();
    }
    let mut user = m.user_json();
    user["id"] = json!(id);
    if let Some(name) = body.get("name") {
        user["name"] = name.clone();
    }
    (StatusCode::OK, Json(user))
}

async fn delete_user(State(m): State<Arc<MockApi>>, headers: HeaderMap) -> StatusCode {
    if !m.bearer_ok(&headers) {
        return StatusCode::UNAUTHORIZED;
    }
    StatusCode::NO_CONTENT
}

fn router(mock: Arc<MockApi>) -> Router {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/profile", get(profile))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/users/{id}/roles", patch(update_roles))
        .route("/user", get(list_users))
        .route("/user/{id}", get(get_user).patch(update_user).delete(delete_user))
        .with_state(mock)
}

/// Bind an ephemeral port and serve the mock; returns the base URL and the
/// server task handle (abort it to simulate the server going away).
pub async fn spawn(mock: Arc<MockApi>) -> (String, tokio::task::JoinHandle<()>) {
    let app = router(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind 127.0.0.1:0");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), handle)
}

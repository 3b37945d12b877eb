//! HTTP route handlers for Garden Relay.
//!
//! This module exposes the command surface to the bot front-end:
//!
//! - `POST /users/{user_id}/register` - Register a user
//! - `POST /users/{user_id}/track` - Start DM updates for a registered user
//! - `POST /users/{user_id}/stop` - Stop DM updates
//! - `GET /report` - Produce one report on demand
//! - `GET /health` - Health check endpoint
//!
//! Command responses carry the reply message the front-end should show the
//! user, so the front-end never needs to know the relay's wording.
//!
//! # Authentication
//!
//! The `/users/...` and `/report` routes require an
//! `Authorization: Bearer <token>` header matching `GARDEN_RELAY_API_TOKEN`,
//! unless `GARDEN_RELAY_UNSAFE_NO_AUTH` is enabled.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tokio::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::aggregator::ReportSource;
use crate::commands::{
    register_reply, stop_reply, track_reply, CommandHandler, StopOutcome, TrackOutcome,
};
use crate::config::Config;
use crate::report::ReportMessage;
use crate::store::RegisterOutcome;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for all route handlers.
#[derive(Clone)]
pub struct AppState {
    /// Relay configuration.
    pub config: Arc<Config>,

    /// Command handlers over the user store and session manager.
    pub commands: CommandHandler,

    /// Report producer used by `GET /report`.
    pub reports: Arc<dyn ReportSource>,

    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Creates the application state.
    #[must_use]
    pub fn new(config: Config, commands: CommandHandler, reports: Arc<dyn ReportSource>) -> Self {
        Self {
            config: Arc::new(config),
            commands,
            reports,
            start_time: Instant::now(),
        }
    }

    /// Returns `true` if the request carries the configured bearer token.
    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        if self.config.unsafe_no_auth {
            return true;
        }

        let Some(expected) = self.config.api_token.as_deref() else {
            return false;
        };

        headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| bool::from(token.as_bytes().ct_eq(expected.as_bytes())))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &"<Config>")
            .field("commands", &self.commands)
            .field("start_time", &self.start_time)
            .finish()
    }
}

// ============================================================================
// Router
// ============================================================================

/// Creates the application router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/users/{user_id}/register", post(post_register))
        .route("/users/{user_id}/track", post(post_track))
        .route("/users/{user_id}/stop", post(post_stop))
        .route("/report", get(get_report))
        .route("/health", get(get_health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Response Types
// ============================================================================

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Response body for a command.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Machine-readable outcome, e.g. `registered` or `already_tracking`.
    pub outcome: String,

    /// Reply to show the user.
    pub reply: ReportMessage,
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: "missing or invalid bearer token".to_string(),
            code: "unauthorized".to_string(),
        }),
    )
        .into_response()
}

fn command_response(status: StatusCode, outcome: &str, reply: ReportMessage) -> Response {
    (
        status,
        Json(CommandResponse {
            outcome: outcome.to_string(),
            reply,
        }),
    )
        .into_response()
}

// ============================================================================
// Command Routes
// ============================================================================

/// Optional query parameters of `POST /users/{user_id}/register`.
#[derive(Debug, Deserialize)]
struct RegisterParams {
    /// Display name used in the greeting.
    name: Option<String>,
}

/// POST /users/{user_id}/register
///
/// - `201 Created` - The user was registered
/// - `200 OK` - The user was already registered
async fn post_register(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<RegisterParams>,
    headers: HeaderMap,
) -> Response {
    if !state.is_authorized(&headers) {
        return unauthorized();
    }

    let outcome = state.commands.register(&user_id).await;
    let display_name = params.name.as_deref().unwrap_or(&user_id);
    let reply = register_reply(outcome, display_name);

    match outcome {
        RegisterOutcome::Registered => {
            command_response(StatusCode::CREATED, "registered", reply)
        }
        RegisterOutcome::AlreadyRegistered => {
            debug!(user_id = %user_id, "Already registered");
            command_response(StatusCode::OK, "already_registered", reply)
        }
    }
}

/// POST /users/{user_id}/track
///
/// - `202 Accepted` - Tracking started
/// - `403 Forbidden` - The user has not registered
/// - `409 Conflict` - The user is already tracking
async fn post_track(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !state.is_authorized(&headers) {
        return unauthorized();
    }

    let outcome = state.commands.track(&user_id).await;
    let reply = track_reply(outcome, state.commands.sessions().interval());

    match outcome {
        TrackOutcome::Started => command_response(StatusCode::ACCEPTED, "started", reply),
        TrackOutcome::NotRegistered => {
            command_response(StatusCode::FORBIDDEN, "not_registered", reply)
        }
        TrackOutcome::AlreadyTracking => {
            command_response(StatusCode::CONFLICT, "already_tracking", reply)
        }
    }
}

/// POST /users/{user_id}/stop
///
/// - `200 OK` - Tracking stopped
/// - `404 Not Found` - The user was not tracking
async fn post_stop(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !state.is_authorized(&headers) {
        return unauthorized();
    }

    let outcome = state.commands.stop(&user_id);
    let reply = stop_reply(outcome);

    match outcome {
        StopOutcome::Stopped => command_response(StatusCode::OK, "stopped", reply),
        StopOutcome::NotTracking => command_response(StatusCode::NOT_FOUND, "not_tracking", reply),
    }
}

// ============================================================================
// GET /report - On-demand Report
// ============================================================================

/// GET /report - Aggregates the feeds once and returns the rendered message.
///
/// Always `200 OK`; a feed failure yields the error message.
async fn get_report(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !state.is_authorized(&headers) {
        return unauthorized();
    }

    let report = state.reports.produce_report().await;
    info!(
        unavailable = report.is_unavailable(),
        generated_at = %report.generated_at(),
        "On-demand report produced"
    );

    Json(report.to_message()).into_response()
}

// ============================================================================
// GET /health - Health Check
// ============================================================================

/// Response body for health check endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Server status (always "ok" if responding).
    pub status: String,

    /// Number of registered users.
    pub registered_users: usize,

    /// Number of running tracking sessions.
    pub active_sessions: usize,

    /// Server uptime in seconds.
    pub uptime_seconds: u64,
}

/// GET /health - Health check endpoint. No authentication required.
async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        registered_users: state.commands.users().len().await,
        active_sessions: state.commands.sessions().active_count(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{Delivery, DeliveryError};
    use crate::feeds::FeedEndpoints;
    use crate::report::{StockReport, UNAVAILABLE_MESSAGE};
    use crate::session::SessionManager;
    use crate::store::MemoryUserStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use chrono::Utc;
    use std::path::PathBuf;
    use std::time::Duration;
    use tower::ServiceExt;

    const TOKEN: &str = "test-token";

    struct ErrorSource;

    #[async_trait]
    impl ReportSource for ErrorSource {
        async fn produce_report(&self) -> StockReport {
            StockReport::unavailable(Utc::now())
        }
    }

    struct NullDelivery;

    #[async_trait]
    impl Delivery for NullDelivery {
        async fn deliver(
            &self,
            _user_id: &str,
            _report: &StockReport,
        ) -> Result<(), DeliveryError> {
            Ok(())
        }
    }

    fn test_config(unsafe_no_auth: bool) -> Config {
        Config {
            port: 0,
            users_file: PathBuf::from("unused.json"),
            endpoints: FeedEndpoints::default(),
            delivery_url: "http://localhost".to_string(),
            interval: Duration::from_secs(10),
            fetch_timeout: None,
            api_token: Some(TOKEN.to_string()),
            unsafe_no_auth,
        }
    }

    fn test_state(unsafe_no_auth: bool) -> AppState {
        let source: Arc<dyn ReportSource> = Arc::new(ErrorSource);
        let sessions = SessionManager::new(source.clone(), Arc::new(NullDelivery));
        let commands = CommandHandler::new(Arc::new(MemoryUserStore::new()), sessions);
        AppState::new(test_config(unsafe_no_auth), commands, source)
    }

    fn authed(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(AUTHORIZATION, format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    #[tokio::test]
    async fn command_without_token_is_rejected() {
        let app = create_router(test_state(false));

        let request = Request::builder()
            .method(Method::POST)
            .uri("/users/U1/register")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");
    }

    #[tokio::test]
    async fn command_with_wrong_token_is_rejected() {
        let app = create_router(test_state(false));

        let request = Request::builder()
            .method(Method::POST)
            .uri("/users/U1/register")
            .header(AUTHORIZATION, "Bearer wrong")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unsafe_mode_skips_token_check() {
        let app = create_router(test_state(true));

        let request = Request::builder()
            .method(Method::POST)
            .uri("/users/U1/register")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;

        assert_eq!(status, StatusCode::CREATED);
    }

    // ========================================================================
    // Commands
    // ========================================================================

    #[tokio::test]
    async fn register_twice_returns_already_registered() {
        let app = create_router(test_state(false));

        let (status, body) = send(&app, authed(Method::POST, "/users/U1/register?name=Sam")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["outcome"], "registered");
        assert!(body["reply"]["description"]
            .as_str()
            .unwrap()
            .contains("**Sam**"));

        let (status, body) = send(&app, authed(Method::POST, "/users/U1/register")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "already_registered");
    }

    #[tokio::test]
    async fn track_requires_registration() {
        let app = create_router(test_state(false));

        let (status, body) = send(&app, authed(Method::POST, "/users/U1/track")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["reply"]["title"], "⚠️ Not Registered");
    }

    #[tokio::test]
    async fn track_and_stop_lifecycle() {
        let state = test_state(false);
        let app = create_router(state.clone());

        send(&app, authed(Method::POST, "/users/U1/register")).await;

        let (status, body) = send(&app, authed(Method::POST, "/users/U1/track")).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["outcome"], "started");
        assert!(state.commands.sessions().is_active("U1"));

        let (status, _) = send(&app, authed(Method::POST, "/users/U1/track")).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(&app, authed(Method::POST, "/users/U1/stop")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "stopped");
        assert!(!state.commands.sessions().is_active("U1"));

        let (status, body) = send(&app, authed(Method::POST, "/users/U1/stop")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["outcome"], "not_tracking");
    }

    // ========================================================================
    // GET /report and GET /health
    // ========================================================================

    #[tokio::test]
    async fn report_returns_rendered_message() {
        let app = create_router(test_state(false));

        let (status, body) = send(&app, authed(Method::GET, "/report")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "❌ Error");
        assert_eq!(body["description"], UNAVAILABLE_MESSAGE);
    }

    #[tokio::test]
    async fn health_reports_counts_without_auth() {
        let state = test_state(false);
        state.commands.register("U1").await;
        state.commands.register("U2").await;
        state.commands.track("U1").await;
        let app = create_router(state);

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::OK);
        let health: HealthResponse = serde_json::from_value(body).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.registered_users, 2);
        assert_eq!(health.active_sessions, 1);
    }
}

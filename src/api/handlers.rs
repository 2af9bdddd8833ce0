//! HTTP request handlers

use super::types::{ErrorResponse, HealthResponse, VersionResponse, WebhookResponse};
use super::{AppState, IngressError};
use crate::telegram::Update;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Telegram may be pointed at either path
        .route("/", get(index).post(webhook))
        .route("/webhook", post(webhook))
        .route("/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Webhook
// ============================================================

async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, AppError> {
    if let Some(expected) = &state.webhook_secret {
        let presented = headers.get(SECRET_HEADER).map(|v| v.as_bytes());
        if !secret_matches(presented, expected.as_bytes()) {
            return Err(AppError::Unauthorized);
        }
    }

    let update: Update = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Malformed update: {e}")))?;
    let update_id = update.update_id;

    let Some(event) = update.into_event() else {
        tracing::debug!(update_id, "Ignoring unsupported update");
        return Ok(Json(WebhookResponse {
            ok: true,
            handled: false,
        }));
    };

    tracing::debug!(update_id, subject = %event.subject_id, kind = ?event.input.kind(), "Update received");
    // Queue and return; a non-2xx makes Telegram redeliver later
    state.ingress.submit(event).map_err(AppError::from)?;

    Ok(Json(WebhookResponse {
        ok: true,
        handled: true,
    }))
}

/// Compare without an early exit on the first differing byte
fn secret_matches(presented: Option<&[u8]>, expected: &[u8]) -> bool {
    let Some(presented) = presented else {
        return false;
    };
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

// ============================================================
// Status
// ============================================================

async fn index() -> &'static str {
    "Bot is running!"
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let records = state.journal.as_ref().map(|j| j.records());
    Json(HealthResponse {
        status: "ok",
        active_sessions: state.engine.store().active_count(),
        pending_notifications: state.engine.pending_notifications(),
        workers: state.ingress.workers(),
        submissions_recorded: records.as_ref().map(Vec::len),
        last_submission_at: records.and_then(|r| r.last().map(|record| record.timestamp)),
    })
}

async fn get_version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    Unauthorized,
    Unavailable(String),
}

impl From<IngressError> for AppError {
    fn from(e: IngressError) -> Self {
        AppError::Unavailable(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Missing or wrong webhook secret".to_string(),
            ),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}

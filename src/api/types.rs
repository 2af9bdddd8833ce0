//! API response types

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Reply to a webhook delivery
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub ok: bool,
    /// False for update kinds the bot ignores
    pub handled: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_sessions: usize,
    pub pending_notifications: usize,
    pub workers: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submissions_recorded: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_submission_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

//! Trait abstractions for engine I/O
//!
//! The engine only ever talks to the outside world through these, so tests
//! can swap in the recorders from `testing`.

use crate::state_machine::{Action, SubmissionRecord};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Receives completed submissions
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, record: &SubmissionRecord) -> Result<(), SinkError>;

    /// Short name for logs
    fn name(&self) -> &str;
}

/// Carries user-visible actions back to the messaging platform
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one `Send`, `Edit` or `Acknowledge`.
    /// `Notify` is the engine's business and is rejected.
    async fn deliver(&self, action: &Action) -> Result<(), TransportError>;
}

// ============================================================================
// Errors
// ============================================================================

/// Notification failure with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SinkError {
    pub kind: SinkErrorKind,
    pub message: String,
}

impl SinkError {
    pub fn new(kind: SinkErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(SinkErrorKind::Unavailable, message)
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            SinkErrorKind::Timeout,
            format!("no answer within {}ms", after.as_millis()),
        )
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(SinkErrorKind::Rejected, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkErrorKind {
    /// Network trouble or a 5xx from the far side - retryable
    Unavailable,
    /// Gave up waiting - retryable
    Timeout,
    /// The far side refused the record (bad chat id, revoked token) - not retryable
    Rejected,
}

impl SinkErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Timeout)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("platform rejected request ({status}): {description}")]
    Rejected { status: u16, description: String },

    #[error("action cannot be delivered by a transport: {0}")]
    Unsupported(&'static str),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) => true,
            TransportError::Rejected { status, .. } => *status == 429 || *status >= 500,
            TransportError::Unsupported(_) => false,
        }
    }
}

impl From<TransportError> for SinkError {
    fn from(e: TransportError) -> Self {
        if e.is_retryable() {
            SinkError::unavailable(e.to_string())
        } else {
            SinkError::rejected(e.to_string())
        }
    }
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: NotificationSink + ?Sized> NotificationSink for Arc<T> {
    async fn notify(&self, record: &SubmissionRecord) -> Result<(), SinkError> {
        (**self).notify(record).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn deliver(&self, action: &Action) -> Result<(), TransportError> {
        (**self).deliver(action).await
    }
}

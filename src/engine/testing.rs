//! Mock implementations for testing
//!
//! These mocks let engine and adapter tests run without a network.

use super::traits::*;
use crate::state_machine::{Action, SubmissionRecord};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Flaky Sink
// ============================================================================

/// Sink that fails a fixed number of times before accepting
pub struct FlakySink {
    failures: usize,
    kind: SinkErrorKind,
    calls: AtomicUsize,
}

impl FlakySink {
    pub fn failing_first(failures: usize) -> Self {
        Self {
            failures,
            kind: SinkErrorKind::Unavailable,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fails every call
    pub fn broken() -> Self {
        Self::failing_first(usize::MAX)
    }

    pub fn with_kind(mut self, kind: SinkErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for FlakySink {
    async fn notify(&self, _record: &SubmissionRecord) -> Result<(), SinkError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(SinkError::new(self.kind, format!("mock failure #{}", call + 1)));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

// ============================================================================
// Slow Sink
// ============================================================================

/// Sink that takes `delay` to accept anything
pub struct SlowSink {
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowSink {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for SlowSink {
    async fn notify(&self, _record: &SubmissionRecord) -> Result<(), SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "slow"
    }
}

// ============================================================================
// Recording Transport
// ============================================================================

/// Transport that records everything it is asked to deliver
#[derive(Default)]
pub struct RecordingTransport {
    actions: Mutex<Vec<Action>>,
    fail_status: AtomicU16,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every subsequent delivery with this HTTP status
    pub fn fail_with_status(&self, status: u16) {
        self.fail_status.store(status, Ordering::SeqCst);
    }

    pub fn recorded(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.recorded()
            .iter()
            .filter_map(|a| a.text().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn deliver(&self, action: &Action) -> Result<(), TransportError> {
        if matches!(action, Action::Notify { .. }) {
            return Err(TransportError::Unsupported("notify"));
        }
        let status = self.fail_status.load(Ordering::SeqCst);
        if status != 0 {
            return Err(TransportError::Rejected {
                status,
                description: "mock rejection".into(),
            });
        }
        self.actions.lock().unwrap().push(action.clone());
        Ok(())
    }
}

// ============================================================================
// Stuck Transport
// ============================================================================

/// Transport whose deliveries never complete
#[derive(Default)]
pub struct StuckTransport {
    started: AtomicUsize,
}

impl StuckTransport {
    /// Deliveries that have begun (and are still hanging)
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for StuckTransport {
    async fn deliver(&self, _action: &Action) -> Result<(), TransportError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

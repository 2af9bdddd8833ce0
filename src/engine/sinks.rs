//! Notification sink implementations

use super::traits::{NotificationSink, SinkError, Transport};
use crate::session::SubjectId;
use crate::state_machine::{Action, SubmissionRecord};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Posts a summary of each submission into an operator chat
pub struct OperatorChatSink<T: Transport> {
    transport: T,
    chat: SubjectId,
}

impl<T: Transport> OperatorChatSink<T> {
    pub fn new(transport: T, chat: SubjectId) -> Self {
        Self { transport, chat }
    }
}

#[async_trait]
impl<T: Transport> NotificationSink for OperatorChatSink<T> {
    async fn notify(&self, record: &SubmissionRecord) -> Result<(), SinkError> {
        let action = Action::send(&self.chat, record.summary());
        self.transport.deliver(&action).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "operator_chat"
    }
}

/// Writes submissions to the log and nothing else
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, record: &SubmissionRecord) -> Result<(), SinkError> {
        tracing::info!(
            record_id = %record.id,
            subject = %record.subject_id,
            flow = %record.flow,
            fields = ?record.collected_fields,
            "Submission received"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Bounded in-memory log of recent submissions.
///
/// Stands alone, or sits in front of another sink and only records what that
/// sink accepted.
pub struct MemorySink {
    records: Mutex<VecDeque<SubmissionRecord>>,
    capacity: usize,
    inner: Option<Arc<dyn NotificationSink>>,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            inner: None,
        }
    }

    pub fn forwarding(capacity: usize, inner: Arc<dyn NotificationSink>) -> Self {
        Self {
            inner: Some(inner),
            ..Self::new(capacity)
        }
    }

    /// Oldest first
    pub fn records(&self) -> Vec<SubmissionRecord> {
        self.lock().iter().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<SubmissionRecord>> {
        // A poisoned log is still a usable log
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn notify(&self, record: &SubmissionRecord) -> Result<(), SinkError> {
        if let Some(inner) = &self.inner {
            inner.notify(record).await?;
        }
        let mut records = self.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        match &self.inner {
            Some(inner) => inner.name(),
            None => "memory",
        }
    }
}

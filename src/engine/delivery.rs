//! Submission delivery with timeout and retry
//!
//! Runs as a detached task per record, after the subject's lock is gone.

use super::traits::{NotificationSink, SinkError};
use crate::state_machine::{Action, SubmissionRecord};
use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc;

pub const PENDING_NOTICE: &str =
    "Your submission was recorded, but we couldn't notify our team yet. We'll keep trying.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    /// Upper bound on a single sink call
    pub timeout: Duration,
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// First backoff step; doubles on every retry
    pub base_delay: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl DeliveryPolicy {
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        // 1x, 2x, 4x ... of the base step
        self.base_delay
            .saturating_mul(1u32 << (attempt.saturating_sub(1)).min(16))
    }
}

/// Up to half a step extra, so records that failed together don't retry together
fn with_jitter(delay: Duration) -> Duration {
    let spread = u64::try_from(delay.as_millis() / 2).unwrap_or(u64::MAX);
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}

/// Hand `record` to the sink until it sticks or the policy gives up.
///
/// The subject hears about it once, after the first failed attempt.
pub async fn deliver<N: NotificationSink + ?Sized>(
    sink: &N,
    record: SubmissionRecord,
    policy: DeliveryPolicy,
    outbox: mpsc::Sender<Action>,
) -> bool {
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        let result = match tokio::time::timeout(policy.timeout, sink.notify(&record)).await {
            Ok(result) => result,
            Err(_) => Err(SinkError::timeout(policy.timeout)),
        };

        let error = match result {
            Ok(()) => {
                tracing::info!(
                    record_id = %record.id,
                    subject = %record.subject_id,
                    sink = sink.name(),
                    attempt,
                    "Submission delivered"
                );
                return true;
            }
            Err(e) => e,
        };

        tracing::warn!(
            record_id = %record.id,
            subject = %record.subject_id,
            sink = sink.name(),
            attempt,
            error = %error,
            "Submission delivery failed"
        );

        if attempt == 1 {
            let notice = Action::send(&record.subject_id, PENDING_NOTICE);
            if outbox.send(notice).await.is_err() {
                tracing::debug!("Outbox closed, dropping pending notice");
            }
        }

        if !error.is_retryable() || attempt == attempts {
            break;
        }
        tokio::time::sleep(with_jitter(policy.retry_delay(attempt))).await;
    }

    // Last resort: the record is only in the log now
    tracing::error!(
        record_id = %record.id,
        subject = %record.subject_id,
        sink = sink.name(),
        summary = %record.summary(),
        "Giving up on submission delivery"
    );
    false
}

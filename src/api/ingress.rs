//! Sharded event ingestion
//!
//! Each shard has a dispatch worker and a delivery task. Events are routed by
//! subject, so a subject's events are never handled concurrently or out of
//! order, while different subjects proceed in parallel. The worker only runs
//! the engine; replies queue for the shard's delivery task in dispatch order,
//! so a slow client delays replies but never the next event.

use crate::engine::{Engine, NotificationSink, Transport};
use crate::session::SubjectId;
use crate::state_machine::{Action, Event};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const SHARD_CAPACITY: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IngressError {
    #[error("ingestion queue is full")]
    Full,
    #[error("ingestion is shutting down")]
    Closed,
}

/// Cheap handle for handing events to the workers
#[derive(Clone)]
pub struct Ingress {
    shards: Arc<[mpsc::Sender<Event>]>,
}

impl Ingress {
    /// Start `workers` shards (at least one).
    ///
    /// Workers exit once every `Ingress` clone is dropped and their queues
    /// are drained; each waits for its pending replies before finishing.
    pub fn spawn<N, T>(
        engine: Arc<Engine<N>>,
        transport: T,
        workers: usize,
    ) -> (Self, Vec<JoinHandle<()>>)
    where
        N: NotificationSink + 'static,
        T: Transport + Clone + 'static,
    {
        let workers = workers.max(1);
        let mut shards = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for shard in 0..workers {
            let (tx, rx) = mpsc::channel(SHARD_CAPACITY);
            let (replies_tx, replies_rx) = mpsc::unbounded_channel();
            let replies = tokio::spawn(run_delivery(shard, replies_rx, transport.clone()));
            shards.push(tx);
            handles.push(tokio::spawn(run_worker(
                shard,
                rx,
                Arc::clone(&engine),
                replies_tx,
                replies,
            )));
        }
        tracing::info!(workers, "Ingestion workers started");

        (
            Self {
                shards: shards.into(),
            },
            handles,
        )
    }

    /// Queue an event behind any earlier events for the same subject.
    ///
    /// Never waits: a full shard is reported to the caller instead.
    pub fn submit(&self, event: Event) -> Result<(), IngressError> {
        let shard = self.shard_for(&event.subject_id);
        self.shards[shard].try_send(event).map_err(|e| {
            let (error, event) = match e {
                mpsc::error::TrySendError::Full(event) => (IngressError::Full, event),
                mpsc::error::TrySendError::Closed(event) => (IngressError::Closed, event),
            };
            tracing::warn!(shard, subject = %event.subject_id, error = %error, "Event not queued");
            error
        })
    }

    pub fn workers(&self) -> usize {
        self.shards.len()
    }

    fn shard_for(&self, subject: &SubjectId) -> usize {
        let mut hasher = DefaultHasher::new();
        subject.hash(&mut hasher);
        let shards = u64::try_from(self.shards.len()).unwrap_or(u64::MAX);
        usize::try_from(hasher.finish() % shards).unwrap_or_default()
    }
}

async fn run_worker<N>(
    shard: usize,
    mut rx: mpsc::Receiver<Event>,
    engine: Arc<Engine<N>>,
    replies: mpsc::UnboundedSender<(SubjectId, Action)>,
    delivery: JoinHandle<()>,
) where
    N: NotificationSink + 'static,
{
    while let Some(event) = rx.recv().await {
        let subject = event.subject_id.clone();
        for action in engine.dispatch(event).await {
            if replies.send((subject.clone(), action)).is_err() {
                tracing::error!(shard, subject = %subject, "Delivery task gone, dropping reply");
            }
        }
    }
    drop(replies);
    if let Err(e) = delivery.await {
        tracing::error!(shard, error = %e, "Delivery task failed");
    }
    tracing::debug!(shard, "Ingestion worker stopped");
}

async fn run_delivery<T: Transport>(
    shard: usize,
    mut replies: mpsc::UnboundedReceiver<(SubjectId, Action)>,
    transport: T,
) {
    while let Some((subject, action)) = replies.recv().await {
        deliver(&transport, &subject, &action).await;
    }
    tracing::debug!(shard, "Delivery task stopped");
}

/// Forward actions raised outside a dispatch (pending-delivery notices)
pub async fn pump_outbox<T: Transport>(mut outbox: mpsc::Receiver<Action>, transport: T) {
    while let Some(action) = outbox.recv().await {
        let subject = match &action {
            Action::Send { to, .. } | Action::Edit { to, .. } => to.clone(),
            _ => SubjectId::from("-"),
        };
        deliver(&transport, &subject, &action).await;
    }
}

async fn deliver<T: Transport>(transport: &T, subject: &SubjectId, action: &Action) {
    if let Err(e) = transport.deliver(action).await {
        // The conversation already moved on; a lost reply is logged, not retried
        tracing::warn!(subject = %subject, error = %e, "Failed to deliver action");
    }
}

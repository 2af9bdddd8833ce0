//! Conversation engine
//!
//! Routes each event to the handler bound to the subject's current state,
//! commits the resulting session change under the subject's lock, and hands
//! completed submissions to the notification sink once the lock is gone.

mod delivery;
mod sinks;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use delivery::DeliveryPolicy;
pub use sinks::{LogSink, MemorySink, OperatorChatSink};
pub use traits::*;

use crate::session::{Session, SessionGuard, SessionStore};
use crate::state_machine::{Action, Definition, Event, Handler, Input, Next, Outcome, Turn};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Engine wired to whatever sink the configuration picked
pub type ProductionEngine = Engine<Arc<dyn NotificationSink>>;

pub const TIMEOUT_NOTICE: &str = "Your session timed out. Send /start to begin again.";

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Sessions idle for longer than this are swept
    pub idle_timeout: Duration,
    pub delivery: DeliveryPolicy,
    /// Tell swept subjects their conversation is gone
    pub timeout_notice: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            delivery: DeliveryPolicy::default(),
            timeout_notice: false,
        }
    }
}

pub struct Engine<N: NotificationSink + 'static> {
    definition: Arc<Definition>,
    store: SessionStore,
    sink: Arc<N>,
    settings: EngineSettings,
    /// Actions that originate outside a dispatch (pending-delivery notices)
    outbox: mpsc::Sender<Action>,
    deliveries: TaskTracker,
}

impl<N: NotificationSink + 'static> Engine<N> {
    pub fn new(
        definition: Definition,
        sink: N,
        settings: EngineSettings,
        outbox: mpsc::Sender<Action>,
    ) -> Self {
        Self {
            definition: Arc::new(definition),
            store: SessionStore::new(),
            sink: Arc::new(sink),
            settings,
            outbox,
            deliveries: TaskTracker::new(),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    pub async fn dispatch(&self, event: Event) -> Vec<Action> {
        self.dispatch_at(event, Utc::now()).await
    }

    /// Process one event as of `now`.
    ///
    /// Returns the user-visible actions in order. A selection always ends with
    /// exactly one `Acknowledge`.
    pub async fn dispatch_at(&self, event: Event, now: DateTime<Utc>) -> Vec<Action> {
        let Event { subject_id, input } = event;

        let produced = {
            let mut guard = self.store.lock(&subject_id).await;
            self.step(&mut guard, &input, now)
        };

        let mut actions = Vec::with_capacity(produced.len() + 1);
        for action in produced {
            match action {
                Action::Notify { record } => self.submit(record),
                other => actions.push(other),
            }
        }
        if let Input::Selection { ack, .. } = input {
            actions.push(Action::acknowledge(ack));
        }
        actions
    }

    /// Drop idle sessions; returns the timeout notices to deliver, if enabled.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<Action> {
        let swept = self.store.sweep_expired(now, self.settings.idle_timeout);
        if !self.settings.timeout_notice {
            return vec![];
        }
        swept
            .iter()
            .map(|subject| Action::send(subject, TIMEOUT_NOTICE))
            .collect()
    }

    /// Wait for every in-flight submission delivery to finish
    pub async fn flush_notifications(&self) {
        self.deliveries.close();
        self.deliveries.wait().await;
        self.deliveries.reopen();
    }

    pub fn pending_notifications(&self) -> usize {
        self.deliveries.len()
    }

    fn step(&self, guard: &mut SessionGuard, input: &Input, now: DateTime<Utc>) -> Vec<Action> {
        let definition = &*self.definition;

        if let Some(entry) = definition.entry_for(input) {
            if let Some(previous) = guard.get() {
                tracing::debug!(
                    subject = %guard.subject(),
                    state = %previous.current_state,
                    fields = previous.collected_fields.len(),
                    "Re-entry discards conversation in progress"
                );
            }
            let fresh = Session::start(guard.subject().clone(), entry.state, now);
            guard.put(fresh);
            return self.run(guard, entry.handler, input, now);
        }

        let binding = match guard.get() {
            Some(session) => definition
                .resolve(session.current_state, input)
                .or_else(|| definition.fallback(input)),
            None => definition.fallback(input),
        };

        match binding {
            Some(binding) => self.run(guard, binding.handler, input, now),
            None => {
                tracing::debug!(
                    subject = %guard.subject(),
                    kind = ?input.kind(),
                    "No binding matched, input dropped"
                );
                vec![]
            }
        }
    }

    fn run(
        &self,
        guard: &mut SessionGuard,
        handler: Handler,
        input: &Input,
        now: DateTime<Utc>,
    ) -> Vec<Action> {
        let session = guard.get().cloned();
        let outcome = handler(&Turn {
            subject: guard.subject(),
            session: session.as_ref(),
            input,
            settings: self.definition.settings(),
            now,
        });
        let Outcome {
            next,
            updates,
            actions,
        } = outcome;
        self.apply(guard, session, next, updates, now);
        actions
    }

    fn apply(
        &self,
        guard: &mut SessionGuard,
        session: Option<Session>,
        next: Next,
        updates: Vec<(String, String)>,
        now: DateTime<Utc>,
    ) {
        let Some(mut session) = session else {
            if next != Next::Stay || !updates.is_empty() {
                tracing::warn!(
                    subject = %guard.subject(),
                    next = ?next,
                    "Handler tried to change a conversation that does not exist"
                );
            }
            return;
        };

        if next == Next::Terminal {
            guard.delete();
            tracing::info!(
                subject = %guard.subject(),
                from = %session.current_state,
                "Conversation finished"
            );
            return;
        }

        session.collected_fields.extend(updates);
        if let Next::Go(target) = next {
            if self.definition.is_declared(target) {
                tracing::debug!(
                    subject = %guard.subject(),
                    from = %session.current_state,
                    to = %target,
                    "State transition"
                );
                session.current_state = target;
            } else {
                tracing::error!(
                    subject = %guard.subject(),
                    from = %session.current_state,
                    to = %target,
                    "Handler returned an undeclared state, staying put"
                );
            }
        }
        session.last_active_at = now;
        guard.put(session);
    }

    fn submit(&self, record: crate::state_machine::SubmissionRecord) {
        let sink = Arc::clone(&self.sink);
        let outbox = self.outbox.clone();
        let policy = self.settings.delivery;
        self.deliveries.spawn(async move {
            delivery::deliver(&*sink, record, policy, outbox).await;
        });
    }
}

/// Periodically sweep idle sessions until cancelled.
///
/// Timeout notices, when enabled, go out through `transport`.
pub fn spawn_sweeper<N, T>(
    engine: Arc<Engine<N>>,
    transport: T,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
where
    N: NotificationSink + 'static,
    T: Transport + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::debug!("Sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    for notice in engine.sweep_expired(Utc::now()) {
                        if let Err(e) = transport.deliver(&notice).await {
                            tracing::warn!(error = %e, "Failed to deliver timeout notice");
                        }
                    }
                }
            }
        }
    })
}

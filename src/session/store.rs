//! Per-subject session storage
//!
//! Each subject owns a slot behind its own async mutex, so a whole dispatch
//! (read, run handler, write) is linearizable per subject while unrelated
//! subjects never contend. There is no store-wide lock: the `DashMap` shard
//! locks are only held for the instant it takes to clone a slot handle.

use super::{Session, SubjectId};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default)]
struct Slot {
    session: Option<Session>,
    /// Set once the slot has been unlinked from the map. A task that was
    /// already queued on the mutex must not write into a detached slot.
    detached: bool,
}

type SlotStorage = DashMap<SubjectId, Arc<Mutex<Slot>>>;

/// Concurrent map of subject -> session
#[derive(Clone, Default)]
pub struct SessionStore {
    slots: Arc<SlotStorage>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive access to one subject's session.
    ///
    /// Holding the guard serializes every other operation on the same
    /// subject. Other subjects are unaffected.
    pub async fn lock(&self, subject: &SubjectId) -> SessionGuard {
        loop {
            let slot = self
                .slots
                .entry(subject.clone())
                .or_insert_with(|| Arc::new(Mutex::new(Slot::default())))
                .clone();

            let guard = slot.lock_owned().await;
            if !guard.detached {
                return SessionGuard {
                    subject: subject.clone(),
                    slots: Arc::clone(&self.slots),
                    guard,
                };
            }
            // Lost a race with delete/sweep; the next iteration sees a fresh slot.
        }
    }

    pub async fn get(&self, subject: &SubjectId) -> Option<Session> {
        self.lock(subject).await.get().cloned()
    }

    /// Upsert; replaces any existing session wholesale.
    pub async fn put(&self, session: Session) {
        let subject = session.subject_id.clone();
        self.lock(&subject).await.put(session);
    }

    pub async fn delete(&self, subject: &SubjectId) {
        self.lock(subject).await.delete();
    }

    /// Remove every idle session older than `max_idle` and return their ids.
    ///
    /// Slots that are locked right now belong to an in-flight dispatch and are
    /// skipped; that subject is active by definition.
    pub fn sweep_expired(&self, now: DateTime<Utc>, max_idle: Duration) -> Vec<SubjectId> {
        let candidates: Vec<(SubjectId, Arc<Mutex<Slot>>)> = self
            .slots
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut removed = Vec::new();
        for (subject, slot) in candidates {
            let Ok(mut guard) = slot.try_lock_owned() else {
                continue;
            };
            if guard.detached {
                continue;
            }
            let expired = guard
                .session
                .as_ref()
                .is_none_or(|s| s.is_expired(now, max_idle));
            if !expired {
                continue;
            }
            let had_session = guard.session.take().is_some();
            detach(&self.slots, &subject, &mut guard);
            if had_session {
                removed.push(subject);
            }
        }

        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "Swept expired sessions");
        }
        removed
    }

    /// Number of subjects with a live slot (sessions plus in-flight dispatches)
    pub fn active_count(&self) -> usize {
        self.slots.len()
    }
}

/// Exclusive handle on one subject's session
///
/// Dropping a guard whose slot is empty unlinks the slot, so lookups for
/// unknown subjects leave nothing behind.
pub struct SessionGuard {
    subject: SubjectId,
    slots: Arc<SlotStorage>,
    guard: OwnedMutexGuard<Slot>,
}

impl SessionGuard {
    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    pub fn get(&self) -> Option<&Session> {
        self.guard.session.as_ref()
    }

    pub fn put(&mut self, session: Session) {
        debug_assert_eq!(session.subject_id, self.subject);
        self.guard.session = Some(session);
    }

    pub fn delete(&mut self) -> Option<Session> {
        self.guard.session.take()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.guard.session.is_none() && !self.guard.detached {
            detach(&self.slots, &self.subject, &mut self.guard);
        }
    }
}

fn detach(slots: &SlotStorage, subject: &SubjectId, guard: &mut OwnedMutexGuard<Slot>) {
    guard.detached = true;
    let this = OwnedMutexGuard::mutex(guard);
    slots.remove_if(subject, |_, slot| Arc::ptr_eq(slot, this));
}

//! In-flight conversation sessions
//!
//! A session exists only while a subject is inside a flow. It is created by an
//! entry point, rewritten by every dispatched event, and removed on a terminal
//! transition or by the idle sweep.

mod store;

pub use store::{SessionGuard, SessionStore};

use crate::state_machine::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Identity of the remote user/chat a conversation is keyed on
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubjectId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<i64> for SubjectId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

/// Names of collected fields
pub mod fields {
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const PHONE: &str = "phone";
    pub const USERNAME: &str = "username";
    pub const SERVICE: &str = "service";
    pub const MESSAGE: &str = "message";
}

/// One subject's in-progress conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub subject_id: SubjectId,
    pub current_state: State,
    pub collected_fields: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session at `state` with nothing collected
    pub fn start(subject_id: SubjectId, state: State, now: DateTime<Utc>) -> Self {
        Self {
            subject_id,
            current_state: state,
            collected_fields: HashMap::new(),
            created_at: now,
            last_active_at: now,
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.collected_fields.get(name).map(String::as_str)
    }

    /// Idle time at `now`; clock skew into the future counts as zero.
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_active_at).to_std().unwrap_or_default()
    }

    pub fn is_expired(&self, now: DateTime<Utc>, max_idle: Duration) -> bool {
        self.idle_for(now) > max_idle
    }
}

//! Outbound actions produced by handlers and the engine

use super::event::{AckHandle, MessageRef};
use super::state::FlowKind;
use crate::session::SubjectId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Effects to be carried out after a dispatch
///
/// Rendering into transport markup is the adapter's business; content here is
/// plain text plus an optional list of choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a new message to the subject
    Send { to: SubjectId, content: Content },

    /// Replace the text and choices of a message we sent earlier
    Edit {
        to: SubjectId,
        message: MessageRef,
        content: Content,
    },

    /// Deliver a completed submission to the notification sink.
    /// Executed by the engine; never handed to the transport.
    Notify { record: SubmissionRecord },

    /// Answer a selection so the client stops waiting
    Acknowledge {
        ack: AckHandle,
        text: Option<String>,
    },
}

impl Action {
    pub fn send(to: &SubjectId, content: impl Into<Content>) -> Self {
        Action::Send {
            to: to.clone(),
            content: content.into(),
        }
    }

    pub fn edit(to: &SubjectId, message: MessageRef, content: impl Into<Content>) -> Self {
        Action::Edit {
            to: to.clone(),
            message,
            content: content.into(),
        }
    }

    pub fn notify(record: SubmissionRecord) -> Self {
        Action::Notify { record }
    }

    pub fn acknowledge(ack: AckHandle) -> Self {
        Action::Acknowledge { ack, text: None }
    }

    /// Text shown to the subject, for send/edit actions
    pub fn text(&self) -> Option<&str> {
        match self {
            Action::Send { content, .. } | Action::Edit { content, .. } => Some(&content.text),
            Action::Notify { .. } | Action::Acknowledge { .. } => None,
        }
    }
}

/// Rendering-agnostic message body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
}

impl Content {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: vec![],
        }
    }

    pub fn with_choice(mut self, label: impl Into<String>, token: impl Into<String>) -> Self {
        self.choices.push(Choice {
            label: label.into(),
            token: token.into(),
        });
        self
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Content::text(text)
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Content::text(text)
    }
}

/// One selectable option: what the user sees and what comes back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    pub token: String,
}

/// A completed submission, as handed to the notification sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: uuid::Uuid,
    pub subject_id: SubjectId,
    pub flow: FlowKind,
    pub collected_fields: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl SubmissionRecord {
    pub fn new(
        subject_id: SubjectId,
        flow: FlowKind,
        collected_fields: HashMap<String, String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            subject_id,
            flow,
            collected_fields,
            timestamp,
        }
    }

    /// Human-readable summary for an operator channel
    pub fn summary(&self) -> String {
        let mut keys: Vec<&String> = self.collected_fields.keys().collect();
        keys.sort();

        let mut out = format!("New {} submission from {}", self.flow, self.subject_id);
        for key in keys {
            out.push('\n');
            out.push_str(&capitalize(key));
            out.push_str(": ");
            out.push_str(&self.collected_fields[key]);
        }
        out
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

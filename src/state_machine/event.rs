//! Inbound events delivered by the ingestion adapter

use crate::session::SubjectId;
use serde::{Deserialize, Serialize};

/// One classified inbound event for one subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub subject_id: SubjectId,
    pub input: Input,
}

impl Event {
    pub fn new(subject_id: impl Into<SubjectId>, input: Input) -> Self {
        Self {
            subject_id: subject_id.into(),
            input,
        }
    }

    pub fn command(subject_id: impl Into<SubjectId>, name: &str) -> Self {
        Self::new(subject_id, Input::command(name))
    }

    pub fn text(subject_id: impl Into<SubjectId>, text: impl Into<String>) -> Self {
        Self::new(subject_id, Input::Text(text.into()))
    }

    pub fn selection(
        subject_id: impl Into<SubjectId>,
        token: impl Into<String>,
        ack: impl Into<String>,
    ) -> Self {
        Self::new(
            subject_id,
            Input::Selection {
                token: token.into(),
                ack: AckHandle(ack.into()),
                origin: None,
            },
        )
    }
}

/// Payload of an inbound event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// `/name args`, already stripped of the slash and any `@botname` suffix
    Command { name: String, args: String },

    /// Free text that is not a command
    Text(String),

    /// Button press. Must be acknowledged exactly once per dispatch.
    Selection {
        token: String,
        ack: AckHandle,
        /// The message carrying the buttons, when the transport reports it
        origin: Option<MessageRef>,
    },
}

impl Input {
    /// Parse a command token such as `start` or `/start@my_bot extra`.
    pub fn command(raw: &str) -> Self {
        let raw = raw.trim().trim_start_matches('/');
        let (head, args) = raw.split_once(char::is_whitespace).unwrap_or((raw, ""));
        let name = head.split('@').next().unwrap_or(head);
        Input::Command {
            name: name.to_ascii_lowercase(),
            args: args.trim().to_string(),
        }
    }

    /// Classify raw message text: a leading `/` makes it a command.
    pub fn from_message_text(text: &str) -> Self {
        if text.trim_start().starts_with('/') {
            Input::command(text)
        } else {
            Input::Text(text.to_string())
        }
    }

    pub fn kind(&self) -> InputKind {
        match self {
            Input::Command { .. } => InputKind::Command,
            Input::Text(_) => InputKind::Text,
            Input::Selection { .. } => InputKind::Selection,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Command,
    Text,
    Selection,
}

/// Transport handle used to acknowledge a selection
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AckHandle(pub String);

/// Transport reference to an already-sent message (the target of an edit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageRef(pub i64);

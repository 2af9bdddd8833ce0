//! Telegram Bot API payloads
//!
//! Only the fields the bot reads or writes; everything else in an update is
//! ignored by serde.

use crate::session::SubjectId;
use crate::state_machine::{AckHandle, Choice, Content, Event, Input, MessageRef};
use serde::{Deserialize, Serialize};

// ============================================================================
// Inbound
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

impl Update {
    /// Classify into an engine event.
    ///
    /// Conversations are keyed by chat, since that is where replies go.
    /// Returns `None` for update kinds the bot does not handle (edits, media,
    /// channel posts, ...).
    pub fn into_event(self) -> Option<Event> {
        if let Some(query) = self.callback_query {
            let (subject, origin) = match &query.message {
                Some(message) => (message.chat.id, Some(MessageRef(message.message_id))),
                None => (query.from.id, None),
            };
            return Some(Event::new(
                subject,
                Input::Selection {
                    token: query.data.unwrap_or_default(),
                    ack: AckHandle(query.id),
                    origin,
                },
            ));
        }

        let message = self.message?;
        if message.from.as_ref().is_some_and(|u| u.is_bot) {
            return None;
        }
        let text = message.text?;
        Some(Event::new(
            message.chat.id,
            Input::from_message_text(&text),
        ))
    }
}

// ============================================================================
// Outbound
// ============================================================================

#[derive(Debug, Serialize)]
pub(super) struct SendMessage<'a> {
    pub chat_id: ChatTarget<'a>,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup<'a>>,
}

#[derive(Debug, Serialize)]
pub(super) struct EditMessageText<'a> {
    pub chat_id: ChatTarget<'a>,
    pub message_id: i64,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup<'a>>,
}

#[derive(Debug, Serialize)]
pub(super) struct AnswerCallbackQuery<'a> {
    pub callback_query_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'a str>,
}

/// Numeric chat ids go out as numbers, `@channel` names as strings
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(super) enum ChatTarget<'a> {
    Id(i64),
    Name(&'a str),
}

impl<'a> From<&'a SubjectId> for ChatTarget<'a> {
    fn from(subject: &'a SubjectId) -> Self {
        match subject.as_str().parse() {
            Ok(id) => ChatTarget::Id(id),
            Err(_) => ChatTarget::Name(subject.as_str()),
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct InlineKeyboardMarkup<'a> {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton<'a>>>,
}

#[derive(Debug, Serialize)]
pub(super) struct InlineKeyboardButton<'a> {
    pub text: &'a str,
    pub callback_data: &'a str,
}

impl<'a> InlineKeyboardMarkup<'a> {
    /// One button per row; `None` when there is nothing to press.
    pub fn from_content(content: &'a Content) -> Option<Self> {
        if content.choices.is_empty() {
            return None;
        }
        let inline_keyboard = content
            .choices
            .iter()
            .map(|Choice { label, token }| {
                vec![InlineKeyboardButton {
                    text: label,
                    callback_data: token,
                }]
            })
            .collect();
        Some(Self { inline_keyboard })
    }
}

/// Envelope of every Bot API response
#[derive(Debug, Deserialize)]
pub(super) struct ApiResponse {
    pub ok: bool,
    #[serde(default)]
    pub description: Option<String>,
}

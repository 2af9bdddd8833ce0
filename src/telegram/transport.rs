//! Bot API client implementing `Transport`

use super::types::{
    AnswerCallbackQuery, ApiResponse, ChatTarget, EditMessageText, InlineKeyboardMarkup,
    SendMessage,
};
use crate::engine::{Transport, TransportError};
use crate::state_machine::Action;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Talks to `https://api.telegram.org/bot<token>/<method>`
pub struct TelegramTransport {
    client: Client,
    base_url: String,
}

impl TelegramTransport {
    pub fn new(token: &str, api_url: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), token),
        })
    }

    async fn call<T: Serialize + ?Sized>(
        &self,
        method: &str,
        payload: &T,
    ) -> Result<(), TransportError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Network(format!("{method} timed out"))
                } else {
                    // Strip the URL: it carries the bot token
                    TransportError::Network(format!("{method} failed: {}", e.without_url()))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(format!("Failed to read response: {e}")))?;

        let parsed: Option<ApiResponse> = serde_json::from_str(&body).ok();
        if status.is_success() && parsed.as_ref().is_some_and(|r| r.ok) {
            return Ok(());
        }

        let description = parsed
            .and_then(|r| r.description)
            .unwrap_or_else(|| body.chars().take(200).collect());
        Err(TransportError::Rejected {
            status: status.as_u16(),
            description,
        })
    }
}

/// Telegram refuses an edit that changes nothing; for us that edit succeeded.
fn is_not_modified(error: &TransportError) -> bool {
    matches!(
        error,
        TransportError::Rejected { status: 400, description }
            if description.contains("message is not modified")
    )
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn deliver(&self, action: &Action) -> Result<(), TransportError> {
        match action {
            Action::Send { to, content } => {
                let payload = SendMessage {
                    chat_id: ChatTarget::from(to),
                    text: &content.text,
                    reply_markup: InlineKeyboardMarkup::from_content(content),
                };
                self.call("sendMessage", &payload).await
            }
            Action::Edit {
                to,
                message,
                content,
            } => {
                let payload = EditMessageText {
                    chat_id: ChatTarget::from(to),
                    message_id: message.0,
                    text: &content.text,
                    reply_markup: InlineKeyboardMarkup::from_content(content),
                };
                match self.call("editMessageText", &payload).await {
                    Err(e) if is_not_modified(&e) => {
                        tracing::debug!(chat = %to, "Edit was a no-op");
                        Ok(())
                    }
                    other => other,
                }
            }
            Action::Acknowledge { ack, text } => {
                let payload = AnswerCallbackQuery {
                    callback_query_id: &ack.0,
                    text: text.as_deref(),
                };
                self.call("answerCallbackQuery", &payload).await
            }
            Action::Notify { .. } => Err(TransportError::Unsupported("notify")),
        }
    }
}

/// Stand-in used when no bot token is configured: everything goes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn deliver(&self, action: &Action) -> Result<(), TransportError> {
        match action {
            Action::Send { to, content } => {
                tracing::info!(chat = %to, text = %content.text, choices = content.choices.len(), "send");
            }
            Action::Edit {
                to,
                message,
                content,
            } => {
                tracing::info!(chat = %to, message = message.0, text = %content.text, "edit");
            }
            Action::Acknowledge { ack, .. } => {
                tracing::debug!(ack = %ack.0, "acknowledge");
            }
            Action::Notify { .. } => return Err(TransportError::Unsupported("notify")),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SubjectId;
    use crate::state_machine::{AckHandle, Content, MessageRef};
    use axum::{extract::Path, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    type Calls = Arc<Mutex<Vec<(String, Value)>>>;

    /// Fake Bot API: records each call, rejects edits as "not modified" and
    /// any chat id of 0 as unknown.
    async fn fake_api() -> (String, Calls) {
        let calls: Calls = Arc::default();
        let recorded = Arc::clone(&calls);
        let app = Router::new().route(
            "/:bot/:method",
            post(move |Path((_bot, method)): Path<(String, String)>, Json(body): Json<Value>| {
                let recorded = Arc::clone(&recorded);
                async move {
                    recorded.lock().unwrap().push((method.clone(), body.clone()));
                    let (status, reply) = if method == "editMessageText" {
                        (
                            400,
                            json!({ "ok": false, "error_code": 400,
                                    "description": "Bad Request: message is not modified" }),
                        )
                    } else if body["chat_id"] == json!(0) {
                        (
                            400,
                            json!({ "ok": false, "error_code": 400,
                                    "description": "Bad Request: chat not found" }),
                        )
                    } else {
                        (200, json!({ "ok": true, "result": true }))
                    };
                    (
                        axum::http::StatusCode::from_u16(status).unwrap(),
                        Json(reply),
                    )
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), calls)
    }

    #[tokio::test]
    async fn test_send_with_keyboard() {
        let (url, calls) = fake_api().await;
        let transport = TelegramTransport::new("T0KEN", &url).unwrap();

        let content = Content::text("Pick one").with_choice("Sign up", "menu:signup");
        transport
            .deliver(&Action::send(&SubjectId::from(555_i64), content))
            .await
            .unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "sendMessage");
        assert_eq!(
            calls[0].1,
            json!({
                "chat_id": 555,
                "text": "Pick one",
                "reply_markup": { "inline_keyboard": [[
                    { "text": "Sign up", "callback_data": "menu:signup" }
                ]]}
            })
        );
    }

    #[tokio::test]
    async fn test_not_modified_edit_is_success() {
        let (url, calls) = fake_api().await;
        let transport = TelegramTransport::new("T0KEN", &url).unwrap();

        let action = Action::edit(&SubjectId::from(555_i64), MessageRef(42), "Same text");
        transport.deliver(&action).await.unwrap();
        assert_eq!(calls.lock().unwrap()[0].1["message_id"], json!(42));
    }

    #[tokio::test]
    async fn test_rejection_carries_description() {
        let (url, _calls) = fake_api().await;
        let transport = TelegramTransport::new("T0KEN", &url).unwrap();

        let err = transport
            .deliver(&Action::send(&SubjectId::from(0_i64), "hi"))
            .await
            .unwrap_err();
        match err {
            TransportError::Rejected {
                status,
                description,
            } => {
                assert_eq!(status, 400);
                assert!(description.contains("chat not found"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(!TransportError::Rejected {
            status: 400,
            description: String::new()
        }
        .is_retryable());
    }

    #[tokio::test]
    async fn test_acknowledge_and_notify() {
        let (url, calls) = fake_api().await;
        let transport = TelegramTransport::new("T0KEN", &url).unwrap();

        transport
            .deliver(&Action::acknowledge(AckHandle("cbq-1".into())))
            .await
            .unwrap();
        assert_eq!(
            calls.lock().unwrap()[0],
            (
                "answerCallbackQuery".to_string(),
                json!({ "callback_query_id": "cbq-1" })
            )
        );

        let record = crate::state_machine::SubmissionRecord::new(
            "U1".into(),
            crate::state_machine::FlowKind::Signup,
            Default::default(),
            chrono::Utc::now(),
        );
        assert!(matches!(
            transport.deliver(&Action::notify(record)).await,
            Err(TransportError::Unsupported(_))
        ));
    }
}

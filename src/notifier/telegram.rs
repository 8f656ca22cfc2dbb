use std::time::Duration;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::error::DeliveryError;
use crate::notifier::{Notifier, SentMessage};

const TELEGRAM_API_URL: &str = "https://api.telegram.org";
/// Server-side wait of a `getUpdates` long poll.
pub const LONG_POLL_SECS: u64 = 30;
// Must outlast the long poll.
const HTTP_TIMEOUT_SECS: u64 = LONG_POLL_SECS + 15;

/// Minimal Telegram Bot API client: send, edit, and long-poll for commands.
pub struct TelegramBot {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramBot {
    pub fn new(token: &str) -> Result<Self, Report<DeliveryError>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .change_context(DeliveryError::Request {
                endpoint: "telegram".into(),
            })?;
        Ok(Self {
            client,
            base_url: format!("{TELEGRAM_API_URL}/bot{token}"),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, Report<DeliveryError>> {
        let url = format!("{}/{}", self.base_url, method);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .change_context(DeliveryError::Request {
                endpoint: method.into(),
            })?;

        let status = response.status();
        let parsed: TelegramResponse<T> =
            response
                .json()
                .await
                .change_context(DeliveryError::ResponseParse {
                    endpoint: method.into(),
                })
                .attach_with(|| format!("HTTP status: {status}"))?;

        parsed.into_result(method)
    }

    /// Fetch pending updates after `offset`, waiting up to [`LONG_POLL_SECS`].
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, Report<DeliveryError>> {
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                json!({
                    "offset": offset,
                    "timeout": LONG_POLL_SECS,
                    "allowed_updates": ["message"],
                }),
            )
            .await?;
        debug!(count = updates.len(), offset, "telegram updates received");
        Ok(updates)
    }
}

impl Notifier for TelegramBot {
    fn send(
        &self,
        chat_id: &str,
        text: &str,
    ) -> BoxFuture<'_, Result<SentMessage, Report<DeliveryError>>> {
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        let chat_id = chat_id.to_owned();
        Box::pin(async move {
            let message: Message = self.call("sendMessage", body).await?;
            Ok(SentMessage {
                chat_id,
                message_id: message.message_id,
            })
        })
    }

    fn edit(
        &self,
        message: &SentMessage,
        text: &str,
    ) -> BoxFuture<'_, Result<(), Report<DeliveryError>>> {
        let body = json!({
            "chat_id": message.chat_id,
            "message_id": message.message_id,
            "text": text,
            "parse_mode": "Markdown",
        });
        Box::pin(async move {
            let _: serde_json::Value = self.call("editMessageText", body).await?;
            Ok(())
        })
    }
}

// ── Bot API types ─────────────────────────────────────────────────────────────

/// Envelope of every Bot API response.
#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> TelegramResponse<T> {
    fn into_result(self, method: &str) -> Result<T, Report<DeliveryError>> {
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(Report::new(DeliveryError::Api {
                endpoint: method.into(),
                description: self
                    .description
                    .unwrap_or_else(|| "missing result".to_owned()),
            })),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn updates_parse_with_and_without_text() {
        let body = r#"{
            "ok": true,
            "result": [
                {"update_id": 10, "message": {"message_id": 5, "chat": {"id": -100123, "type": "supergroup"}, "text": "/signal btcusdt"}},
                {"update_id": 11, "message": {"message_id": 6, "chat": {"id": 42, "type": "private"}, "sticker": {}}},
                {"update_id": 12, "edited_message": {"message_id": 5, "chat": {"id": 42}}}
            ]
        }"#;
        let parsed: TelegramResponse<Vec<Update>> = serde_json::from_str(body).unwrap();
        let updates = parsed.into_result("getUpdates").unwrap();
        assert_eq!(updates.len(), 3);
        let first = updates[0].message.as_ref().unwrap();
        assert_eq!(first.chat.id, -100123);
        assert_eq!(first.text.as_deref(), Some("/signal btcusdt"));
        assert!(updates[1].message.as_ref().unwrap().text.is_none());
        assert!(updates[2].message.is_none());
    }

    #[test]
    fn api_error_carries_description() {
        let body = r#"{"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}"#;
        let parsed: TelegramResponse<Message> = serde_json::from_str(body).unwrap();
        let report = parsed.into_result("sendMessage").unwrap_err();
        assert!(matches!(
            report.current_context(),
            DeliveryError::Api { description, .. } if description.contains("chat not found")
        ));
    }

    #[test]
    fn sent_message_parses() {
        let body = r#"{"ok": true, "result": {"message_id": 77, "chat": {"id": 1}, "text": "hi"}}"#;
        let parsed: TelegramResponse<Message> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.into_result("sendMessage").unwrap().message_id, 77);
    }
}

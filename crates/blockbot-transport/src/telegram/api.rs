//! Bot API calls and wire types.

use std::time::Duration;

use reqwest::{Client, ClientBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::trace;

use blockbot_core::{CallbackEvent, ChatId, InboundEvent, MessageEvent, TransportError};

/// Failure of one Bot API call.
#[derive(Debug, Error)]
pub(crate) enum ApiError {
    /// The token was rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The request never produced an API response.
    #[error("request failed: {0}")]
    Request(String),

    /// The API answered with `ok: false`.
    #[error("api error {code}: {description}")]
    Api { code: i64, description: String },
}

impl ApiError {
    pub(crate) fn into_connect(self) -> TransportError {
        TransportError::connect(self.to_string())
    }

    pub(crate) fn into_send(self) -> TransportError {
        TransportError::send(self.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    error_code: Option<i64>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, status: StatusCode) -> Result<T, ApiError> {
        let description = self.description.unwrap_or_default();
        let code = self.error_code.unwrap_or_else(|| i64::from(status.as_u16()));
        if code == 401 || status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized(description));
        }
        match (self.ok, self.result) {
            (true, Some(result)) => Ok(result),
            (true, None) => Err(ApiError::Api {
                code,
                description: "response without result".to_string(),
            }),
            (false, _) => Err(ApiError::Api { code, description }),
        }
    }
}

/// Client bound to one bot token.
#[derive(Clone)]
pub(crate) struct BotApi {
    client: Client,
    base: String,
}

impl BotApi {
    /// `timeout` must exceed the long-polling timeout.
    pub(crate) fn new(api_base: &str, token: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;
        Ok(Self {
            client,
            base: method_base(api_base, token),
        })
    }

    pub(crate) async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
    ) -> Result<T, ApiError> {
        trace!(method, "Bot API call");
        let resp = self
            .client
            .post(format!("{}/{method}", self.base))
            .json(body)
            .send()
            .await
            // reqwest errors carry the URL, which contains the token.
            .map_err(|e| ApiError::Request(e.without_url().to_string()))?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized("token rejected".to_string()));
        }
        let parsed: ApiResponse<T> = resp
            .json()
            .await
            .map_err(|e| {
                ApiError::Request(format!("HTTP {}: {}", status.as_u16(), e.without_url()))
            })?;
        parsed.into_result(status)
    }

    pub(crate) async fn get_me(&self) -> Result<User, ApiError> {
        self.call("getMe", &json!({})).await
    }

    pub(crate) async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, ApiError> {
        let body = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        self.call("getUpdates", &body).await
    }

    pub(crate) async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), ApiError> {
        let body = json!({ "chat_id": chat_id, "text": text });
        self.call::<Value>("sendMessage", &body).await.map(drop)
    }

    pub(crate) async fn send_photo(
        &self,
        chat_id: ChatId,
        url: &str,
        caption: &str,
    ) -> Result<(), ApiError> {
        let mut body = json!({ "chat_id": chat_id, "photo": url });
        if !caption.is_empty() {
            body["caption"] = json!(caption);
        }
        self.call::<Value>("sendPhoto", &body).await.map(drop)
    }

    pub(crate) async fn send_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        rows: &[Vec<String>],
    ) -> Result<(), ApiError> {
        let body = json!({
            "chat_id": chat_id,
            "text": text,
            "reply_markup": reply_keyboard(rows),
        });
        self.call::<Value>("sendMessage", &body).await.map(drop)
    }

    pub(crate) async fn answer_callback(&self, callback_id: &str) -> Result<(), ApiError> {
        let body = json!({ "callback_query_id": callback_id });
        self.call::<Value>("answerCallbackQuery", &body).await.map(drop)
    }
}

impl std::fmt::Debug for BotApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotApi").finish_non_exhaustive()
    }
}

fn method_base(api_base: &str, token: &str) -> String {
    format!("{}/bot{token}", api_base.trim_end_matches('/'))
}

fn reply_keyboard(rows: &[Vec<String>]) -> Value {
    let keyboard: Vec<Vec<Value>> = rows
        .iter()
        .map(|row| row.iter().map(|label| json!({ "text": label })).collect())
        .collect();
    json!({
        "keyboard": keyboard,
        "resize_keyboard": true,
        "is_persistent": true,
    })
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct User {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

impl Update {
    /// Maps the update to an inbound event; other update kinds yield `None`.
    pub(crate) fn into_event(self) -> Option<InboundEvent> {
        if let Some(message) = self.message {
            return Some(InboundEvent::Message(MessageEvent {
                chat_id: message.chat.id,
                message_id: Some(message.message_id),
                text: message.text,
            }));
        }
        self.callback_query.map(|query| {
            // Inline messages carry no chat; answer in the presser's private chat.
            let chat_id = query.message.map_or(query.from.id, |m| m.chat.id);
            InboundEvent::Callback(CallbackEvent {
                id: query.id,
                chat_id,
                data: query.data,
            })
        })
    }
}

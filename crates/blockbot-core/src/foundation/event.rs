//! Inbound events delivered by a transport session.
//!
//! Transports translate their wire updates into [`InboundEvent`]s. Only the
//! two update families the compiled handlers can react to exist here: chat
//! messages and inline-button callbacks.

use serde::{Deserialize, Serialize};

/// Chat identifier as used by the messaging platform.
pub type ChatId = i64;

/// A chat message received by a bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    /// Chat the message was posted in; replies go here.
    pub chat_id: ChatId,
    /// Platform message id, when known.
    #[serde(default)]
    pub message_id: Option<i64>,
    /// Message text. `None` for media-only messages.
    #[serde(default)]
    pub text: Option<String>,
}

impl MessageEvent {
    /// Creates a text message event.
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            message_id: None,
            text: Some(text.into()),
        }
    }

    /// Returns `true` if the message text starts with `/`.
    pub fn is_command(&self) -> bool {
        self.text.as_deref().is_some_and(|t| t.starts_with('/'))
    }
}

/// A pressed inline button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackEvent {
    /// Callback query id, needed to acknowledge the press.
    pub id: String,
    /// Chat of the message carrying the button.
    pub chat_id: ChatId,
    /// Callback payload attached to the button.
    #[serde(default)]
    pub data: Option<String>,
}

impl CallbackEvent {
    /// Creates a callback event.
    pub fn new(id: impl Into<String>, chat_id: ChatId, data: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            chat_id,
            data: Some(data.into()),
        }
    }
}

/// One inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InboundEvent {
    /// A chat message.
    Message(MessageEvent),
    /// An inline-button press.
    Callback(CallbackEvent),
}

impl InboundEvent {
    /// Shorthand for a text message event.
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self::Message(MessageEvent::text(chat_id, text))
    }

    /// Shorthand for a callback event.
    pub fn callback(id: impl Into<String>, chat_id: ChatId, data: impl Into<String>) -> Self {
        Self::Callback(CallbackEvent::new(id, chat_id, data))
    }

    /// Returns the chat this event belongs to.
    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Message(m) => m.chat_id,
            Self::Callback(c) => c.chat_id,
        }
    }

    /// Short name used in logs and spans.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Callback(_) => "callback",
        }
    }

    /// Returns the message, if this is a message event.
    pub fn as_message(&self) -> Option<&MessageEvent> {
        match self {
            Self::Message(m) => Some(m),
            Self::Callback(_) => None,
        }
    }

    /// Returns the callback, if this is a callback event.
    pub fn as_callback(&self) -> Option<&CallbackEvent> {
        match self {
            Self::Callback(c) => Some(c),
            Self::Message(_) => None,
        }
    }
}

//! Actions a matched handler performs against its session.

use blockbot_core::{ButtonRows, InboundEvent, Session, TransportResult};

use crate::expr::Expr;

/// The outbound effect of one handler.
#[derive(Debug, Clone)]
pub enum Action {
    /// Send a text message to the event's chat.
    SendText(String),
    /// Send a text message with a reply keyboard.
    SendKeyboard {
        /// Prompt shown with the keyboard.
        text: String,
        /// Ordered rows of ordered button labels.
        rows: ButtonRows,
    },
    /// Send a photo by URL.
    SendPhoto {
        /// Photo location.
        url: String,
        /// Caption, possibly empty.
        caption: String,
    },
    /// Acknowledge the button press, then send a text message.
    AnswerCallback(String),
    /// Send one of two texts depending on a condition over the message text.
    Branch {
        /// The compiled condition.
        condition: Expr,
        /// Sent when the condition holds.
        if_true: String,
        /// Sent otherwise.
        if_false: String,
    },
}

impl Action {
    /// Performs the action in response to `event`.
    pub async fn execute(&self, event: &InboundEvent, session: &dyn Session) -> TransportResult<()> {
        let chat_id = event.chat_id();
        match self {
            Self::SendText(text) => session.send_message(chat_id, text).await,
            Self::SendKeyboard { text, rows } => session.send_keyboard(chat_id, text, rows).await,
            Self::SendPhoto { url, caption } => session.send_photo(chat_id, url, caption).await,
            Self::AnswerCallback(text) => {
                // Both calls are attempted; the first failure is reported.
                let ack = match event.as_callback() {
                    Some(cb) => session.answer_callback(&cb.id).await,
                    None => Ok(()),
                };
                let sent = session.send_message(chat_id, text).await;
                ack.and(sent)
            }
            Self::Branch {
                condition,
                if_true,
                if_false,
            } => {
                let text = event
                    .as_message()
                    .and_then(|m| m.text.as_deref())
                    .unwrap_or_default();
                let reply = if condition.evaluate(text) {
                    if_true
                } else {
                    if_false
                };
                session.send_message(chat_id, reply).await
            }
        }
    }

    /// Human-readable description, used by handler summaries.
    pub fn describe(&self) -> String {
        match self {
            Self::SendText(text) => format!("send {text:?}"),
            Self::SendKeyboard { text, rows } => {
                let shape: Vec<String> = rows.iter().map(|r| r.join(" | ")).collect();
                format!("send {text:?} with keyboard [{}]", shape.join(" / "))
            }
            Self::SendPhoto { url, caption } => format!("send photo {url} captioned {caption:?}"),
            Self::AnswerCallback(text) => format!("answer callback, send {text:?}"),
            Self::Branch {
                condition,
                if_true,
                if_false,
            } => format!("if {condition} send {if_true:?} else send {if_false:?}"),
        }
    }
}

//! Event dispatcher.
//!
//! The [`Dispatcher`] evaluates a compiled [`HandlerSet`] against one inbound
//! event:
//!
//! 1. Handlers are checked in compiled (block) order
//! 2. Every handler whose matcher accepts the event runs its action
//! 3. There is no early exit: a command handler and a condition handler can
//!    both fire for the same message
//!
//! A failing action is logged and counted; it never stops the remaining
//! handlers from running.
//!
//! ```rust,ignore
//! let compiled = BlockCompiler::new().compile(&config.blocks);
//! let dispatcher = Dispatcher::new(Arc::new(compiled.handlers)).with_bot_id(&config.id);
//!
//! let report = dispatcher.dispatch(&event, session.as_ref()).await;
//! ```

use std::sync::Arc;

use serde::Serialize;
use tracing::{Instrument, Level, debug, span, warn};

use blockbot_core::{InboundEvent, Session};

use crate::handler::HandlerSet;

/// Outcome of dispatching one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Handlers whose matcher accepted the event.
    pub matched: usize,
    /// Matched handlers whose action failed.
    pub failed: usize,
}

impl DispatchReport {
    /// Returns `true` if at least one handler fired.
    pub fn any_matched(&self) -> bool {
        self.matched > 0
    }
}

/// Runs a compiled handler set against inbound events.
///
/// Cloning is cheap; the handler set is shared.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    handlers: Arc<HandlerSet>,
    bot_id: Option<String>,
}

impl Dispatcher {
    /// Creates a dispatcher over a compiled handler set.
    pub fn new(handlers: Arc<HandlerSet>) -> Self {
        Self {
            handlers,
            bot_id: None,
        }
    }

    /// Tags the dispatch span with a bot id (builder pattern).
    pub fn with_bot_id(mut self, bot_id: impl Into<String>) -> Self {
        self.bot_id = Some(bot_id.into());
        self
    }

    /// The handler set this dispatcher runs.
    pub fn handlers(&self) -> &Arc<HandlerSet> {
        &self.handlers
    }

    /// Dispatches one event, replying through `session`.
    pub async fn dispatch(&self, event: &InboundEvent, session: &dyn Session) -> DispatchReport {
        let span = span!(
            Level::DEBUG,
            "dispatch",
            bot_id = self.bot_id.as_deref().unwrap_or("-"),
            event = event.kind_name(),
            chat_id = event.chat_id()
        );
        self.run(event, session).instrument(span).await
    }

    async fn run(&self, event: &InboundEvent, session: &dyn Session) -> DispatchReport {
        let mut report = DispatchReport::default();

        for (index, handler) in self.handlers.iter().enumerate() {
            if !handler.matcher.matches(event) {
                continue;
            }
            report.matched += 1;

            if let Err(e) = handler.action.execute(event, session).await {
                report.failed += 1;
                warn!(
                    handler_index = index,
                    block_id = handler.block_id.as_deref().unwrap_or("-"),
                    error = %e,
                    "Handler action failed"
                );
            }
        }

        debug!(
            matched = report.matched,
            failed = report.failed,
            "Dispatched event"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use blockbot_core::{
        Block, BlockKind, ChatId, InboundHandler, TransportError, TransportResult,
    };
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio_test::assert_ok;

    use crate::compiler::BlockCompiler;
    use crate::handler::NOT_CONFIGURED_TEXT;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Sent {
        Text(ChatId, String),
        Photo(ChatId, String, String),
        Keyboard(ChatId, String, Vec<Vec<String>>),
        Ack(String),
    }

    /// Records outbound calls; fails text sends whose content is `fail_on`.
    #[derive(Default)]
    struct RecordingSession {
        sent: Mutex<Vec<Sent>>,
        fail_on: Option<String>,
    }

    impl RecordingSession {
        fn failing_on(text: &str) -> Self {
            Self {
                fail_on: Some(text.to_string()),
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl Session for RecordingSession {
        fn id(&self) -> &str {
            "recording"
        }

        fn on_inbound_event(&self, _handler: InboundHandler) {}

        async fn close(&self) -> TransportResult<()> {
            Ok(())
        }

        async fn send_message(&self, chat_id: ChatId, text: &str) -> TransportResult<()> {
            if self.fail_on.as_deref() == Some(text) {
                return Err(TransportError::send("chat not found"));
            }
            self.sent.lock().push(Sent::Text(chat_id, text.to_string()));
            Ok(())
        }

        async fn send_photo(&self, chat_id: ChatId, url: &str, caption: &str) -> TransportResult<()> {
            self.sent
                .lock()
                .push(Sent::Photo(chat_id, url.to_string(), caption.to_string()));
            Ok(())
        }

        async fn send_keyboard(
            &self,
            chat_id: ChatId,
            text: &str,
            rows: &[Vec<String>],
        ) -> TransportResult<()> {
            self.sent
                .lock()
                .push(Sent::Keyboard(chat_id, text.to_string(), rows.to_vec()));
            Ok(())
        }

        async fn answer_callback(&self, callback_id: &str) -> TransportResult<()> {
            self.sent.lock().push(Sent::Ack(callback_id.to_string()));
            Ok(())
        }
    }

    fn block(id: &str, kind: BlockKind, data: serde_json::Value) -> Block {
        serde_json::from_value(json!({ "id": id, "type": kind.as_str(), "data": data }))
            .unwrap()
    }

    fn dispatcher(blocks: &[Block]) -> Dispatcher {
        let compiled = BlockCompiler::new().compile(blocks);
        Dispatcher::new(Arc::new(compiled.handlers)).with_bot_id("test")
    }

    fn text(s: &str) -> Sent {
        Sent::Text(7, s.to_string())
    }

    #[tokio::test]
    async fn test_command_and_echo_fire_separately() {
        let d = dispatcher(&[
            block("cmd", BlockKind::Command, json!({ "command": "start", "response": "Hi" })),
            block("echo", BlockKind::Message, json!({ "trigger": "", "response": "Echo" })),
        ]);
        let session = RecordingSession::default();

        let report = d.dispatch(&InboundEvent::text(7, "/start"), &session).await;
        assert_eq!(report, DispatchReport { matched: 1, failed: 0 });
        let report = d.dispatch(&InboundEvent::text(7, "hello"), &session).await;
        assert_eq!(report.matched, 1);

        assert_eq!(session.sent(), vec![text("Hi"), text("Echo")]);
    }

    #[tokio::test]
    async fn test_keyboard_send_has_configured_rows() {
        let d = dispatcher(&[block(
            "kb",
            BlockKind::Keyboard,
            json!({ "trigger": "/poll", "text": "Vote:", "buttons": [["Yes", "No"], ["Maybe"]] }),
        )]);
        let session = RecordingSession::default();

        d.dispatch(&InboundEvent::text(7, "/poll"), &session).await;

        let rows = vec![
            vec!["Yes".to_string(), "No".to_string()],
            vec!["Maybe".to_string()],
        ];
        assert_eq!(session.sent(), vec![Sent::Keyboard(7, "Vote:".into(), rows)]);
    }

    #[tokio::test]
    async fn test_every_matching_handler_fires_in_block_order() {
        let d = dispatcher(&[
            block("cond", BlockKind::Condition, json!({
                "condition": "msg.text.includes(\"cat\")",
                "trueResponse": "meow",
                "falseResponse": "no cat",
            })),
            block("trig", BlockKind::Message, json!({ "trigger": "CAT", "response": "cat seen" })),
            block("echo", BlockKind::Message, json!({ "response": "echo" })),
            block("photo", BlockKind::Photo, json!({ "trigger": "cat", "photoUrl": "https://x/cat.png" })),
        ]);
        let session = RecordingSession::default();

        let report = d.dispatch(&InboundEvent::text(7, "a cat!"), &session).await;

        assert_eq!(report.matched, 4);
        assert_eq!(
            session.sent(),
            vec![
                text("meow"),
                text("cat seen"),
                text("echo"),
                Sent::Photo(7, "https://x/cat.png".into(), String::new()),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_send_does_not_stop_dispatch() {
        let d = dispatcher(&[
            block("a", BlockKind::Message, json!({ "response": "first" })),
            block("b", BlockKind::Message, json!({ "response": "second" })),
        ]);
        let session = RecordingSession::failing_on("first");

        let report = d.dispatch(&InboundEvent::text(7, "hi"), &session).await;

        assert_eq!(report, DispatchReport { matched: 2, failed: 1 });
        assert_eq!(session.sent(), vec![text("second")]);
    }

    #[tokio::test]
    async fn test_button_press_is_acknowledged_then_answered() {
        let d = dispatcher(&[block(
            "btn",
            BlockKind::Button,
            json!({ "callbackData": "yes", "response": "Thanks" }),
        )]);
        let session = RecordingSession::default();

        let report = d
            .dispatch(&InboundEvent::callback("q1", 7, "yes"), &session)
            .await;
        assert!(report.any_matched());
        d.dispatch(&InboundEvent::callback("q2", 7, "no"), &session).await;

        assert_eq!(session.sent(), vec![Sent::Ack("q1".into()), text("Thanks")]);
    }

    #[tokio::test]
    async fn test_fallback_answers_any_message() {
        let d = dispatcher(&[]);
        let session = RecordingSession::default();

        let report = d.dispatch(&InboundEvent::text(7, "/whatever"), &session).await;

        assert_eq!(report.matched, 1);
        assert_eq!(session.sent(), vec![text(NOT_CONFIGURED_TEXT)]);
    }

    #[tokio::test]
    async fn test_action_execute_reports_send_errors() {
        let session = RecordingSession::failing_on("boom");
        let action = crate::action::Action::SendText("boom".into());
        assert!(action.execute(&InboundEvent::text(7, "x"), &session).await.is_err());

        let action = crate::action::Action::SendText("fine".into());
        assert_ok!(action.execute(&InboundEvent::text(7, "x"), &session).await);
    }
}

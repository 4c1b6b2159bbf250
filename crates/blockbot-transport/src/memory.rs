//! In-process transport.
//!
//! [`MemoryTransport`] never touches the network. Tests and demos use it to
//! drive bots end to end: inbound events are injected per token and every
//! outbound call is recorded as an [`Outbound`] value.
//!
//! ```rust,ignore
//! let transport = MemoryTransport::new();
//! let manager = InstanceManager::new(repo, Arc::new(transport.clone()), Default::default());
//!
//! manager.start("echo").await?;
//! transport.inject("echo-token", InboundEvent::text(1, "hello"));
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, trace};

use blockbot_core::{
    BoxedSession, ChatId, InboundEvent, InboundHandler, Session, Transport, TransportError,
    TransportResult,
};

/// One recorded outbound call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Outbound {
    Message {
        chat_id: ChatId,
        text: String,
    },
    Photo {
        chat_id: ChatId,
        url: String,
        caption: String,
    },
    Keyboard {
        chat_id: ChatId,
        text: String,
        rows: Vec<Vec<String>>,
    },
    CallbackAnswer {
        callback_id: String,
    },
}

impl Outbound {
    /// Shorthand for an expected text message.
    pub fn message(chat_id: ChatId, text: impl Into<String>) -> Self {
        Self::Message {
            chat_id,
            text: text.into(),
        }
    }
}

#[derive(Default)]
struct MemoryState {
    rejected: Mutex<HashSet<String>>,
    sessions: Mutex<HashMap<String, Arc<MemorySession>>>,
    outbound: Mutex<Vec<(String, Outbound)>>,
    open_delay: Mutex<Duration>,
    close_delay: Mutex<Duration>,
    send_delay: Mutex<Duration>,
    sends_started: AtomicUsize,
    opened: AtomicUsize,
    closed: AtomicUsize,
    next_id: AtomicU64,
}

/// A transport that keeps everything in memory.
///
/// Cloning is cheap; clones share sessions and recordings.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    state: Arc<MemoryState>,
}

impl MemoryTransport {
    /// Creates a transport that accepts every token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `open` fail with `ConnectFailed` for `token`.
    pub fn reject_token(&self, token: impl Into<String>) {
        self.state.rejected.lock().insert(token.into());
    }

    /// Accepts `token` again.
    pub fn accept_token(&self, token: &str) {
        self.state.rejected.lock().remove(token);
    }

    /// Delays every `open` call.
    pub fn set_open_delay(&self, delay: Duration) {
        *self.state.open_delay.lock() = delay;
    }

    /// Delays every session `close` call.
    pub fn set_close_delay(&self, delay: Duration) {
        *self.state.close_delay.lock() = delay;
    }

    /// Delays every outbound call. The call is recorded once the delay has
    /// passed, and not at all if its future is dropped first.
    pub fn set_send_delay(&self, delay: Duration) {
        *self.state.send_delay.lock() = delay;
    }

    /// Number of outbound calls begun so far, including ones still delayed.
    pub fn sends_started(&self) -> usize {
        self.state.sends_started.load(Ordering::SeqCst)
    }

    /// Delivers an event to the open session for `token`.
    ///
    /// Returns `false` if no session is open or no handler is registered.
    pub fn inject(&self, token: &str, event: InboundEvent) -> bool {
        let handler = self
            .state
            .sessions
            .lock()
            .get(token)
            .and_then(|session| session.handler.lock().clone());
        match handler {
            Some(handler) => {
                handler(event);
                true
            }
            None => {
                trace!("No open session for injected event");
                false
            }
        }
    }

    /// Ends the session for `token` from the transport side, as a revoked
    /// credential would. The session drops its handler without being closed.
    pub fn end_session(&self, token: &str) -> bool {
        let session = self.state.sessions.lock().remove(token);
        match session {
            Some(session) => {
                let mut handler = session.handler.lock();
                session.ended.store(true, Ordering::SeqCst);
                handler.take();
                drop(handler);
                debug!(session = %session.id, "Session ended by transport");
                true
            }
            None => false,
        }
    }

    /// Returns `true` if a session is open for `token`.
    pub fn is_open(&self, token: &str) -> bool {
        self.state.sessions.lock().contains_key(token)
    }

    /// Outbound calls made through sessions of `token`, in order.
    pub fn sent(&self, token: &str) -> Vec<Outbound> {
        self.state
            .outbound
            .lock()
            .iter()
            .filter(|(t, _)| t == token)
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Forgets every recorded outbound call.
    pub fn clear_sent(&self) {
        self.state.outbound.lock().clear();
    }

    /// Number of sessions opened so far.
    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    /// Number of sessions closed so far.
    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("open_sessions", &self.state.sessions.lock().len())
            .field("opened", &self.opened())
            .field("closed", &self.closed())
            .finish()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    async fn open(&self, token: &str) -> TransportResult<BoxedSession> {
        let delay = *self.state.open_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.state.rejected.lock().contains(token) {
            return Err(TransportError::connect("token rejected"));
        }

        let n = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        let session = Arc::new(MemorySession {
            id: format!("memory-{n}"),
            token: token.to_string(),
            handler: Mutex::new(None),
            closed: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            state: Arc::clone(&self.state),
        });
        self.state
            .sessions
            .lock()
            .insert(token.to_string(), Arc::clone(&session));
        self.state.opened.fetch_add(1, Ordering::SeqCst);

        debug!(session = %session.id, "Memory session opened");
        let session: BoxedSession = session;
        Ok(session)
    }
}

struct MemorySession {
    id: String,
    token: String,
    handler: Mutex<Option<InboundHandler>>,
    closed: AtomicBool,
    ended: AtomicBool,
    state: Arc<MemoryState>,
}

impl MemorySession {
    async fn deliver(&self, call: Outbound) -> TransportResult<()> {
        self.state.sends_started.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.send_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.record(call)
    }

    fn record(&self, call: Outbound) -> TransportResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::SessionClosed);
        }
        trace!(session = %self.id, ?call, "Recording outbound call");
        self.state.outbound.lock().push((self.token.clone(), call));
        Ok(())
    }
}

#[async_trait]
impl Session for MemorySession {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_inbound_event(&self, handler: InboundHandler) {
        let mut slot = self.handler.lock();
        if self.closed.load(Ordering::SeqCst) || self.ended.load(Ordering::SeqCst) {
            return;
        }
        *slot = Some(handler);
    }

    async fn close(&self) -> TransportResult<()> {
        let delay = *self.state.close_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.handler.lock().take();

        let mut sessions = self.state.sessions.lock();
        if sessions.get(&self.token).is_some_and(|s| s.id == self.id) {
            sessions.remove(&self.token);
        }
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        debug!(session = %self.id, "Memory session closed");
        Ok(())
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> TransportResult<()> {
        self.deliver(Outbound::message(chat_id, text)).await
    }

    async fn send_photo(&self, chat_id: ChatId, url: &str, caption: &str) -> TransportResult<()> {
        self.deliver(Outbound::Photo {
            chat_id,
            url: url.to_string(),
            caption: caption.to_string(),
        })
        .await
    }

    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        rows: &[Vec<String>],
    ) -> TransportResult<()> {
        self.deliver(Outbound::Keyboard {
            chat_id,
            text: text.to_string(),
            rows: rows.to_vec(),
        })
        .await
    }

    async fn answer_callback(&self, callback_id: &str) -> TransportResult<()> {
        self.deliver(Outbound::CallbackAnswer {
            callback_id: callback_id.to_string(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_handler() -> (InboundHandler, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let handler: InboundHandler = Arc::new(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (handler, count)
    }

    #[tokio::test]
    async fn test_rejected_token_fails_to_open() {
        let transport = MemoryTransport::new();
        transport.reject_token("bad");

        let err = transport.open("bad").await.err().unwrap();
        assert!(matches!(err, TransportError::ConnectFailed { .. }));
        assert_eq!(transport.opened(), 0);
    }

    #[tokio::test]
    async fn test_inject_reaches_registered_handler() {
        let transport = MemoryTransport::new();
        let session = transport.open("tok").await.unwrap();
        assert!(!transport.inject("tok", InboundEvent::text(1, "early")));

        let (handler, count) = counting_handler();
        session.on_inbound_event(handler);
        assert!(transport.inject("tok", InboundEvent::text(1, "hi")));
        assert!(!transport.inject("other", InboundEvent::text(1, "hi")));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_close_stops_delivery_and_sends() {
        let transport = MemoryTransport::new();
        let session = transport.open("tok").await.unwrap();
        let (handler, count) = counting_handler();
        session.on_inbound_event(handler);

        session.send_message(5, "before").await.unwrap();
        session.close().await.unwrap();

        assert!(!transport.inject("tok", InboundEvent::text(1, "late")));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(matches!(
            session.send_message(5, "after").await,
            Err(TransportError::SessionClosed)
        ));
        assert_eq!(transport.sent("tok"), vec![Outbound::message(5, "before")]);
        assert_eq!(transport.closed(), 1);
        assert!(!transport.is_open("tok"));
    }

    #[tokio::test]
    async fn test_end_session_drops_handler() {
        let transport = MemoryTransport::new();
        let session = transport.open("tok").await.unwrap();
        let (handler, _count) = counting_handler();
        let weak = Arc::downgrade(&handler);
        session.on_inbound_event(handler);

        assert!(transport.end_session("tok"));
        assert!(weak.upgrade().is_none());
        assert!(!transport.is_open("tok"));

        let (late, _count) = counting_handler();
        let weak = Arc::downgrade(&late);
        session.on_inbound_event(late);
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test]
    async fn test_dropped_delayed_send_is_not_recorded() {
        let transport = MemoryTransport::new();
        let session = transport.open("tok").await.unwrap();
        transport.set_send_delay(Duration::from_millis(200));

        let send = session.send_message(1, "slow");
        assert!(
            tokio::time::timeout(Duration::from_millis(20), send)
                .await
                .is_err()
        );
        assert_eq!(transport.sends_started(), 1);
        assert!(transport.sent("tok").is_empty());
    }
}

//! Telegram Bot API transport.
//!
//! Each session long-polls `getUpdates` on its own task. Transient failures
//! back off exponentially; a rejected token ends the session, which drops the
//! inbound handler so the owner sees the event stream end.
//!
//! ```rust,ignore
//! use blockbot_transport::telegram::TelegramTransport;
//!
//! let transport = TelegramTransport::new("https://api.telegram.org")
//!     .with_poll_timeout(Duration::from_secs(30));
//! ```

mod api;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use blockbot_core::{
    BoxedSession, ChatId, InboundHandler, Session, Transport, TransportError, TransportResult,
};

use api::{ApiError, BotApi};

/// Default Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);
/// Headroom on top of the long-polling timeout for the HTTP request itself.
const REQUEST_SLACK: Duration = Duration::from_secs(10);

const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);
const RETRY_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Opens long-polling sessions against the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramTransport {
    api_base: String,
    poll_timeout: Duration,
    next_session: Arc<AtomicU64>,
}

impl Default for TelegramTransport {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

impl TelegramTransport {
    /// Creates a transport for the API at `api_base`.
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            next_session: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Sets the `getUpdates` long-polling timeout.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn open(&self, token: &str) -> TransportResult<BoxedSession> {
        let api = BotApi::new(&self.api_base, token, self.poll_timeout + REQUEST_SLACK)
            .map_err(ApiError::into_connect)?;
        let me = api.get_me().await.map_err(ApiError::into_connect)?;

        let n = self.next_session.fetch_add(1, Ordering::Relaxed);
        let id = match &me.username {
            Some(name) => format!("telegram-{name}-{n}"),
            None => format!("telegram-{}-{n}", me.id),
        };
        info!(session = %id, "Telegram session opened");

        let shared = Arc::new(Shared {
            handler: Mutex::new(None),
            handler_set: Notify::new(),
            ended: AtomicBool::new(false),
        });
        let cancel = CancellationToken::new();
        let state = PollLoopState {
            api: api.clone(),
            shared: Arc::clone(&shared),
            cancel: cancel.clone(),
            poll_timeout_secs: self.poll_timeout.as_secs(),
            offset: 0,
            retry_count: 0,
            current_delay: INITIAL_RETRY_DELAY,
        };
        let span = info_span!("telegram_poll", session = %id);
        let task = tokio::spawn(state.run().instrument(span));

        let session: BoxedSession = Arc::new(TelegramSession {
            id,
            api,
            shared,
            cancel,
            task: tokio::sync::Mutex::new(Some(task)),
            closed: AtomicBool::new(false),
        });
        Ok(session)
    }
}

/// State shared by a session and its poll loop.
struct Shared {
    handler: Mutex<Option<InboundHandler>>,
    handler_set: Notify,
    /// Written only while `handler` is locked.
    ended: AtomicBool,
}

impl Shared {
    /// Dropping the handler ends the session for its owner.
    fn end(&self) {
        let mut handler = self.handler.lock();
        self.ended.store(true, Ordering::SeqCst);
        handler.take();
    }
}

/// A long-polling session for one bot token.
pub struct TelegramSession {
    id: String,
    api: BotApi,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl TelegramSession {
    fn ensure_open(&self) -> TransportResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::SessionClosed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for TelegramSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSession")
            .field("id", &self.id)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Session for TelegramSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_inbound_event(&self, handler: InboundHandler) {
        let mut slot = self.shared.handler.lock();
        if self.cancel.is_cancelled() || self.shared.ended.load(Ordering::SeqCst) {
            return;
        }
        *slot = Some(handler);
        drop(slot);
        self.shared.handler_set.notify_one();
    }

    async fn close(&self) -> TransportResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.cancel.cancel();

        let task = self.task.lock().await.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                if e.is_panic() {
                    error!(session = %self.id, "Poll loop panicked");
                }
            }
        }
        self.shared.handler.lock().take();
        debug!(session = %self.id, "Telegram session closed");
        Ok(())
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> TransportResult<()> {
        self.ensure_open()?;
        self.api
            .send_message(chat_id, text)
            .await
            .map_err(ApiError::into_send)
    }

    async fn send_photo(&self, chat_id: ChatId, url: &str, caption: &str) -> TransportResult<()> {
        self.ensure_open()?;
        self.api
            .send_photo(chat_id, url, caption)
            .await
            .map_err(ApiError::into_send)
    }

    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        rows: &[Vec<String>],
    ) -> TransportResult<()> {
        self.ensure_open()?;
        self.api
            .send_keyboard(chat_id, text, rows)
            .await
            .map_err(ApiError::into_send)
    }

    async fn answer_callback(&self, callback_id: &str) -> TransportResult<()> {
        self.ensure_open()?;
        self.api
            .answer_callback(callback_id)
            .await
            .map_err(ApiError::into_send)
    }
}

// =============================================================================
// Poll loop
// =============================================================================

/// What the loop does after a failed `getUpdates`.
#[derive(Debug, PartialEq, Eq)]
enum PollOutcome {
    Retry(Duration),
    Stop,
}

struct PollLoopState {
    api: BotApi,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    poll_timeout_secs: u64,
    offset: i64,
    retry_count: u32,
    current_delay: Duration,
}

impl PollLoopState {
    async fn run(mut self) {
        // Updates fetched before a handler exists would be lost.
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            _ = self.shared.handler_set.notified() => {}
        }
        debug!("Poll loop started");

        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.api.get_updates(self.offset, self.poll_timeout_secs) => result,
            };

            match result {
                Ok(updates) => {
                    self.reset_backoff();
                    self.deliver(updates);
                }
                Err(e) => match self.on_error(&e) {
                    PollOutcome::Retry(delay) => {
                        tokio::select! {
                            biased;
                            _ = self.cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    PollOutcome::Stop => {
                        self.shared.end();
                        return;
                    }
                },
            }
        }
        debug!("Poll loop cancelled");
    }

    fn deliver(&mut self, updates: Vec<api::Update>) {
        for update in updates {
            self.offset = self.offset.max(update.update_id + 1);
            let Some(event) = update.into_event() else {
                trace!("Skipping unsupported update");
                continue;
            };
            let handler = self.shared.handler.lock().clone();
            if let Some(handler) = handler {
                handler(event);
            }
        }
    }

    fn reset_backoff(&mut self) {
        self.retry_count = 0;
        self.current_delay = INITIAL_RETRY_DELAY;
    }

    fn on_error(&mut self, e: &ApiError) -> PollOutcome {
        if let ApiError::Unauthorized(_) = e {
            error!(error = %e, "Token rejected, ending session");
            return PollOutcome::Stop;
        }

        let delay = self.current_delay;
        self.retry_count += 1;
        self.current_delay = std::cmp::min(
            Duration::from_secs_f64(delay.as_secs_f64() * RETRY_BACKOFF_MULTIPLIER),
            MAX_RETRY_DELAY,
        );
        warn!(error = %e, retry = self.retry_count, delay = ?delay, "getUpdates failed, retrying");
        PollOutcome::Retry(delay)
    }
}

//! Running instances and their session loops.
//!
//! Every running bot owns one event loop task. The session's inbound handler
//! only pushes events into a bounded channel; the loop pulls them out and runs
//! the dispatcher, so no handler action ever executes on the transport's own
//! task or under a registry lock.
//!
//! ```text
//! Session ──InboundHandler──► mpsc ──► session loop ──► Dispatcher ──► Session::send_*
//!                                         ▲
//!                         CancellationToken (stop)
//! ```
//!
//! The loop ends in one of two ways:
//!
//! - **Cancelled**: `stop` cancels the token and joins the task. Once the join
//!   completes no dispatch can start again.
//! - **Session ended**: the transport dropped the handler, which closes the
//!   channel. The loop reports this through its `on_ended` callback.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, trace, warn};

use blockbot_core::{BoxedSession, InboundEvent, InboundHandler};
use blockbot_framework::{Dispatcher, HandlerSet, HandlerSummary};

/// The live binding of one bot configuration to a handler set and a session.
pub struct RunningInstance {
    /// Configuration id.
    pub config_id: String,
    /// Compiled handlers, shared with the session loop.
    pub handler_set: Arc<HandlerSet>,
    /// The open session.
    pub session: BoxedSession,
    /// When the instance was started.
    pub started_at: DateTime<Utc>,
    /// Distinguishes successive runs of the same configuration.
    pub generation: u64,
    pub(crate) cancel: CancellationToken,
    pub(crate) task: JoinHandle<()>,
}

impl RunningInstance {
    /// Describes this instance.
    pub fn info(&self) -> InstanceInfo {
        InstanceInfo {
            config_id: self.config_id.clone(),
            session_id: self.session.id().to_string(),
            started_at: self.started_at,
            generation: self.generation,
            handlers: self.handler_set.summaries(),
        }
    }
}

impl std::fmt::Debug for RunningInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningInstance")
            .field("config_id", &self.config_id)
            .field("session", &self.session.id())
            .field("handlers", &self.handler_set.len())
            .field("started_at", &self.started_at)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Serialisable snapshot of a running instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceInfo {
    pub config_id: String,
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub generation: u64,
    pub handlers: Vec<HandlerSummary>,
}

/// Creates the inbound handler for a session and the receiving end it feeds.
///
/// The handler never blocks: when the buffer is full the event is dropped and
/// logged.
pub(crate) fn inbound_channel(
    bot_id: &str,
    buffer: usize,
) -> (InboundHandler, mpsc::Receiver<InboundEvent>) {
    let (tx, rx) = mpsc::channel(buffer);
    let bot_id = bot_id.to_string();

    let handler: InboundHandler = Arc::new(move |event: InboundEvent| {
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(
                    bot_id = %bot_id,
                    event = event.kind_name(),
                    chat_id = event.chat_id(),
                    "Event buffer full, dropping event"
                );
            }
            Err(TrySendError::Closed(_)) => {
                trace!(bot_id = %bot_id, "Session loop gone, dropping event");
            }
        }
    });

    (handler, rx)
}

/// The parts of one session loop, assembled by the manager.
pub(crate) struct SessionLoop {
    pub bot_id: String,
    pub generation: u64,
    pub dispatcher: Dispatcher,
    pub session: BoxedSession,
    pub events: mpsc::Receiver<InboundEvent>,
    pub cancel: CancellationToken,
}

impl SessionLoop {
    /// Spawns the loop.
    ///
    /// `on_ended` runs on the loop task when the session ends on its own; it
    /// is not called after cancellation.
    pub fn spawn<F>(self, on_ended: F) -> JoinHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let span = info_span!("session", bot_id = %self.bot_id, generation = self.generation);
        tokio::spawn(self.run(on_ended).instrument(span))
    }

    async fn run<F>(self, on_ended: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Self {
            dispatcher,
            session,
            mut events,
            cancel,
            ..
        } = self;
        debug!(session = session.id(), "Session loop started");
        let mut handled: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(handled, "Session loop cancelled");
                    return;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        dispatcher.dispatch(&event, session.as_ref()).await;
                        handled += 1;
                    }
                    None => break,
                },
            }
        }

        info!(handled, "Session ended by transport");
        on_ended();
    }
}

//! The messaging transport capability.
//!
//! The engine never talks to a messaging platform directly. The host supplies
//! a [`Transport`] that opens credential-bound [`Session`]s; a session delivers
//! inbound events to one registered handler and carries the outbound calls
//! the compiled handlers make.
//!
//! ```text
//! ┌───────────┐ open(token) ┌─────────┐  InboundHandler  ┌────────────┐
//! │ Transport │────────────▶│ Session │─────────────────▶│ Dispatcher │
//! └───────────┘             └─────────┘◀─────────────────└────────────┘
//!                                        send_* / answer_callback
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::foundation::error::TransportResult;
use crate::foundation::event::{ChatId, InboundEvent};

/// Entry point a session calls for every inbound event.
///
/// The handler must not block; implementations hand the event off to the
/// bot's own event loop.
pub type InboundHandler = Arc<dyn Fn(InboundEvent) + Send + Sync>;

/// Ordered rows of ordered button labels.
pub type ButtonRows = Vec<Vec<String>>;

/// An open, credential-bound connection to the messaging platform.
///
/// # Delivery contract
///
/// - Delivery starts once a handler is registered with
///   [`on_inbound_event`](Session::on_inbound_event); registering again
///   replaces the previous handler.
/// - After [`close`](Session::close) returns, the session never calls the
///   handler again and has dropped every clone of it.
/// - If the session ends on its own (credential revoked, fatal network
///   error) it drops the handler. Owners observe this as the end of the
///   event stream.
#[async_trait]
pub trait Session: Send + Sync {
    /// Identifier of this session, for logs.
    fn id(&self) -> &str;

    /// Registers the dispatch entry point.
    fn on_inbound_event(&self, handler: InboundHandler);

    /// Stops delivery and releases the connection.
    async fn close(&self) -> TransportResult<()>;

    /// Sends a text message.
    async fn send_message(&self, chat_id: ChatId, text: &str) -> TransportResult<()>;

    /// Sends a photo by URL with a caption.
    async fn send_photo(&self, chat_id: ChatId, url: &str, caption: &str) -> TransportResult<()>;

    /// Sends a text message with a reply keyboard.
    async fn send_keyboard(
        &self,
        chat_id: ChatId,
        text: &str,
        rows: &[Vec<String>],
    ) -> TransportResult<()>;

    /// Acknowledges an inline-button press.
    async fn answer_callback(&self, callback_id: &str) -> TransportResult<()>;
}

/// A shared session trait object.
pub type BoxedSession = Arc<dyn Session>;

/// Opens sessions for bot credentials.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Name of the transport, for logs.
    fn name(&self) -> &str;

    /// Opens a session for `token`.
    ///
    /// Fails with [`TransportError::ConnectFailed`](crate::TransportError::ConnectFailed)
    /// if the credential is rejected or the platform is unreachable.
    async fn open(&self, token: &str) -> TransportResult<BoxedSession>;
}

/// A shared transport trait object.
pub type BoxedTransport = Arc<dyn Transport>;

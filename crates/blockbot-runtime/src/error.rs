//! Runtime error types.

use std::time::Duration;

use thiserror::Error;

use blockbot_core::{RepositoryError, TransportError};

pub use crate::config::error::{ConfigError, ConfigResult};

/// Why a bot failed to start.
#[derive(Error, Debug)]
pub enum StartFailure {
    /// The transport rejected the credential or could not connect.
    #[error(transparent)]
    Connect(#[from] TransportError),

    /// Opening the session took longer than the configured connect timeout.
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors returned by lifecycle and registry operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// No configuration is registered under this id.
    #[error("Bot not found: {0}")]
    BotNotFound(String),

    /// A running instance already exists for this id.
    #[error("Bot already running: {0}")]
    AlreadyRunning(String),

    /// The configuration cannot change while the bot is running.
    #[error("Bot is running and cannot be modified: {0}")]
    BotRunning(String),

    /// The bot could not be started; its status is now `error`.
    #[error("Failed to start bot {id}: {reason}")]
    StartFailed {
        /// Bot id.
        id: String,
        /// Underlying cause.
        reason: StartFailure,
    },

    /// The session did not close in time and was torn down forcibly.
    #[error("Session of bot {id} did not close within {timeout:?}")]
    SessionCloseTimeout {
        /// Bot id.
        id: String,
        /// The configured close timeout.
        timeout: Duration,
    },

    /// The configuration store failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl RuntimeError {
    /// Returns the bot id this error is about, if any.
    pub fn bot_id(&self) -> Option<&str> {
        match self {
            Self::BotNotFound(id)
            | Self::AlreadyRunning(id)
            | Self::BotRunning(id)
            | Self::StartFailed { id, .. }
            | Self::SessionCloseTimeout { id, .. } => Some(id),
            Self::Repository(_) => None,
        }
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

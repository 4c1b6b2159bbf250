//! Unified error types for the blockbot core.
//!
//! Compile-time and lifecycle errors live in the framework and runtime crates;
//! this module only covers the two injected capabilities: the transport and
//! the configuration repository.

use thiserror::Error;

/// Failure of a [`Transport`](crate::Transport) or one of its sessions.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Opening a session failed (bad credential, network error).
    #[error("connect failed: {reason}")]
    ConnectFailed {
        /// Reason for failure.
        reason: String,
    },

    /// The session is closed and cannot carry traffic.
    #[error("session closed")]
    SessionClosed,

    /// An outbound call was rejected or could not be delivered.
    #[error("failed to send: {0}")]
    SendFailed(String),

    /// Closing the session failed.
    #[error("failed to close session: {0}")]
    CloseFailed(String),
}

impl TransportError {
    /// Creates a connect failure.
    pub fn connect(reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            reason: reason.into(),
        }
    }

    /// Creates a send failure.
    pub fn send(reason: impl Into<String>) -> Self {
        Self::SendFailed(reason.into())
    }
}

/// Errors reported by a [`BotRepository`](crate::integration::BotRepository).
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// No configuration with this id.
    #[error("no bot with id {id:?}")]
    NotFound {
        /// The missing id.
        id: String,
    },

    /// A configuration with this id already exists.
    #[error("a bot with id {id:?} is already stored")]
    AlreadyExists {
        /// The duplicate id.
        id: String,
    },

    /// Backend failure.
    #[error("repository backend error: {0}")]
    Backend(String),
}

impl RepositoryError {
    /// Creates a not-found error.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;

pub type RepositoryResult<T> = Result<T, RepositoryError>;

//! Errors raised while loading the runtime configuration.

use std::path::PathBuf;

use thiserror::Error;

/// A configuration that could not be loaded or is not usable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("configuration file {} does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// The file extension is unknown or its format feature is disabled.
    #[error("configuration format of {} is not supported by this build", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The merged sources do not deserialise into a configuration.
    #[error("failed to read configuration: {0}")]
    Extract(Box<figment::Error>),

    /// A required value is empty.
    #[error("{0} must not be empty")]
    MissingField(String),

    /// A value is out of range or malformed.
    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },

    /// Two seeded bots share an id.
    #[error("bot id {0:?} is configured more than once")]
    DuplicateBotId(String),
}

impl ConfigError {
    /// Creates an [`Invalid`](Self::Invalid) error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The offending field, when the error is about one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField(field) | Self::Invalid { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self::Extract(Box::new(e))
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

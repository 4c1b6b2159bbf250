//! Configuration module for the blockbot runtime.
//!
//! Configuration is layered with figment (defaults, files, environment) and
//! checked by [`validate_config`] before use.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    LogFormat, LogLevel, LogOutput, LoggingConfig, ManagerConfig, RuntimeConfig,
    SpanEventConfig, TelegramConfig,
};
pub use validation::validate_config;

//! # Blockbot
//!
//! Run chat bots whose behaviour is described by a list of declarative
//! blocks ("on /start send a greeting", "on text containing *price* send a
//! photo", ...).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐ compile ┌────────────┐
//! │ BotConfig    │────────▶│ HandlerSet │──────────────┐
//! │ (blocks)     │         └────────────┘              ▼
//! └──────────────┘                             ┌──────────────┐
//!        ▲                 ┌─────────┐ event   │  Dispatcher  │
//!        │ status          │ Session │────────▶│ (per bot     │
//! ┌──────────────────┐     │         │◀────────│  event loop) │
//! │ InstanceManager  │────▶└─────────┘  send_* └──────────────┘
//! └──────────────────┘ open
//! ```
//!
//! - **Core**: blocks, events, bot configurations, transport and repository traits
//! - **Framework**: block compiler, matchers, actions, dispatcher
//! - **Runtime**: instance manager, configuration loading, logging
//! - **Transport**: in-memory transport and the Telegram Bot API transport
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use blockbot::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let blocks = vec![Block::new("greet", BlockKind::Start).with("message", "Hello!")];
//!     let repository = Arc::new(InMemoryBotRepository::new());
//!     let manager = InstanceManager::new(repository, Arc::new(MemoryTransport::new()), Default::default());
//!
//!     let id = manager.register(BotConfig::new("greeter", "token", blocks)).await?;
//!     manager.start(&id).await?;
//!     manager.run_until_ctrl_c().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log lines
//! - `telegram`: Telegram Bot API transport

pub use blockbot_core as core;
pub use blockbot_framework as framework;
pub use blockbot_runtime as runtime;
pub use blockbot_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use blockbot::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use blockbot_runtime::{InstanceManager, RuntimeError, RuntimeResult};

    // Configuration and logging
    pub use blockbot_runtime::config::{ConfigLoader, ManagerConfig, RuntimeConfig};
    pub use blockbot_runtime::logging::LoggingBuilder;

    // Bot configurations and their storage
    pub use blockbot_core::{
        Block, BlockKind, BotConfig, BotConfigPatch, BotRepository, BotStatus,
        InMemoryBotRepository,
    };

    // Events and the transport seam
    pub use blockbot_core::{InboundEvent, Session, Transport};

    // Compilation
    pub use blockbot_framework::{BlockCompiler, Compilation, HandlerSet};

    // Transports
    pub use blockbot_transport::MemoryTransport;
    #[cfg(feature = "telegram")]
    pub use blockbot_transport::TelegramTransport;
}

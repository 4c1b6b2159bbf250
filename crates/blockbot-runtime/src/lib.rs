//! Blockbot Runtime - lifecycle layer of the blockbot engine.
//!
//! This crate provides:
//! - [`InstanceManager`]: start, stop, restart and delete bots, with at most
//!   one running instance per configuration
//! - Configuration loading ([`config::ConfigLoader`]) and validation
//! - Logging setup ([`logging::LoggingBuilder`])
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use blockbot_core::InMemoryBotRepository;
//! use blockbot_runtime::{InstanceManager, config::load_config, logging};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let repository = Arc::new(InMemoryBotRepository::with_bots(config.bots.clone()));
//!     let manager = InstanceManager::new(repository, my_transport(), config.manager.clone());
//!
//!     for bot in &config.bots {
//!         manager.start(&bot.id).await?;
//!     }
//!     manager.run_until_ctrl_c().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod instance;
pub mod logging;
pub mod manager;

pub use config::{ConfigLoader, RuntimeConfig};
pub use error::{ConfigError, ConfigResult, RuntimeError, RuntimeResult, StartFailure};
pub use instance::{InstanceInfo, RunningInstance};
pub use logging::LoggingBuilder;
pub use manager::InstanceManager;

//! # Blockbot Transport
//!
//! Messaging transports for the blockbot engine.
//!
//! This crate implements the [`Transport`](blockbot_core::Transport) and
//! [`Session`](blockbot_core::Session) capabilities defined in
//! `blockbot-core`.
//!
//! ## Features
//!
//! - `telegram`: Telegram Bot API transport (long polling over HTTPS)
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  blockbot-runtime    │  (InstanceManager)
//! │  (uses capabilities) │
//! ├──────────────────────┤
//! │  blockbot-core       │  (Transport / Session traits)
//! ├──────────────────────┤
//! │  blockbot-transport  │  <- This crate (implementations)
//! ├──────────────────────┤
//! │  Network / memory    │
//! └──────────────────────┘
//! ```
//!
//! | Transport | Description | Use Case |
//! |-----------|-------------|----------|
//! | [`MemoryTransport`] | In-process, records outbound calls | Tests and demos |
//! | `TelegramTransport` | `getUpdates` long polling | Production bots |

pub mod memory;

#[cfg(feature = "telegram")]
pub mod telegram;

pub use memory::{MemoryTransport, Outbound};

#[cfg(feature = "telegram")]
pub use telegram::TelegramTransport;

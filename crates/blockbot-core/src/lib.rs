//! # Blockbot Core
//!
//! The data model and capability traits shared by every blockbot crate.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! - **Blocks**: the declarative bot-logic vocabulary ([`Block`], [`BlockKind`])
//! - **Events**: inbound messages and button presses ([`InboundEvent`])
//! - **Errors**: [`TransportError`], [`RepositoryError`]
//!
//! ### Integration Layer
//!
//! - **Bot configuration**: [`BotConfig`], [`BotStatus`], [`BotConfigPatch`]
//! - **Transport capability**: [`Transport`] opens [`Session`]s
//! - **Repository capability**: [`BotRepository`], with [`InMemoryBotRepository`]
//!
//! Compilation of blocks into handlers lives in `blockbot-framework`; the
//! lifecycle of running bots lives in `blockbot-runtime`.

pub mod foundation;
pub mod integration;

pub use foundation::{
    Block, BlockData, BlockKind, CallbackEvent, ChatId, InboundEvent, MessageEvent,
    RepositoryError, RepositoryResult, TransportError, TransportResult,
};

pub use integration::{
    BotConfig, BotConfigPatch, BotRepository, BotStatus, BoxedRepository, BoxedSession,
    BoxedTransport, ButtonRows, InMemoryBotRepository, InboundHandler, Session, Transport,
};

//! Integration layer - External system interfaces.
//!
//! - Bot configuration records and their status
//! - The messaging transport capability
//! - The configuration repository capability

pub mod bot;
pub mod repository;
pub mod transport;

pub use bot::{BotConfig, BotConfigPatch, BotStatus};
pub use repository::{BotRepository, BoxedRepository, InMemoryBotRepository};
pub use transport::{BoxedSession, BoxedTransport, ButtonRows, InboundHandler, Session, Transport};

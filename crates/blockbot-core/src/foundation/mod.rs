//! Foundation layer - data model and error types.
//!
//! - Blocks: the declarative bot-logic units ([`Block`], [`BlockKind`])
//! - Events: what a session delivers ([`InboundEvent`])
//! - Errors: transport and repository failures

pub mod block;
pub mod error;
pub mod event;

pub use block::{Block, BlockData, BlockKind};
pub use error::{RepositoryError, RepositoryResult, TransportError, TransportResult};
pub use event::{CallbackEvent, ChatId, InboundEvent, MessageEvent};

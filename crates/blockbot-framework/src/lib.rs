//! # Blockbot Framework
//!
//! Turns declarative blocks into running bot logic.
//!
//! This layer provides:
//! - The trigger/action model ([`Matcher`], [`Action`])
//! - A restricted condition language ([`Expr`]) evaluated by a small interpreter
//! - [`BlockCompiler`], producing an immutable [`HandlerSet`] plus warnings
//! - [`Dispatcher`], running a handler set against inbound events
//!
//! ```text
//! Vec<Block> ──► BlockCompiler ──► HandlerSet ──► Dispatcher ◄── InboundEvent
//!                                                    │
//!                                                    ▼
//!                                          Session::send_* calls
//! ```
//!
//! Nothing here owns a connection or a task; the lifecycle of running bots is
//! handled by `blockbot-runtime`.

pub mod action;
pub mod compiler;
pub mod dispatcher;
pub mod error;
pub mod expr;
pub mod handler;
pub mod matcher;

pub use action::Action;
pub use compiler::{BlockCompiler, Compilation};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::{CompileWarning, ExprError, ExprResult};
pub use expr::{Expr, Scope, Value};
pub use handler::{Handler, HandlerKind, HandlerSet, HandlerSummary, NOT_CONFIGURED_TEXT};
pub use matcher::Matcher;

//! Compiled handlers.
//!
//! A [`HandlerSet`] is the output of the block compiler: an ordered list of
//! matcher/action pairs. It is built once per start and never mutated
//! afterwards; the running instance shares it with its dispatcher behind an
//! `Arc`.

use serde::Serialize;

use crate::action::Action;
use crate::matcher::Matcher;

/// Text of the single handler compiled from an empty configuration.
pub const NOT_CONFIGURED_TEXT: &str = "The bot is not configured yet. Add blocks in the builder.";

/// Broad category of a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    /// Reacts to a bot command.
    Command,
    /// Reacts to message text (triggers, plain text, conditions).
    Trigger,
    /// The placeholder handler of an unconfigured bot.
    Fallback,
    /// Reacts to an inline-button press.
    CallbackData,
}

/// One compiled matcher/action pair.
#[derive(Debug, Clone)]
pub struct Handler {
    /// Category.
    pub kind: HandlerKind,
    /// Block this handler was compiled from; `None` for the fallback.
    pub block_id: Option<String>,
    /// When to fire.
    pub matcher: Matcher,
    /// What to do.
    pub action: Action,
}

impl Handler {
    /// Creates a handler compiled from a block.
    pub fn new(
        kind: HandlerKind,
        block_id: impl Into<String>,
        matcher: Matcher,
        action: Action,
    ) -> Self {
        Self {
            kind,
            block_id: Some(block_id.into()),
            matcher,
            action,
        }
    }

    /// The handler of a bot without usable blocks.
    pub fn fallback() -> Self {
        Self {
            kind: HandlerKind::Fallback,
            block_id: None,
            matcher: Matcher::AnyMessage,
            action: Action::SendText(NOT_CONFIGURED_TEXT.to_string()),
        }
    }
}

/// The ordered, immutable result of compiling a block sequence.
#[derive(Debug, Clone)]
pub struct HandlerSet {
    handlers: Vec<Handler>,
}

impl HandlerSet {
    /// Wraps compiled handlers as they are. An empty list is a set that
    /// answers nothing.
    pub fn new(handlers: Vec<Handler>) -> Self {
        Self { handlers }
    }

    /// The set holding only the "not configured" fallback.
    pub fn fallback() -> Self {
        Self {
            handlers: vec![Handler::fallback()],
        }
    }

    /// Handlers in dispatch order.
    pub fn iter(&self) -> std::slice::Iter<'_, Handler> {
        self.handlers.iter()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no event matches anything in the set.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Returns `true` if this is the fallback set.
    pub fn is_fallback(&self) -> bool {
        matches!(self.handlers.as_slice(), [h] if h.kind == HandlerKind::Fallback)
    }

    /// Describes every handler, in order.
    pub fn summaries(&self) -> Vec<HandlerSummary> {
        self.handlers
            .iter()
            .enumerate()
            .map(|(index, h)| HandlerSummary {
                index,
                block_id: h.block_id.clone(),
                kind: h.kind,
                matcher: h.matcher.describe(),
                action: h.action.describe(),
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a HandlerSet {
    type Item = &'a Handler;
    type IntoIter = std::slice::Iter<'a, Handler>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Serialisable description of a compiled handler, for previews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerSummary {
    /// Position in dispatch order.
    pub index: usize,
    /// Source block.
    pub block_id: Option<String>,
    /// Category.
    pub kind: HandlerKind,
    /// Matching rule.
    pub matcher: String,
    /// Effect.
    pub action: String,
}

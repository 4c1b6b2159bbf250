//! Matchers decide whether a compiled handler reacts to an event.
//!
//! A [`Matcher`] is plain data: the compiler builds one per handler from block
//! fields and the dispatcher interprets it. Trigger texts are treated as
//! literals, so a trigger of `a.b*c` only matches messages containing exactly
//! `a.b*c` (ignoring case).
//!
//! | variant | accepts |
//! |---|---|
//! | [`Command`](Matcher::Command) | messages whose first word is `/name` or `/name@bot` |
//! | [`Trigger`](Matcher::Trigger) | messages containing the trigger, case-insensitively |
//! | [`NonCommandText`](Matcher::NonCommandText) | text messages not starting with `/` |
//! | [`CallbackData`](Matcher::CallbackData) | button presses with exactly this payload |
//! | [`AnyMessage`](Matcher::AnyMessage) | every message, with or without text |

use regex::{Regex, RegexBuilder};

use blockbot_core::{InboundEvent, MessageEvent};

/// Upper bound for the compiled size of a trigger pattern.
const TRIGGER_SIZE_LIMIT: usize = 1 << 20;

/// The matching rule of one handler.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Exact bot command, without the leading `/`.
    Command(String),
    /// Case-insensitive literal substring.
    Trigger {
        /// The trigger as configured.
        literal: String,
        /// The escaped, case-insensitive pattern.
        pattern: Regex,
    },
    /// Any text message that is not a command.
    NonCommandText,
    /// Exact callback payload.
    CallbackData(String),
    /// Any message event.
    AnyMessage,
}

impl Matcher {
    /// Creates a command matcher. A leading `/` in `name` is ignored.
    pub fn command(name: &str) -> Self {
        Self::Command(name.trim_start_matches('/').to_string())
    }

    /// Creates a literal trigger matcher.
    ///
    /// Every character with special meaning to the pattern engine is escaped
    /// before compilation.
    pub fn trigger(literal: &str) -> Result<Self, regex::Error> {
        let pattern = RegexBuilder::new(&regex::escape(literal))
            .case_insensitive(true)
            .size_limit(TRIGGER_SIZE_LIMIT)
            .build()?;
        Ok(Self::Trigger {
            literal: literal.to_string(),
            pattern,
        })
    }

    /// The text rule shared by message, keyboard and photo blocks: a trigger
    /// when one is configured, otherwise any non-command text.
    pub fn text_rule(trigger: Option<&str>) -> Result<Self, regex::Error> {
        match trigger {
            Some(t) => Self::trigger(t),
            None => Ok(Self::NonCommandText),
        }
    }

    /// Returns whether this matcher accepts the event.
    pub fn matches(&self, event: &InboundEvent) -> bool {
        match (self, event) {
            (Self::CallbackData(expected), InboundEvent::Callback(cb)) => {
                cb.data.as_deref() == Some(expected.as_str())
            }
            (Self::AnyMessage, InboundEvent::Message(_)) => true,
            (Self::Command(name), InboundEvent::Message(msg)) => {
                text(msg).is_some_and(|t| is_command(t, name))
            }
            (Self::Trigger { pattern, .. }, InboundEvent::Message(msg)) => {
                text(msg).is_some_and(|t| pattern.is_match(t))
            }
            (Self::NonCommandText, InboundEvent::Message(msg)) => {
                text(msg).is_some_and(|t| !is_command_text(t))
            }
            _ => false,
        }
    }

    /// Human-readable description, used by handler summaries.
    pub fn describe(&self) -> String {
        match self {
            Self::Command(name) => format!("command /{name}"),
            Self::Trigger { literal, .. } => format!("text contains {literal:?} (any case)"),
            Self::NonCommandText => "any non-command text".to_string(),
            Self::CallbackData(data) => format!("callback data {data:?}"),
            Self::AnyMessage => "any message".to_string(),
        }
    }
}

fn text(msg: &MessageEvent) -> Option<&str> {
    msg.text.as_deref()
}

/// Command text starts with `/` at its very first character.
fn is_command_text(text: &str) -> bool {
    text.starts_with('/')
}

/// `/name`, optionally addressed as `/name@botname`, as the first word.
fn is_command(text: &str, name: &str) -> bool {
    if !is_command_text(text) {
        return false;
    }
    let Some(first) = text.split_whitespace().next() else {
        return false;
    };
    let Some(rest) = first.strip_prefix('/').and_then(|r| r.strip_prefix(name)) else {
        return false;
    };
    rest.is_empty() || rest.strip_prefix('@').is_some_and(|bot| !bot.is_empty())
}

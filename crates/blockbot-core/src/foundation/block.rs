//! Declarative configuration blocks.
//!
//! A [`Block`] is one unit of bot logic authored in the visual builder. Blocks
//! are stored as an ordered sequence on a bot configuration; the order is the
//! dispatch precedence of the handlers compiled from them, so every container
//! in this crate preserves insertion order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The free-form field set of a block, as produced by the builder forms.
pub type BlockData = Map<String, Value>;

/// The closed vocabulary of block types.
///
/// Unrecognised type names are kept as [`BlockKind::Unknown`] so that a
/// configuration containing them still deserialises; the compiler reports
/// them as warnings instead of rejecting the whole configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BlockKind {
    /// Reply to `/start`.
    Start,
    /// Reply to an arbitrary `/command`.
    Command,
    /// Reply to text containing a trigger, or to any plain text.
    Message,
    /// Reply with a button grid.
    Keyboard,
    /// Reply to a pressed inline button.
    Button,
    /// Reply with a photo.
    Photo,
    /// Reply with one of two texts depending on a boolean expression.
    Condition,
    /// Bind a variable for later condition blocks.
    Variable,
    /// Any other type name.
    Unknown(String),
}

impl BlockKind {
    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::Command => "command",
            Self::Message => "message",
            Self::Keyboard => "keyboard",
            Self::Button => "button",
            Self::Photo => "photo",
            Self::Condition => "condition",
            Self::Variable => "variable",
            Self::Unknown(name) => name,
        }
    }

    /// Returns `true` for every kind except [`BlockKind::Unknown`].
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl FromStr for BlockKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "start" => Self::Start,
            "command" => Self::Command,
            "message" => Self::Message,
            "keyboard" => Self::Keyboard,
            "button" => Self::Button,
            "photo" => Self::Photo,
            "condition" => Self::Condition,
            "variable" => Self::Variable,
            other => Self::Unknown(other.to_string()),
        })
    }
}

impl From<String> for BlockKind {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<BlockKind> for String {
    fn from(kind: BlockKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declarative configuration unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Identifier assigned by the builder, unique within a configuration.
    pub id: String,
    /// Block type.
    #[serde(rename = "type")]
    pub kind: BlockKind,
    /// Type-specific fields.
    #[serde(default)]
    pub data: BlockData,
}

impl Block {
    /// Creates a block with no data fields.
    pub fn new(id: impl Into<String>, kind: BlockKind) -> Self {
        Self {
            id: id.into(),
            kind,
            data: BlockData::new(),
        }
    }

    /// Sets a data field (builder pattern).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Returns the raw value of a data field.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns a data field as text.
    ///
    /// Strings are returned as-is, numbers and booleans in their display form.
    /// Missing fields, `null`, empty strings and structured values yield
    /// `None`, so callers can fall back to a default the way the builder does.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.data.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Returns a data field as text, or `default` when it is absent or empty.
    pub fn text_or(&self, key: &str, default: &str) -> String {
        self.text(key).unwrap_or_else(|| default.to_string())
    }
}

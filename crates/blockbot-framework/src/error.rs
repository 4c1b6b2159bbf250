//! Error types for the blockbot framework.

use serde::Serialize;
use thiserror::Error;

/// A non-fatal problem found while compiling one block.
///
/// The offending block is skipped; compilation of the remaining blocks
/// continues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("block '{block_id}': {reason}")]
pub struct CompileWarning {
    /// Id of the skipped block.
    pub block_id: String,
    /// Why it was skipped.
    pub reason: String,
}

impl CompileWarning {
    /// Creates a warning for a block.
    pub fn new(block_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            block_id: block_id.into(),
            reason: reason.into(),
        }
    }
}

/// Errors in a condition expression.
///
/// All of these are detected when the condition block is compiled; a compiled
/// expression never fails to evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    /// The expression text is empty.
    #[error("empty expression")]
    Empty,

    /// The expression text is longer than the allowed maximum.
    #[error("expression longer than {max} characters")]
    TooLong {
        /// Maximum accepted length.
        max: usize,
    },

    /// Parentheses or operators are nested too deeply.
    #[error("expression nested deeper than {max} levels")]
    TooDeep {
        /// Maximum accepted depth.
        max: usize,
    },

    /// A character that starts no token.
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar {
        /// The character.
        ch: char,
        /// Byte offset in the source.
        offset: usize,
    },

    /// A string literal without closing quote.
    #[error("unterminated string literal at offset {offset}")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        offset: usize,
    },

    /// An integer literal out of range.
    #[error("integer literal '{0}' out of range")]
    IntOutOfRange(String),

    /// A token the grammar does not allow here.
    #[error("expected {expected}, found {found}")]
    Unexpected {
        /// What the parser was looking for.
        expected: &'static str,
        /// What it got.
        found: String,
    },

    /// An identifier that is neither built in nor bound by an earlier
    /// variable block.
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    /// An unsupported `.member` access.
    #[error("unknown member '.{0}'")]
    UnknownMember(String),

    /// Operand types do not fit the operator.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
}

/// Result type for expression parsing.
pub type ExprResult<T> = Result<T, ExprError>;

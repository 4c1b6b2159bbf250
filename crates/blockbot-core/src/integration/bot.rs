//! Bot configuration records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::foundation::block::Block;

/// Lifecycle status of a bot configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    /// Not running.
    #[default]
    Stopped,
    /// A session is open and handlers are attached.
    Running,
    /// The last start failed or the session ended unexpectedly.
    Error,
}

impl std::fmt::Display for BotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A stored bot configuration.
///
/// The engine only reads `id`, `token` and `blocks`, and writes `status`.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Opaque transport credential.
    pub token: String,
    /// Ordered bot logic.
    #[serde(default)]
    pub blocks: Vec<Block>,
    /// Current status.
    #[serde(default)]
    pub status: BotStatus,
    /// Creation time.
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl BotConfig {
    /// Creates a stopped configuration with a fresh random id.
    pub fn new(name: impl Into<String>, token: impl Into<String>, blocks: Vec<Block>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), name, token, blocks)
    }

    /// Creates a stopped configuration with an explicit id.
    pub fn with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        token: impl Into<String>,
        blocks: Vec<Block>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            token: token.into(),
            blocks,
            status: BotStatus::Stopped,
            created_at: Utc::now(),
        }
    }

    /// Applies a partial update. Absent fields are left untouched.
    pub fn apply(&mut self, patch: BotConfigPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(token) = patch.token {
            self.token = token;
        }
        if let Some(blocks) = patch.blocks {
            self.blocks = blocks;
        }
    }
}

// The token is a credential and must not end up in logs.
impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("blocks", &self.blocks.len())
            .field("status", &self.status)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// A partial update of a [`BotConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BotConfigPatch {
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New credential.
    #[serde(default)]
    pub token: Option<String>,
    /// New block sequence.
    #[serde(default)]
    pub blocks: Option<Vec<Block>>,
}

impl BotConfigPatch {
    /// Returns `true` if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.token.is_none() && self.blocks.is_none()
    }
}

//! The configuration storage capability.
//!
//! Bot configurations are owned by a storage collaborator. The engine reads
//! them through [`BotRepository`] and writes back nothing but the status.
//! [`InMemoryBotRepository`] is the default implementation used by tests and
//! by hosts without persistent storage.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::foundation::error::{RepositoryError, RepositoryResult};
use crate::integration::bot::{BotConfig, BotConfigPatch, BotStatus};

/// Storage of bot configurations.
#[async_trait]
pub trait BotRepository: Send + Sync {
    /// Returns the configuration with this id.
    async fn get(&self, id: &str) -> RepositoryResult<Option<BotConfig>>;

    /// Returns all configurations in insertion order.
    async fn list(&self) -> RepositoryResult<Vec<BotConfig>>;

    /// Stores a new configuration.
    async fn insert(&self, config: BotConfig) -> RepositoryResult<()>;

    /// Applies a partial update and returns the updated configuration.
    async fn update(&self, id: &str, patch: BotConfigPatch) -> RepositoryResult<BotConfig>;

    /// Writes the status of a configuration.
    async fn set_status(&self, id: &str, status: BotStatus) -> RepositoryResult<()>;

    /// Removes a configuration. Returns whether it existed.
    async fn remove(&self, id: &str) -> RepositoryResult<bool>;
}

/// A shared repository trait object.
pub type BoxedRepository = Arc<dyn BotRepository>;

/// Process-local repository backed by a vector.
#[derive(Debug, Default)]
pub struct InMemoryBotRepository {
    bots: RwLock<Vec<BotConfig>>,
}

impl InMemoryBotRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository pre-filled with configurations.
    ///
    /// Later entries with a duplicate id are ignored.
    pub fn with_bots(bots: impl IntoIterator<Item = BotConfig>) -> Self {
        let mut unique: Vec<BotConfig> = Vec::new();
        for bot in bots {
            if !unique.iter().any(|b| b.id == bot.id) {
                unique.push(bot);
            }
        }
        Self {
            bots: RwLock::new(unique),
        }
    }

    /// Returns the number of stored configurations.
    pub fn len(&self) -> usize {
        self.bots.read().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.bots.read().is_empty()
    }
}

#[async_trait]
impl BotRepository for InMemoryBotRepository {
    async fn get(&self, id: &str) -> RepositoryResult<Option<BotConfig>> {
        Ok(self.bots.read().iter().find(|b| b.id == id).cloned())
    }

    async fn list(&self) -> RepositoryResult<Vec<BotConfig>> {
        Ok(self.bots.read().clone())
    }

    async fn insert(&self, config: BotConfig) -> RepositoryResult<()> {
        let mut bots = self.bots.write();
        if bots.iter().any(|b| b.id == config.id) {
            return Err(RepositoryError::AlreadyExists { id: config.id });
        }
        debug!(bot_id = %config.id, "Stored bot configuration");
        bots.push(config);
        Ok(())
    }

    async fn update(&self, id: &str, patch: BotConfigPatch) -> RepositoryResult<BotConfig> {
        let mut bots = self.bots.write();
        let bot = bots
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| RepositoryError::not_found(id))?;
        bot.apply(patch);
        Ok(bot.clone())
    }

    async fn set_status(&self, id: &str, status: BotStatus) -> RepositoryResult<()> {
        let mut bots = self.bots.write();
        let bot = bots
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| RepositoryError::not_found(id))?;
        bot.status = status;
        Ok(())
    }

    async fn remove(&self, id: &str) -> RepositoryResult<bool> {
        let mut bots = self.bots.write();
        let before = bots.len();
        bots.retain(|b| b.id != id);
        Ok(bots.len() != before)
    }
}

//! Checks applied to a loaded configuration.
//!
//! Deserialisation already enforces types and enum values; these checks cover
//! the ranges and cross-field rules serde cannot express. The first failing
//! check is reported.

use std::collections::HashSet;

use blockbot_core::BotConfig;

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, ManagerConfig, RuntimeConfig, TelegramConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &RuntimeConfig) -> ConfigResult<()> {
    check_manager(&config.manager)?;
    check_logging(&config.logging)?;
    check_telegram(&config.telegram)?;
    check_bots(&config.bots)
}

fn positive(field: &str, value: u64) -> ConfigResult<()> {
    if value == 0 {
        return Err(ConfigError::invalid(field, "must be greater than 0"));
    }
    Ok(())
}

fn check_manager(manager: &ManagerConfig) -> ConfigResult<()> {
    positive("manager.close_timeout_ms", manager.close_timeout_ms)?;
    positive("manager.connect_timeout_ms", manager.connect_timeout_ms)?;
    positive("manager.event_buffer", manager.event_buffer as u64)
}

fn check_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::MissingField("logging.file_path".to_string()));
    }
    if logging.filters.keys().any(|target| target.trim().is_empty()) {
        return Err(ConfigError::invalid(
            "logging.filters",
            "filter targets must be module paths",
        ));
    }
    Ok(())
}

fn check_telegram(telegram: &TelegramConfig) -> ConfigResult<()> {
    let base = telegram.api_base.as_str();
    if base.is_empty() {
        return Err(ConfigError::MissingField("telegram.api_base".to_string()));
    }
    if !(base.starts_with("https://") || base.starts_with("http://")) {
        return Err(ConfigError::invalid(
            "telegram.api_base",
            format!("{base:?} is not an http(s) URL"),
        ));
    }
    positive("telegram.poll_timeout_secs", telegram.poll_timeout_secs)
}

fn check_bots(bots: &[BotConfig]) -> ConfigResult<()> {
    let mut ids = HashSet::new();

    for bot in bots {
        if bot.id.is_empty() {
            return Err(ConfigError::MissingField("bots[].id".to_string()));
        }
        if bot.id.chars().any(char::is_whitespace) {
            return Err(ConfigError::invalid(
                "bots[].id",
                format!("{:?} contains whitespace", bot.id),
            ));
        }
        if !ids.insert(bot.id.as_str()) {
            return Err(ConfigError::DuplicateBotId(bot.id.clone()));
        }
        if bot.token.is_empty() {
            return Err(ConfigError::MissingField(format!("bots.{}.token", bot.id)));
        }
    }
    Ok(())
}

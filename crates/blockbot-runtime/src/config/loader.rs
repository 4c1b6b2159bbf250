//! Layered configuration loading.
//!
//! Sources, lowest to highest priority:
//!
//! 1. built-in defaults
//! 2. the profile overlay next to the main file (`blockbot.{profile}.toml`)
//! 3. the main file (`blockbot.toml` or `config.toml`, YAML with `yaml-config`)
//! 4. `BLOCKBOT_*` environment variables, `__` separating nested keys
//! 5. values passed to [`ConfigLoader::merge`]
//!
//! `BLOCKBOT_PROFILE` picks the profile and `BLOCKBOT_CONFIG` names a file to
//! load instead of searching. Neither is mapped into the configuration.
//!
//! ```text
//! BLOCKBOT_LOGGING__LEVEL=debug             logging.level = "debug"
//! BLOCKBOT_MANAGER__CLOSE_TIMEOUT_MS=2000   manager.close_timeout_ms = 2000
//! BLOCKBOT_TELEGRAM__API_BASE=http://...    telegram.api_base = "http://..."
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "toml-config", feature = "yaml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, warn};

use super::schema::RuntimeConfig;
use super::validation::validate_config;
use crate::error::{ConfigError, ConfigResult};

const ENV_PREFIX: &str = "BLOCKBOT_";
const PROFILE_VAR: &str = "BLOCKBOT_PROFILE";
const FILE_VAR: &str = "BLOCKBOT_CONFIG";

/// File stems tried in every search directory, in order.
const FILE_STEMS: [&str; 2] = ["blockbot", "config"];

/// Name of a configuration profile, lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile(String);

impl Profile {
    pub const DEVELOPMENT: &'static str = "development";
    pub const PRODUCTION: &'static str = "production";

    /// Normalises `name`; `dev` and `prod` expand to their full names.
    pub fn new(name: &str) -> Self {
        let name = name.trim().to_lowercase();
        let name = match name.as_str() {
            "dev" | "" => Self::DEVELOPMENT.to_string(),
            "prod" => Self::PRODUCTION.to_string(),
            _ => name,
        };
        Self(name)
    }

    /// Reads `BLOCKBOT_PROFILE`.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|name| Self::new(&name))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self(Self::DEVELOPMENT.to_string())
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Toml,
    Yaml,
}

impl FileFormat {
    fn enabled() -> impl Iterator<Item = Self> {
        [Self::Toml, Self::Yaml]
            .into_iter()
            .filter(|format| format.is_enabled())
    }

    fn is_enabled(self) -> bool {
        match self {
            Self::Toml => cfg!(feature = "toml-config"),
            Self::Yaml => cfg!(feature = "yaml-config"),
        }
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Toml => &["toml"],
            Self::Yaml => &["yaml", "yml"],
        }
    }

    fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        [Self::Toml, Self::Yaml]
            .into_iter()
            .find(|format| format.extensions().contains(&ext))
    }

    #[allow(unused_variables)]
    fn merge_into(self, figment: Figment, path: &Path) -> ConfigResult<Figment> {
        match self {
            #[cfg(feature = "toml-config")]
            Self::Toml => Ok(figment.merge(Toml::file(path))),
            #[cfg(feature = "yaml-config")]
            Self::Yaml => Ok(figment.merge(Yaml::file(path))),
            #[allow(unreachable_patterns)]
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// A main file and the profile overlay found beside it.
#[derive(Debug, PartialEq, Eq)]
struct Discovered {
    overlay: Option<PathBuf>,
    main: PathBuf,
    format: FileFormat,
}

/// Builds a [`RuntimeConfig`] from defaults, files and the environment.
pub struct ConfigLoader {
    profile: Profile,
    dirs: Vec<PathBuf>,
    file: Option<PathBuf>,
    env: bool,
    overrides: Vec<RuntimeConfig>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader honouring `BLOCKBOT_PROFILE` and `BLOCKBOT_CONFIG`.
    pub fn new() -> Self {
        Self {
            profile: Profile::from_env(),
            dirs: Vec::new(),
            file: std::env::var_os(FILE_VAR).map(PathBuf::from),
            env: true,
            overrides: Vec::new(),
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::new(profile.as_ref());
        self
    }

    /// Adds a directory to search. Without any, the current directory and
    /// `<config dir>/blockbot` are searched.
    pub fn search_path(mut self, dir: impl AsRef<Path>) -> Self {
        self.dirs.push(dir.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.
    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Ignores `BLOCKBOT_*` variables other than the profile and file ones.
    pub fn without_env(mut self) -> Self {
        self.env = false;
        self
    }

    /// Layers `config` above every other source.
    pub fn merge(mut self, config: RuntimeConfig) -> Self {
        self.overrides.push(config);
        self
    }

    /// Loads, extracts and validates the configuration.
    pub fn load(self) -> ConfigResult<RuntimeConfig> {
        let config: RuntimeConfig = self.figment()?.extract()?;
        validate_config(&config)?;

        debug!(
            profile = %self.profile,
            level = %config.logging.level,
            bots = config.bots.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn figment(&self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(RuntimeConfig::default()));

        match &self.file {
            Some(path) => {
                if !path.is_file() {
                    return Err(ConfigError::FileNotFound(path.clone()));
                }
                let format = FileFormat::of(path)
                    .ok_or_else(|| ConfigError::UnsupportedFormat(path.clone()))?;
                info!(path = %path.display(), "Loading configuration file");
                figment = format.merge_into(figment, path)?;
            }
            None => match self.discover() {
                Some(found) => {
                    if let Some(overlay) = &found.overlay {
                        debug!(path = %overlay.display(), profile = %self.profile, "Loading profile overlay");
                        figment = found.format.merge_into(figment, overlay)?;
                    }
                    info!(path = %found.main.display(), "Loading configuration file");
                    figment = found.format.merge_into(figment, &found.main)?;
                }
                None => warn!(dirs = ?self.search_dirs(), "No configuration file found, using defaults"),
            },
        }

        if self.env {
            figment = figment.merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(&["PROFILE", "CONFIG"])
                    .split("__"),
            );
        }
        for config in &self.overrides {
            figment = figment.merge(Serialized::defaults(config));
        }
        Ok(figment)
    }

    fn search_dirs(&self) -> Vec<PathBuf> {
        if !self.dirs.is_empty() {
            return self.dirs.clone();
        }
        std::env::current_dir()
            .ok()
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join("blockbot")))
            .collect()
    }

    /// First main file in search order: directory, then stem, then format.
    fn discover(&self) -> Option<Discovered> {
        for dir in self.search_dirs() {
            for stem in FILE_STEMS {
                for format in FileFormat::enabled() {
                    for ext in format.extensions() {
                        let main = dir.join(format!("{stem}.{ext}"));
                        if !main.is_file() {
                            continue;
                        }
                        let overlay = dir.join(format!("{stem}.{}.{ext}", self.profile));
                        return Some(Discovered {
                            overlay: overlay.is_file().then_some(overlay),
                            main,
                            format,
                        });
                    }
                }
            }
        }
        None
    }
}

/// Loads the configuration from the default locations.
pub fn load_config() -> ConfigResult<RuntimeConfig> {
    ConfigLoader::new().load()
}

/// Loads the configuration from one file, with environment overrides.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<RuntimeConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(all(test, feature = "toml-config"))]
mod tests {
    use super::*;
    use crate::config::LogLevel;
    use blockbot_core::BlockKind;
    use figment::Jail;

    fn load_in(jail: &Jail) -> figment::error::Result<RuntimeConfig> {
        ConfigLoader::new()
            .search_path(jail.directory())
            .load()
            .map_err(|e| e.to_string().into())
    }

    #[test]
    fn test_defaults_without_files() {
        Jail::expect_with(|jail| {
            let config = load_in(jail)?;
            assert_eq!(config.logging.level, LogLevel::Info);
            assert_eq!(config.manager.event_buffer, 256);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "blockbot.toml",
                r#"
                [manager]
                close_timeout_ms = 1000

                [logging]
                level = "debug"

                [[bots]]
                id = "echo"
                name = "Echo"
                token = "123:abc"
                blocks = [{ id = "b1", type = "message", data = { response = "Echo" } }]
                "#,
            )?;
            jail.set_env("BLOCKBOT_MANAGER__CLOSE_TIMEOUT_MS", "750");

            let config = load_in(jail)?;
            assert_eq!(config.manager.close_timeout_ms, 750);
            assert_eq!(config.logging.level, LogLevel::Debug);
            assert_eq!(config.bots.len(), 1);
            assert_eq!(config.bots[0].blocks[0].kind, BlockKind::Message);
            Ok(())
        });
    }

    #[test]
    fn test_main_file_wins_over_profile_overlay() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "blockbot.production.toml",
                "[manager]\nevent_buffer = 8\nconnect_timeout_ms = 50\n",
            )?;
            jail.create_file("blockbot.toml", "[manager]\nconnect_timeout_ms = 99\n")?;

            let config = ConfigLoader::new()
                .profile("prod")
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.manager.event_buffer, 8);
            assert_eq!(config.manager.connect_timeout_ms, 99);
            Ok(())
        });
    }

    #[test]
    fn test_overlay_without_main_file_is_ignored() {
        Jail::expect_with(|jail| {
            jail.create_file("config.development.toml", "[manager]\nevent_buffer = 3\n")?;
            let config = load_in(jail)?;
            assert_eq!(config.manager.event_buffer, 256);
            Ok(())
        });
    }

    #[test]
    fn test_config_file_variable() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "[telegram]\npoll_timeout_secs = 5\n")?;
            jail.set_env("BLOCKBOT_CONFIG", jail.directory().join("custom.toml").display());

            let config = ConfigLoader::new()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.telegram.poll_timeout_secs, 5);
            Ok(())
        });
    }

    #[test]
    fn test_merge_beats_env() {
        Jail::expect_with(|jail| {
            jail.set_env("BLOCKBOT_MANAGER__EVENT_BUFFER", "16");
            let mut config = RuntimeConfig::default();
            config.manager.event_buffer = 32;

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .merge(config)
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.manager.event_buffer, 32);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("blockbot.toml", "[manager]\nevent_buffer = 0\n")?;
            let result = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load();
            assert!(matches!(result, Err(ConfigError::Invalid { .. })));
            Ok(())
        });
    }

    #[test]
    fn test_explicit_file_errors() {
        let result = ConfigLoader::new().file("/nonexistent/blockbot.toml").load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));

        Jail::expect_with(|jail| {
            jail.create_file("blockbot.ini", "")?;
            let result = ConfigLoader::new().file(jail.directory().join("blockbot.ini")).load();
            assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
            Ok(())
        });
    }

    #[test]
    fn test_profile_names() {
        assert_eq!(Profile::new("PROD").as_str(), Profile::PRODUCTION);
        assert_eq!(Profile::new(" dev ").as_str(), Profile::DEVELOPMENT);
        assert_eq!(Profile::new("Staging").as_str(), "staging");
    }
}

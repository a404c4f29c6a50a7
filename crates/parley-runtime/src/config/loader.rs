//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: enables `parley.toml`
//! - `yaml-config`: enables `parley.yaml` / `parley.yml`
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific file (`parley.{profile}.toml`)
//! 3. Main file (`parley.toml`)
//! 4. Environment variables (`PARLEY_*`)
//! 5. Programmatic overrides passed to [`ConfigLoader::merge`]
//!
//! # Environment Variable Mapping
//!
//! Nested keys are separated by `__`:
//!
//! - `PARLEY_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `PARLEY_SESSION__TTL_SECS=3600` → `session.ttl_secs = 3600`
//!
//! # Example
//!
//! ```rust,ignore
//! use parley_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .file("./deploy/parley.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::ParleyConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "PARLEY_";
const PROFILE_VAR: &str = "PARLEY_PROFILE";
const APP_DIR: &str = "parley";

/// Configuration profile, selecting an optional `parley.{profile}.*` file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    /// Returns the profile name as used in file names.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; `prod` and `dev` are accepted as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `PARLEY_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|name| Self::parse(&name))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layered configuration loader.
pub struct ConfigLoader {
    /// Programmatic overrides, merged last.
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Explicit file; disables the search.
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search for configuration files.
    ///
    /// When no search path is added, the current directory and the user's
    /// `parley` config directory are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching. A missing file is an error.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Enables `PARLEY_*` environment variables (the default).
    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    /// Ignores environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a configuration on top of every other source.
    pub fn merge(mut self, config: ParleyConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Loads, extracts and validates the configuration.
    pub fn load(self) -> ConfigResult<ParleyConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: ParleyConfig = figment.extract()?;
        validate_config(&config)?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            session_ttl_secs = config.session.ttl_secs,
            "configuration loaded"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(ParleyConfig::default()));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            info!(path = %path.display(), "loading configuration file");
            figment = merge_config_file(figment, &path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        let overrides = std::mem::take(&mut self.overrides);
        Ok(figment.merge(overrides))
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }

        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join(APP_DIR));
        }
        paths
    }

    /// Searches `search_paths × base_names`, merging a profile-specific
    /// variant before the base file. Stops at the first base file found.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files<F>(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: F,
    ) -> (Figment, bool)
    where
        F: Fn(Figment, &Path) -> Figment,
    {
        for search_path in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };

                let profile_path =
                    search_path.join(format!("{stem}.{}.{ext}", self.profile.as_str()));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "loading profile configuration");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = search_path.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "loading configuration file");
                    return (merge_fn(figment, &base_path), true);
                }
            }
        }
        (figment, false)
    }

    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) =
                self.load_format_files(figment, &search_paths, &["parley.toml"], |fig, path| {
                    fig.merge(Toml::file(path))
                });
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["parley.yaml", "parley.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!("no configuration file found, using defaults");
        }
        figment
    }
}

/// Merges one file, dispatching on its extension.
#[cfg_attr(
    not(any(feature = "toml-config", feature = "yaml-config")),
    allow(unused_variables)
)]
fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// Loads configuration from the default locations and the environment.
pub fn load_config() -> ConfigResult<ParleyConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path` and the environment.
pub fn load_config_from_file(path: impl AsRef<Path>) -> ConfigResult<ParleyConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{LogLevel, SessionConfig};
    use parley_framework::FailurePolicy;

    fn empty_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    #[test]
    fn test_defaults_without_files() {
        let dir = empty_dir();
        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(config, ParleyConfig::default());
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = empty_dir();
        let err = ConfigLoader::new()
            .file(dir.path().join("nope.toml"))
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = empty_dir();
        let path = dir.path().join("parley.ini");
        std::fs::write(&path, "").unwrap();

        let err = ConfigLoader::new()
            .file(&path)
            .without_env()
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "ini"));
    }

    #[test]
    fn test_merge_overrides_defaults() {
        let dir = empty_dir();
        let config = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .merge(ParleyConfig {
                session: SessionConfig {
                    ttl_secs: 5,
                    policy: FailurePolicy::Permissive,
                    ..Default::default()
                },
                ..Default::default()
            })
            .load()
            .unwrap();

        assert_eq!(config.session.ttl_secs, 5);
        assert_eq!(config.session.policy, FailurePolicy::Permissive);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let dir = empty_dir();
        let err = ConfigLoader::new()
            .search_path(dir.path())
            .without_env()
            .merge(ParleyConfig {
                session: SessionConfig {
                    sweep_interval_secs: 0,
                    ..Default::default()
                },
                ..Default::default()
            })
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_searched_toml_with_profile() {
        let dir = empty_dir();
        std::fs::write(
            dir.path().join("parley.toml"),
            "[session]\nttl_secs = 120\nkey_prefix = \"chat\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("parley.production.toml"),
            "[logging]\nlevel = \"warn\"\n[session]\nttl_secs = 60\n",
        )
        .unwrap();

        let config = ConfigLoader::new()
            .profile("prod")
            .search_path(dir.path())
            .without_env()
            .load()
            .unwrap();

        // The base file is merged after the profile file.
        assert_eq!(config.session.ttl_secs, 120);
        assert_eq!(config.session.key_prefix, "chat");
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_malformed_toml() {
        let dir = empty_dir();
        let path = dir.path().join("parley.toml");
        std::fs::write(&path, "[session\nttl_secs = ").unwrap();

        let err = load_config_from_file_without_env(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[cfg(feature = "toml-config")]
    fn load_config_from_file_without_env(path: &Path) -> ConfigResult<ParleyConfig> {
        ConfigLoader::new().file(path).without_env().load()
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging").as_str(), "staging");
    }
}

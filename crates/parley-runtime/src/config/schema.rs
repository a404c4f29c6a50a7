//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parley_framework::session::{
    DEFAULT_KEY_PREFIX, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL, FailurePolicy, MemoryStore,
    SessionData, SessionManagerBuilder,
};
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParleyConfig {
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Session middleware settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Update dispatch settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the lowercase directive name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line format of log output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    #[cfg(feature = "json-log")]
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Append to `LoggingConfig::file_path`.
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level; `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, used when `output` is `file`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids in each line.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line in each line.
    #[serde(default)]
    pub file_location: bool,

    /// Per-target level overrides, e.g. `parley_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            filters: HashMap::new(),
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Session middleware configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Lifetime of a stored session, refreshed on every write.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Interval of the in-memory store's expiry sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Prefix of the per-user store key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    #[serde(default)]
    pub policy: FailurePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            key_prefix: default_key_prefix(),
            policy: FailurePolicy::default(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL.as_secs()
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Builds an in-memory store sweeping at the configured interval.
    pub fn memory_store(&self) -> MemoryStore {
        MemoryStore::with_sweep(self.sweep_interval())
    }

    /// Applies every session setting to a builder, including an in-memory
    /// store with the configured sweep. Set a custom store afterwards to
    /// replace it.
    pub fn apply<T: SessionData>(
        &self,
        builder: SessionManagerBuilder<T>,
    ) -> SessionManagerBuilder<T> {
        builder
            .store(Arc::new(self.memory_store()))
            .ttl(self.ttl())
            .key_prefix(self.key_prefix.clone())
            .policy(self.policy)
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Dispatcher configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// How long `shutdown` waits for in-flight updates.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

impl DispatchConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ParleyConfig::default();
        assert_eq!(config.session.ttl_secs, 86_400);
        assert_eq!(config.session.sweep_interval_secs, 60);
        assert_eq!(config.session.key_prefix, "session");
        assert_eq!(config.session.policy, FailurePolicy::Strict);
        assert_eq!(config.dispatch.shutdown_timeout(), Duration::from_secs(10));
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: ParleyConfig = serde_json::from_value(serde_json::json!({
            "session": { "ttl_secs": 30, "policy": "permissive" },
            "logging": { "level": "debug", "filters": { "parley_framework": "trace" } }
        }))
        .unwrap();

        assert_eq!(config.session.ttl(), Duration::from_secs(30));
        assert_eq!(config.session.policy, FailurePolicy::Permissive);
        assert_eq!(config.session.key_prefix, "session");
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(
            config.logging.filters.get("parley_framework"),
            Some(&LogLevel::Trace)
        );
        assert_eq!(config.dispatch, DispatchConfig::default());
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Warn.as_str(), "warn");
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(LogLevel::Error.to_string(), "error");
    }
}

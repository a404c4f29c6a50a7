//! Configuration for the Parley runtime.
//!
//! Settings are layered with figment: built-in defaults, then a
//! `parley.toml`/`parley.yaml` file, then `PARLEY_*` environment variables,
//! then programmatic overrides.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    DispatchConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, ParleyConfig, SessionConfig,
    SpanEventConfig,
};
pub use validation::validate_config;

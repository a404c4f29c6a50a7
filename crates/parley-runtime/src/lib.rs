//! Parley Runtime - configuration, logging and update dispatch.
//!
//! This crate provides:
//! - Layered configuration ([`ConfigLoader`], [`ParleyConfig`])
//! - Subscriber setup for `tracing` ([`LoggingBuilder`])
//! - Concurrent dispatch with graceful shutdown ([`Dispatcher`])
//!
//! ```rust,ignore
//! use parley_runtime::{Dispatcher, config, logging, wait_for_signal};
//!
//! let config = config::load_config()?;
//! logging::init_from_config(&config.logging);
//!
//! let dispatcher = Dispatcher::new(router, bot).with_config(&config.dispatch);
//! tokio::select! {
//!     () = dispatcher.run(updates) => {}
//!     _ = wait_for_signal() => {}
//! }
//! dispatcher.shutdown().await?;
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, DispatchConfig, LoggingConfig, ParleyConfig,
    SessionConfig,
};
pub use dispatcher::{Dispatcher, wait_for_signal};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for application code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}

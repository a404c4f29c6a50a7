//! Configuration validation.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, ParleyConfig, SessionConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &ParleyConfig) -> ConfigResult<()> {
    validate_logging(&config.logging)?;
    validate_session(&config.session)?;
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is \"file\"",
        ));
    }
    Ok(())
}

fn validate_session(session: &SessionConfig) -> ConfigResult<()> {
    if session.ttl_secs == 0 {
        return Err(ConfigError::validation(
            "session.ttl_secs must be greater than 0",
        ));
    }

    if session.sweep_interval_secs == 0 {
        return Err(ConfigError::validation(
            "session.sweep_interval_secs must be greater than 0",
        ));
    }

    if session.key_prefix.is_empty() {
        return Err(ConfigError::validation("session.key_prefix must not be empty"));
    }

    Ok(())
}

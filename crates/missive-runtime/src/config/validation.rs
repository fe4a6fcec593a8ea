//! Checks that cannot be expressed in the schema types.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LogOutput, LoggingConfig, MissiveConfig};

/// Validates a fully merged configuration.
pub fn validate_config(config: &MissiveConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::invalid(
            "logging.file_path",
            "required when logging.output is \"file\"",
        ));
    }

    if logging.max_files == 0 {
        return Err(ConfigError::invalid("logging.max_files", "must be greater than 0"));
    }

    let blank = logging.filters.keys().find(|m| m.trim().is_empty());
    if let Some(module) = blank {
        return Err(ConfigError::invalid(
            "logging.filters",
            format!("empty module name {module:?}"),
        ));
    }

    Ok(())
}

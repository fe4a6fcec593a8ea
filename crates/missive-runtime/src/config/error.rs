//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating a [`MissiveConfig`](super::MissiveConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A file given to [`ConfigLoader::file`](super::ConfigLoader::file)
    /// does not exist.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// The extension is not one of `toml`, `yaml` or `yml`, or the feature
    /// for that format is disabled.
    #[error("Cannot read configuration file {path}: unsupported format")]
    UnsupportedFormat { path: PathBuf },

    /// The merged sources do not deserialize into the schema, e.g. a
    /// malformed file or an unknown enum value.
    #[error("Failed to extract configuration: {0}")]
    Extract(#[from] Box<figment::Error>),

    /// A value parsed but is not usable.
    #[error("Invalid `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Box::new(err).into()
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

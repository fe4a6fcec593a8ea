//! Configuration module for the Missive runtime.
//!
//! This module provides layered configuration loading (files, environment,
//! programmatic overrides) and validation for logging and dispatch settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    DispatchConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, MissiveConfig,
    SpanEventConfig,
};
pub use validation::validate_config;

//! Runtime error types.

use missive_core::DispatchError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while composing a mediator.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The registrations are inconsistent, e.g. a request shape has more
    /// than one handler.
    #[error("Invalid registration: {0}")]
    Registration(#[from] DispatchError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

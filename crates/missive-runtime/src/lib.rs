//! Missive Runtime - composition root, configuration and logging.
//!
//! This crate provides:
//! - Mediator composition ([`MediatorBuilder`])
//! - Layered configuration loading ([`config`])
//! - Logging setup on top of `tracing-subscriber` ([`logging`])
//!
//! ```rust,ignore
//! use missive_runtime::{ConfigLoader, MediatorBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mediator = MediatorBuilder::new()
//!         .load_config(ConfigLoader::new())?
//!         .init_logging()
//!         .request_handler::<CreateOrder, _, _>(|_| CreateOrderHandler)
//!         .build()?;
//!
//!     let created = mediator
//!         .send(CreateOrder { id: 7 }, &CancellationToken::new())
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod logging;

// Re-exports
pub use builder::MediatorBuilder;
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, DispatchConfig, LoggingConfig, MissiveConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}

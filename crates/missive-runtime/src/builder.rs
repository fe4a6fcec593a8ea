//! Composition root for a [`Mediator`].
//!
//! [`MediatorBuilder`] collects handler and behavior registrations together
//! with a [`MissiveConfig`], optionally installs logging, validates the
//! registrations and hands back a ready-to-use mediator.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use missive_runtime::MediatorBuilder;
//!
//! let mediator = MediatorBuilder::new()
//!     .load_config(ConfigLoader::new())?
//!     .init_logging()
//!     .behavior::<CreateOrder, _, _>(|_| LoggingBehavior)
//!     .request_handler::<CreateOrder, _, _>(|_| CreateOrderHandler)
//!     .notification_handler::<OrderPlaced, _, _>(|_| SendReceipt)
//!     .build()?;
//! ```

use missive_core::{
    CallScope, Mediator, Notification, NotificationHandler, OpenBehavior, PipelineBehavior,
    Registry, Request, RequestHandler, ResponseBehavior,
};
use tracing::info;

use crate::config::{ConfigLoader, MissiveConfig};
use crate::error::RuntimeResult;
use crate::logging;

/// Builder for a [`Mediator`].
///
/// Behaviors are applied in the order they are registered here, across all
/// three behavior kinds: the first registered behavior is the outermost link
/// of every chain it applies to.
#[derive(Debug, Default)]
pub struct MediatorBuilder {
    registry: Registry,
    config: MissiveConfig,
    init_logging: bool,
}

impl MediatorBuilder {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `config` instead of the default configuration.
    pub fn config(mut self, config: MissiveConfig) -> Self {
        self.config = config;
        self
    }

    /// Loads the configuration with `loader`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Config`](crate::RuntimeError::Config) if the
    /// configuration cannot be loaded or is invalid.
    pub fn load_config(self, loader: ConfigLoader) -> RuntimeResult<Self> {
        Ok(self.config(loader.load()?))
    }

    /// Installs a global `tracing` subscriber from the logging configuration
    /// when [`build`](Self::build) runs.
    pub fn init_logging(mut self) -> Self {
        self.init_logging = true;
        self
    }

    /// Returns the configuration in use.
    pub fn current_config(&self) -> &MissiveConfig {
        &self.config
    }

    /// Returns the registrations collected so far.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // ------------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------------

    /// Registers a request handler created per call by `factory`.
    pub fn request_handler<R, H, F>(mut self, factory: F) -> Self
    where
        R: Request,
        H: RequestHandler<R>,
        F: Fn(&CallScope) -> H + Send + Sync + 'static,
    {
        self.registry.register_request_handler::<R, H, F>(factory);
        self
    }

    /// Registers a request handler instance shared by every call.
    pub fn request_handler_instance<R, H>(mut self, handler: H) -> Self
    where
        R: Request,
        H: RequestHandler<R>,
    {
        self.registry
            .register_request_handler_instance::<R, H>(handler);
        self
    }

    /// Registers a notification handler created per call by `factory`.
    pub fn notification_handler<N, H, F>(mut self, factory: F) -> Self
    where
        N: Notification,
        H: NotificationHandler<N>,
        F: Fn(&CallScope) -> H + Send + Sync + 'static,
    {
        self.registry
            .register_notification_handler::<N, H, F>(factory);
        self
    }

    /// Registers a notification handler instance shared by every call.
    pub fn notification_handler_instance<N, H>(mut self, handler: H) -> Self
    where
        N: Notification,
        H: NotificationHandler<N>,
    {
        self.registry
            .register_notification_handler_instance::<N, H>(handler);
        self
    }

    // ------------------------------------------------------------------------
    // Behaviors
    // ------------------------------------------------------------------------

    /// Registers a behavior for the request shape `R`, created per call.
    pub fn behavior<R, B, F>(mut self, factory: F) -> Self
    where
        R: Request,
        B: PipelineBehavior<R>,
        F: Fn(&CallScope) -> B + Send + Sync + 'static,
    {
        self.registry.register_behavior::<R, B, F>(factory);
        self
    }

    /// Registers a behavior instance for the request shape `R`.
    pub fn behavior_instance<R, B>(mut self, behavior: B) -> Self
    where
        R: Request,
        B: PipelineBehavior<R>,
    {
        self.registry.register_behavior_instance::<R, B>(behavior);
        self
    }

    /// Registers a behavior for every request responding with `T`, created
    /// per call.
    pub fn response_behavior<T, B, F>(mut self, factory: F) -> Self
    where
        T: Send + 'static,
        B: ResponseBehavior<T>,
        F: Fn(&CallScope) -> B + Send + Sync + 'static,
    {
        self.registry.register_response_behavior::<T, B, F>(factory);
        self
    }

    /// Registers a behavior instance for every request responding with `T`.
    pub fn response_behavior_instance<T, B>(mut self, behavior: B) -> Self
    where
        T: Send + 'static,
        B: ResponseBehavior<T>,
    {
        self.registry
            .register_response_behavior_instance::<T, B>(behavior);
        self
    }

    /// Registers a behavior for every request, created per call.
    pub fn open_behavior<B, F>(mut self, factory: F) -> Self
    where
        B: OpenBehavior,
        F: Fn(&CallScope) -> B + Send + Sync + 'static,
    {
        self.registry.register_open_behavior::<B, F>(factory);
        self
    }

    /// Registers a behavior instance for every request.
    pub fn open_behavior_instance<B: OpenBehavior>(mut self, behavior: B) -> Self {
        self.registry.register_open_behavior_instance::<B>(behavior);
        self
    }

    // ------------------------------------------------------------------------
    // Build
    // ------------------------------------------------------------------------

    /// Finishes composition and returns the mediator.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Registration`](crate::RuntimeError::Registration)
    /// if `dispatch.validate_on_build` is set and a request shape has more
    /// than one handler.
    pub fn build(self) -> RuntimeResult<Mediator> {
        if self.init_logging {
            logging::init_from_config(&self.config.logging);
        }

        if self.config.dispatch.validate_on_build {
            self.registry.validate()?;
        }

        if self.config.dispatch.log_registrations {
            self.log_registrations();
        }

        info!(
            requests = self.registry.handlers().request_summaries().len(),
            notifications = self.registry.handlers().notification_summaries().len(),
            behaviors = self.registry.behaviors().len(),
            "Mediator ready"
        );

        Ok(Mediator::new(self.registry))
    }

    fn log_registrations(&self) {
        let handlers = self.registry.handlers();

        for summary in handlers.request_summaries() {
            info!(
                request = summary.shape.name(),
                response = summary.response.map_or("()", |shape| shape.name()),
                handlers = ?summary.handlers,
                "Request registration"
            );
        }

        for summary in handlers.notification_summaries() {
            info!(
                notification = summary.shape.name(),
                handlers = ?summary.handlers,
                "Notification registration"
            );
        }

        for summary in self.registry.behaviors().summaries() {
            info!(
                position = summary.position,
                behavior = summary.name,
                kind = %summary.kind,
                target = summary.target,
                "Behavior registration"
            );
        }
    }
}

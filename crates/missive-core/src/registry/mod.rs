//! Handler and behavior registries.
//!
//! The [`Registry`] is assembled once by the composition root and is
//! read-only afterwards. It never caches handler or behavior *instances*:
//! every dispatch call invokes the registered factories with its own
//! [`CallScope`], so the composition root decides whether an instance is
//! shared (`*_instance` registrations) or created per call.
//!
//! - [`HandlerRegistry`] - request handlers (exactly one per shape) and
//!   notification handlers (any number per shape, ordered)
//! - [`BehaviorRegistry`] - pipeline behaviors, ordered across the specific,
//!   per-response-type and open registration kinds

mod behaviors;
mod handlers;

use std::sync::Arc;

pub use behaviors::{BehaviorKind, BehaviorRegistry, BehaviorSummary, ResolvedBehavior};
pub use handlers::{HandlerRegistry, HandlerSummary, ResolvedHandler, ResolvedNotificationHandler};

use crate::error::DispatchResult;
use crate::handler::{
    NotificationHandler, OpenBehavior, PipelineBehavior, RequestHandler, ResponseBehavior,
};
use crate::message::{Notification, Request};
use crate::scope::CallScope;

/// A type-erased factory producing a shared instance for one call.
pub(crate) type Factory<T> = Arc<dyn Fn(&CallScope) -> Arc<T> + Send + Sync>;

/// The complete registration surface consumed by the
/// [`Mediator`](crate::Mediator).
///
/// # Example
///
/// ```rust,ignore
/// let mut registry = Registry::new();
/// registry
///     .register_behavior::<CreateOrder, _, _>(|_| LoggingBehavior)
///     .register_behavior::<CreateOrder, _, _>(|_| ValidationBehavior)
///     .register_request_handler::<CreateOrder, _, _>(|_| CreateOrderHandler);
/// registry.validate()?;
/// ```
#[derive(Debug, Default)]
pub struct Registry {
    handlers: HandlerRegistry,
    behaviors: BehaviorRegistry,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handler registry.
    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Returns the behavior registry.
    pub fn behaviors(&self) -> &BehaviorRegistry {
        &self.behaviors
    }

    /// Checks that every request shape has exactly one handler.
    pub fn validate(&self) -> DispatchResult<()> {
        self.handlers.validate()
    }

    // ------------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------------

    /// Registers a request handler created per call by `factory`.
    pub fn register_request_handler<R, H, F>(&mut self, factory: F) -> &mut Self
    where
        R: Request,
        H: RequestHandler<R>,
        F: Fn(&CallScope) -> H + Send + Sync + 'static,
    {
        self.handlers.register_request_handler::<R, H, F>(factory);
        self
    }

    /// Registers a request handler instance shared by every call.
    pub fn register_request_handler_instance<R, H>(&mut self, handler: H) -> &mut Self
    where
        R: Request,
        H: RequestHandler<R>,
    {
        self.handlers
            .register_request_handler_instance::<R, H>(handler);
        self
    }

    /// Registers a notification handler created per call by `factory`.
    pub fn register_notification_handler<N, H, F>(&mut self, factory: F) -> &mut Self
    where
        N: Notification,
        H: NotificationHandler<N>,
        F: Fn(&CallScope) -> H + Send + Sync + 'static,
    {
        self.handlers
            .register_notification_handler::<N, H, F>(factory);
        self
    }

    /// Registers a notification handler instance shared by every call.
    pub fn register_notification_handler_instance<N, H>(&mut self, handler: H) -> &mut Self
    where
        N: Notification,
        H: NotificationHandler<N>,
    {
        self.handlers
            .register_notification_handler_instance::<N, H>(handler);
        self
    }

    // ------------------------------------------------------------------------
    // Behaviors
    // ------------------------------------------------------------------------

    /// Registers a behavior for the request shape `R`, created per call.
    pub fn register_behavior<R, B, F>(&mut self, factory: F) -> &mut Self
    where
        R: Request,
        B: PipelineBehavior<R>,
        F: Fn(&CallScope) -> B + Send + Sync + 'static,
    {
        self.behaviors.register::<R, B, F>(factory);
        self
    }

    /// Registers a behavior instance for the request shape `R`.
    pub fn register_behavior_instance<R, B>(&mut self, behavior: B) -> &mut Self
    where
        R: Request,
        B: PipelineBehavior<R>,
    {
        self.behaviors.register_instance::<R, B>(behavior);
        self
    }

    /// Registers a behavior for every request responding with `T`, created
    /// per call.
    pub fn register_response_behavior<T, B, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + 'static,
        B: ResponseBehavior<T>,
        F: Fn(&CallScope) -> B + Send + Sync + 'static,
    {
        self.behaviors.register_for_response::<T, B, F>(factory);
        self
    }

    /// Registers a behavior instance for every request responding with `T`.
    pub fn register_response_behavior_instance<T, B>(&mut self, behavior: B) -> &mut Self
    where
        T: Send + 'static,
        B: ResponseBehavior<T>,
    {
        self.behaviors
            .register_for_response_instance::<T, B>(behavior);
        self
    }

    /// Registers a behavior for every request, created per call.
    pub fn register_open_behavior<B, F>(&mut self, factory: F) -> &mut Self
    where
        B: OpenBehavior,
        F: Fn(&CallScope) -> B + Send + Sync + 'static,
    {
        self.behaviors.register_open::<B, F>(factory);
        self
    }

    /// Registers a behavior instance for every request.
    pub fn register_open_behavior_instance<B>(&mut self, behavior: B) -> &mut Self
    where
        B: OpenBehavior,
    {
        self.behaviors.register_open_instance::<B>(behavior);
        self
    }
}

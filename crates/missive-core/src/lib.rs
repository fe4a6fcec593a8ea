//! # Missive Core
//!
//! The in-process dispatch engine of the Missive mediator.
//!
//! This crate routes a typed request to exactly one registered handler,
//! optionally through an ordered chain of pipeline behaviors, and fans a
//! notification out to any number of independent handlers.
//!
//! ## Building Blocks
//!
//! - **Messages**: [`Request`] and [`Notification`] values, identified at
//!   runtime by their [`Shape`]
//! - **Contracts**: [`RequestHandler`], [`NotificationHandler`] and the three
//!   behavior flavours ([`PipelineBehavior`], [`ResponseBehavior`],
//!   [`OpenBehavior`])
//! - **Registry**: the read-only lookup tables built at composition time
//!   ([`Registry`])
//! - **Pipeline**: the per-call chain of behaviors around the handler
//!   ([`Next`], [`build_chain`])
//! - **Dispatcher**: the public entry point ([`Mediator`])
//! - **Tower Integration**: [`SendService`] and [`PublishService`]
//!
//! ## Request Flow
//!
//! ```text
//!              ┌──────────┐   ┌─────────────────────────────────────────┐
//! send(req) ──▶│ Mediator │──▶│ B1 ──▶ B2 ──▶ … ──▶ Bn ──▶ Handler      │
//!              └──────────┘   └─────────────────────────────────────────┘
//!                    │
//! publish(n) ────────┴───────▶ N1 ║ N2 ║ N3   (polled concurrently)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use missive_core::{BoxError, Mediator, Registry, Request, RequestHandler};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Ping;
//!
//! impl Request for Ping {
//!     type Response = &'static str;
//! }
//!
//! struct PingHandler;
//!
//! #[async_trait::async_trait]
//! impl RequestHandler<Ping> for PingHandler {
//!     async fn handle(&self, _: &Ping, _: &CancellationToken) -> Result<&'static str, BoxError> {
//!         Ok("pong")
//!     }
//! }
//!
//! let mut registry = Registry::new();
//! registry.register_request_handler::<Ping, _, _>(|_| PingHandler);
//!
//! let mediator = Mediator::new(registry);
//! let pong = mediator.send(Ping, &CancellationToken::new()).await?;
//! ```

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod message;
pub mod pipeline;
pub mod registry;
pub mod scope;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::Mediator;
pub use error::{
    AggregateFailure, BoxError, DispatchError, DispatchResult, HandlerFailure, ResponseTypeMismatch,
};
pub use handler::{
    NotificationHandler, OpenBehavior, PipelineBehavior, RequestHandler, ResponseBehavior,
};
pub use message::{ErasedResponse, Notification, Request, RequestView, Shape};
pub use pipeline::{Next, build_chain};
pub use registry::{
    BehaviorKind, BehaviorRegistry, BehaviorSummary, HandlerRegistry, HandlerSummary, Registry,
    ResolvedBehavior, ResolvedHandler, ResolvedNotificationHandler,
};
pub use scope::CallScope;
pub use service::{PublishService, SendService};

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;

/// Prelude for common imports.
pub mod prelude {
    pub use super::{
        BoxError, CancellationToken, DispatchError, Mediator, Next, Notification,
        NotificationHandler, OpenBehavior, PipelineBehavior, Registry, Request, RequestHandler,
        RequestView, ResponseBehavior, async_trait,
    };
}

//! The public dispatch entry point.
//!
//! [`Mediator`] exposes three operations:
//!
//! - [`send`](Mediator::send) - routes a request through its behaviors to its
//!   single handler and returns the handler's response
//! - [`send_void`](Mediator::send_void) - the same, for requests without a
//!   response
//! - [`publish`](Mediator::publish) - hands a notification to every registered
//!   handler concurrently and waits for all of them to settle
//!
//! A `send` call is strictly sequential: the chain runs as nested calls on the
//! caller's task. `publish` is the only point of concurrency, and it polls the
//! handlers on the caller's task too, without spawning.

use std::sync::Arc;

use futures::future;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, trace, trace_span, warn};

use crate::error::{AggregateFailure, DispatchError, DispatchResult, HandlerFailure};
use crate::message::{Notification, Request, Shape};
use crate::pipeline::build_chain;
use crate::registry::Registry;
use crate::scope::CallScope;
use crate::service::{PublishService, SendService};

/// Dispatches requests and notifications against a [`Registry`].
///
/// The registry is shared and read-only; cloning a `Mediator` is cheap and
/// every clone dispatches against the same registrations.
#[derive(Debug, Clone)]
pub struct Mediator {
    registry: Arc<Registry>,
}

impl Mediator {
    /// Creates a mediator owning `registry`.
    pub fn new(registry: Registry) -> Self {
        Self::from_arc(Arc::new(registry))
    }

    /// Creates a mediator over an already shared registry.
    pub fn from_arc(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Returns the registry this mediator dispatches against.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Sends a request to its handler and returns the response.
    ///
    /// Resolves the single handler registered for `R` and every behavior
    /// applicable to `R`, builds the chain and runs it. Nothing is retried
    /// and no timeout is imposed; `cancel` is handed to every link.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::HandlerNotFound`] / [`DispatchError::HandlerAmbiguity`]
    ///   if `R` does not have exactly one handler; no behavior runs
    /// - [`DispatchError::Invocation`] carrying the unchanged error of the
    ///   failing handler or behavior
    pub async fn send<R: Request>(
        &self,
        request: R,
        cancel: &CancellationToken,
    ) -> DispatchResult<R::Response> {
        let span = debug_span!("send", request = R::name());

        async move {
            let scope = CallScope::open(Shape::of_request::<R>());
            let handler = self
                .registry
                .handlers()
                .resolve_request_handler::<R>(&scope)?;
            let behaviors = self.registry.behaviors().resolve::<R>(&scope);

            trace!(
                handler = handler.name(),
                behaviors = behaviors.len(),
                "Invocation chain resolved"
            );

            let result = build_chain(&request, handler, behaviors, cancel)
                .run()
                .await
                .map_err(DispatchError::Invocation);

            if let Err(err) = &result {
                debug!(error = %err, "Request failed");
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Sends a request that produces no response.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send).
    pub async fn send_void<R>(&self, request: R, cancel: &CancellationToken) -> DispatchResult<()>
    where
        R: Request<Response = ()>,
    {
        self.send(request, cancel).await
    }

    /// Publishes a notification to every handler registered for `N`.
    ///
    /// All handlers are started together and polled concurrently. The call
    /// returns once every handler has settled: one failing handler never
    /// prevents the others from running to completion. Publishing to a shape
    /// with no handlers succeeds.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Aggregate`] listing every failed handler in
    /// registration order.
    pub async fn publish<N: Notification>(
        &self,
        notification: N,
        cancel: &CancellationToken,
    ) -> DispatchResult<()> {
        let span = debug_span!("publish", notification = N::name());

        async move {
            let scope = CallScope::open(Shape::of_notification::<N>());
            let handlers = self
                .registry
                .handlers()
                .resolve_notification_handlers::<N>(&scope);

            if handlers.is_empty() {
                trace!("No notification handlers registered");
                return Ok(());
            }

            let total = handlers.len();
            let notification = &notification;
            let calls = handlers.iter().enumerate().map(|(index, handler)| {
                let span = trace_span!("notification_handler", index, handler = handler.name());
                async move { handler.instance().handle(notification, cancel).await }
                    .instrument(span)
            });
            let results = future::join_all(calls).await;

            let failures: Vec<HandlerFailure> = results
                .into_iter()
                .zip(&handlers)
                .enumerate()
                .filter_map(|(index, (result, handler))| {
                    result.err().map(|source| HandlerFailure {
                        index,
                        handler: handler.name(),
                        source,
                    })
                })
                .collect();

            if failures.is_empty() {
                return Ok(());
            }

            for failure in &failures {
                warn!(
                    index = failure.index,
                    handler = failure.handler,
                    error = %failure.source,
                    "Notification handler failed"
                );
            }
            warn!(failed = failures.len(), total, "Publish completed with failures");
            Err(DispatchError::Aggregate(AggregateFailure::new(N::name(), total, failures)))
        }
        .instrument(span)
        .await
    }

    /// Returns a [`tower::Service`] sending requests of shape `R` with
    /// `cancel`.
    pub fn request_service<R: Request>(&self, cancel: CancellationToken) -> SendService<R> {
        SendService::new(self.clone(), cancel)
    }

    /// Returns a [`tower::Service`] publishing notifications of shape `N`
    /// with `cancel`.
    pub fn notification_service<N: Notification>(
        &self,
        cancel: CancellationToken,
    ) -> PublishService<N> {
        PublishService::new(self.clone(), cancel)
    }
}

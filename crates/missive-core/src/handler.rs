//! Handler and behavior contracts.
//!
//! Handlers perform the actual work for a message shape. Behaviors wrap the
//! handler of a request with cross-cutting logic (timing, validation,
//! transactions, ...) and decide whether the rest of the chain runs at all.
//!
//! | Contract | Bound to | Invoked by |
//! |----------|----------|------------|
//! | [`RequestHandler<R>`] | one request shape, exactly one per shape | `send` |
//! | [`NotificationHandler<N>`] | one notification shape, any number | `publish` |
//! | [`PipelineBehavior<R>`] | one request shape | `send` chain |
//! | [`ResponseBehavior<T>`] | every request whose response is `T` | `send` chain |
//! | [`OpenBehavior`] | every request | `send` chain |
//!
//! All contracts receive the dispatch [`CancellationToken`]. Cancellation is
//! cooperative: the dispatcher never aborts work on its own, so
//! implementations that block or wait should observe the token.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::BoxError;
use crate::message::{ErasedResponse, Notification, Request, RequestView};
use crate::pipeline::Next;

/// Handles one request shape and produces its response.
///
/// # Example
///
/// ```rust,ignore
/// struct CreateOrderHandler;
///
/// #[async_trait]
/// impl RequestHandler<CreateOrder> for CreateOrderHandler {
///     async fn handle(
///         &self,
///         request: &CreateOrder,
///         _cancel: &CancellationToken,
///     ) -> Result<OrderCreated, BoxError> {
///         Ok(OrderCreated { id: request.id })
///     }
/// }
/// ```
#[async_trait]
pub trait RequestHandler<R: Request>: Send + Sync + 'static {
    /// Handles the request.
    async fn handle(
        &self,
        request: &R,
        cancel: &CancellationToken,
    ) -> Result<R::Response, BoxError>;
}

/// Handles one notification shape. Any number may be registered per shape.
#[async_trait]
pub trait NotificationHandler<N: Notification>: Send + Sync + 'static {
    /// Handles the notification.
    async fn handle(&self, notification: &N, cancel: &CancellationToken) -> Result<(), BoxError>;
}

/// A behavior bound to one request shape.
///
/// The behavior receives the rest of the chain as `next`. Calling
/// [`Next::run`] invokes the inner behaviors and the handler; returning
/// without calling it short-circuits the chain, and the behavior's own result
/// becomes the result of the call.
///
/// # Example
///
/// ```rust,ignore
/// struct Validate;
///
/// #[async_trait]
/// impl PipelineBehavior<CreateOrder> for Validate {
///     async fn handle(
///         &self,
///         request: &CreateOrder,
///         next: Next<'_, OrderCreated>,
///         _cancel: &CancellationToken,
///     ) -> Result<OrderCreated, BoxError> {
///         if request.id == 0 {
///             return Err("order id must not be zero".into());
///         }
///         next.run().await
///     }
/// }
/// ```
#[async_trait]
pub trait PipelineBehavior<R: Request>: Send + Sync + 'static {
    /// Runs the behavior around the rest of the chain.
    async fn handle(
        &self,
        request: &R,
        next: Next<'_, R::Response>,
        cancel: &CancellationToken,
    ) -> Result<R::Response, BoxError>;
}

/// A behavior applied to every request whose response type is `T`.
///
/// The request is only available through a [`RequestView`], since the
/// behavior is not tied to one request type.
#[async_trait]
pub trait ResponseBehavior<T: Send + 'static>: Send + Sync + 'static {
    /// Runs the behavior around the rest of the chain.
    async fn handle(
        &self,
        request: RequestView<'_>,
        next: Next<'_, T>,
        cancel: &CancellationToken,
    ) -> Result<T, BoxError>;
}

/// A behavior applied to every request.
///
/// The continuation yields the response as an [`ErasedResponse`]. The
/// behavior is expected to hand that value back unchanged (or a replacement
/// of the same concrete type); any other type fails the call with
/// [`ResponseTypeMismatch`](crate::ResponseTypeMismatch).
#[async_trait]
pub trait OpenBehavior: Send + Sync + 'static {
    /// Runs the behavior around the rest of the chain.
    async fn handle(
        &self,
        request: RequestView<'_>,
        next: Next<'_, ErasedResponse>,
        cancel: &CancellationToken,
    ) -> Result<ErasedResponse, BoxError>;
}

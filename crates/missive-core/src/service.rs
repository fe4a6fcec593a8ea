//! Tower integration.
//!
//! [`SendService`] and [`PublishService`] expose a [`Mediator`] operation as a
//! `tower::Service`, so outer middleware (timeouts, concurrency limits,
//! buffering) can be layered around dispatch without touching the pipeline.
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use tower::{ServiceBuilder, ServiceExt};
//!
//! let service = ServiceBuilder::new()
//!     .timeout(Duration::from_secs(5))
//!     .service(mediator.request_service::<CreateOrder>(cancel));
//!
//! let created = service.oneshot(CreateOrder { id: 7 }).await?;
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tower::Service;

use crate::dispatcher::Mediator;
use crate::error::DispatchError;
use crate::message::{Notification, Request};

/// Sends requests of shape `R` through a [`Mediator`].
pub struct SendService<R> {
    mediator: Mediator,
    cancel: CancellationToken,
    _request: PhantomData<fn(R)>,
}

impl<R: Request> SendService<R> {
    /// Creates a service sending with `cancel`.
    pub fn new(mediator: Mediator, cancel: CancellationToken) -> Self {
        Self {
            mediator,
            cancel,
            _request: PhantomData,
        }
    }
}

impl<R> Clone for SendService<R> {
    fn clone(&self) -> Self {
        Self {
            mediator: self.mediator.clone(),
            cancel: self.cancel.clone(),
            _request: PhantomData,
        }
    }
}

impl<R> fmt::Debug for SendService<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendService")
            .field("request", &std::any::type_name::<R>())
            .finish_non_exhaustive()
    }
}

impl<R: Request> Service<R> for SendService<R> {
    type Response = R::Response;
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: R) -> Self::Future {
        let mediator = self.mediator.clone();
        let cancel = self.cancel.clone();

        Box::pin(async move { mediator.send(request, &cancel).await })
    }
}

/// Publishes notifications of shape `N` through a [`Mediator`].
pub struct PublishService<N> {
    mediator: Mediator,
    cancel: CancellationToken,
    _notification: PhantomData<fn(N)>,
}

impl<N: Notification> PublishService<N> {
    /// Creates a service publishing with `cancel`.
    pub fn new(mediator: Mediator, cancel: CancellationToken) -> Self {
        Self {
            mediator,
            cancel,
            _notification: PhantomData,
        }
    }
}

impl<N> Clone for PublishService<N> {
    fn clone(&self) -> Self {
        Self {
            mediator: self.mediator.clone(),
            cancel: self.cancel.clone(),
            _notification: PhantomData,
        }
    }
}

impl<N> fmt::Debug for PublishService<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishService")
            .field("notification", &std::any::type_name::<N>())
            .finish_non_exhaustive()
    }
}

impl<N: Notification> Service<N> for PublishService<N> {
    type Response = ();
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<(), DispatchError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, notification: N) -> Self::Future {
        let mediator = self.mediator.clone();
        let cancel = self.cancel.clone();

        Box::pin(async move { mediator.publish(notification, &cancel).await })
    }
}

//! Invocation chain construction.
//!
//! A chain is built fresh for every `send` call from the resolved handler and
//! the resolved behaviors `[B1, B2, ..., Bn]` (registration order). It is
//! folded from the innermost link outwards:
//!
//! ```text
//! next = || handler.handle(request)
//! next = || Bn.handle(request, next)
//! ...
//! next = || B1.handle(request, next)      ← entry point
//! ```
//!
//! Invoking the entry point runs `B1 → B2 → ... → Bn → handler`; each
//! behavior's code after `next.run().await` runs on the way back out, in the
//! mirrored order. The first-registered behavior is always the outermost.

use std::fmt;

use futures::future::BoxFuture;
use futures::{FutureExt, TryFutureExt};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, trace_span};

use crate::error::BoxError;
use crate::message::{ErasedResponse, Request};
use crate::registry::{ResolvedBehavior, ResolvedHandler};

// ============================================================================
// Next
// ============================================================================

/// The rest of an invocation chain, as seen by a behavior.
///
/// `Next` can be run at most once: [`run`](Self::run) consumes it. Dropping
/// it without running short-circuits every inner behavior and the handler.
pub struct Next<'a, T> {
    run: Box<dyn FnOnce() -> BoxFuture<'a, Result<T, BoxError>> + Send + 'a>,
}

impl<'a, T: Send + 'a> Next<'a, T> {
    /// Wraps a closure producing the continuation's future.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> BoxFuture<'a, Result<T, BoxError>> + Send + 'a,
    {
        Self { run: Box::new(f) }
    }

    /// A continuation that immediately yields `result`.
    ///
    /// Mostly useful for exercising a behavior on its own.
    pub fn from_result(result: Result<T, BoxError>) -> Self {
        Self::new(move || futures::future::ready(result).boxed())
    }

    /// Runs the rest of the chain.
    pub fn run(self) -> BoxFuture<'a, Result<T, BoxError>> {
        (self.run)()
    }

    /// Maps the successful output of the continuation.
    pub fn map<U, F>(self, f: F) -> Next<'a, U>
    where
        U: Send + 'a,
        F: FnOnce(T) -> U + Send + 'a,
    {
        Next::new(move || self.run().map_ok(f).boxed())
    }
}

impl<'a, T: Send + 'static> Next<'a, T> {
    /// Erases the output type, for handing the continuation to an
    /// [`OpenBehavior`](crate::OpenBehavior).
    pub fn erase(self) -> Next<'a, ErasedResponse> {
        self.map(|value| Box::new(value) as ErasedResponse)
    }
}

impl<T> fmt::Debug for Next<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

// ============================================================================
// Chain Builder
// ============================================================================

/// Composes `behaviors` (in registration order) around `handler`.
///
/// The returned continuation is the chain's entry point; nothing runs until
/// it is invoked. Errors raised anywhere in the chain propagate outwards
/// unchanged, through any behavior that forwards them with `?`.
pub fn build_chain<'a, R: Request>(
    request: &'a R,
    handler: ResolvedHandler<R>,
    behaviors: Vec<ResolvedBehavior<R>>,
    cancel: &'a CancellationToken,
) -> Next<'a, R::Response> {
    let terminal = Next::new(move || {
        let span = trace_span!("handler", handler = handler.name());
        async move { handler.instance().handle(request, cancel).await }
            .instrument(span)
            .boxed()
    });

    behaviors
        .into_iter()
        .rev()
        .fold(terminal, |next, behavior| {
            Next::new(move || {
                let span = trace_span!(
                    "behavior",
                    behavior = behavior.name(),
                    kind = %behavior.kind()
                );
                async move { behavior.instance().handle(request, next, cancel).await }
                    .instrument(span)
                    .boxed()
            })
        })
}

//! Error types for the dispatch core.
//!
//! Handlers and behaviors fail with a plain [`BoxError`]. The dispatcher
//! never wraps, retries or swallows such a failure: it reaches the caller
//! through [`DispatchError::Invocation`], whose `Display` and `source` are
//! those of the original error, and whose concrete type can be recovered with
//! [`DispatchError::downcast_ref`].

use std::fmt;

use thiserror::Error;

/// The error type returned by handlers and behaviors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Dispatch Errors
// =============================================================================

/// Errors returned by [`Mediator`](crate::Mediator) operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No request handler is registered for the request shape.
    #[error("no handler registered for request '{request}'")]
    HandlerNotFound {
        /// Name of the request shape.
        request: &'static str,
    },

    /// More than one request handler is registered for the request shape.
    #[error("{count} handlers registered for request '{request}', expected exactly one")]
    HandlerAmbiguity {
        /// Name of the request shape.
        request: &'static str,
        /// Number of registered handlers.
        count: usize,
    },

    /// A handler or behavior failed. The original error is kept as-is.
    #[error(transparent)]
    Invocation(BoxError),

    /// One or more notification handlers failed during a publish.
    #[error(transparent)]
    Aggregate(#[from] AggregateFailure),
}

impl DispatchError {
    /// Creates an invocation error from any error value.
    pub fn invocation(err: impl Into<BoxError>) -> Self {
        Self::Invocation(err.into())
    }

    /// Returns `true` if no handler was registered for the request.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::HandlerNotFound { .. })
    }

    /// Returns `true` if several handlers were registered for the request.
    pub fn is_ambiguity(&self) -> bool {
        matches!(self, Self::HandlerAmbiguity { .. })
    }

    /// Borrows the failure raised by a handler or behavior as a concrete
    /// error type.
    ///
    /// Returns `None` for lookup errors, aggregate failures, or when the
    /// failure is of a different type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Invocation(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Unwraps the failure raised by a handler or behavior.
    ///
    /// Returns `Err(self)` for every other variant.
    pub fn into_invocation(self) -> Result<BoxError, Self> {
        match self {
            Self::Invocation(err) => Ok(err),
            other => Err(other),
        }
    }

    /// Returns the aggregate failure of a publish, if this is one.
    pub fn as_aggregate(&self) -> Option<&AggregateFailure> {
        match self {
            Self::Aggregate(aggregate) => Some(aggregate),
            _ => None,
        }
    }
}

// =============================================================================
// Publish Failures
// =============================================================================

/// The failure of a single notification handler.
///
/// The handler's error is exposed through [`source`](std::error::Error::source)
/// and is not repeated in the message.
#[derive(Debug, Error)]
#[error("handler #{index} ({handler}) failed")]
pub struct HandlerFailure {
    /// Position of the handler in registration order.
    pub index: usize,
    /// Type name of the handler.
    pub handler: &'static str,
    /// The error the handler returned.
    #[source]
    pub source: BoxError,
}

/// Every failure observed while publishing one notification.
///
/// All handlers have settled by the time this error is produced; handlers
/// that are not listed here completed successfully.
///
/// The message names every failed handler. Its
/// [`source`](std::error::Error::source) is the first failure, so generic
/// error reports (`{:#}`, `anyhow`) show why that handler failed; the others
/// are available through [`failures`](Self::failures).
#[derive(Debug)]
pub struct AggregateFailure {
    notification: &'static str,
    total: usize,
    failures: Vec<HandlerFailure>,
}

impl AggregateFailure {
    pub(crate) fn new(
        notification: &'static str,
        total: usize,
        failures: Vec<HandlerFailure>,
    ) -> Self {
        Self {
            notification,
            total,
            failures,
        }
    }

    /// Name of the published notification shape.
    pub fn notification(&self) -> &'static str {
        self.notification
    }

    /// Number of handlers that were invoked.
    pub fn total(&self) -> usize {
        self.total
    }

    /// The failures, in handler registration order.
    pub fn failures(&self) -> &[HandlerFailure] {
        &self.failures
    }

    /// Consumes the aggregate and returns the individual failures.
    pub fn into_failures(self) -> Vec<HandlerFailure> {
        self.failures
    }

    /// Returns the first failure whose error is of type `E`.
    pub fn find<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.failures
            .iter()
            .find_map(|failure| failure.source.downcast_ref::<E>())
    }
}

impl fmt::Display for AggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} handlers failed for notification '{}'",
            self.failures.len(),
            self.total,
            self.notification
        )?;
        for (position, failure) in self.failures.iter().enumerate() {
            let separator = if position == 0 { " [" } else { ", " };
            write!(f, "{separator}#{} {}", failure.index, failure.handler)?;
        }
        if !self.failures.is_empty() {
            f.write_str("]")?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|failure| failure as &(dyn std::error::Error + 'static))
    }
}

// =============================================================================
// Open Behavior Errors
// =============================================================================

/// Raised when an [`OpenBehavior`](crate::OpenBehavior) produces a response
/// that is not of the request's response type.
#[derive(Debug, Clone, Error)]
#[error("behavior '{behavior}' returned a response that is not a '{expected}'")]
pub struct ResponseTypeMismatch {
    /// Type name of the offending behavior.
    pub behavior: &'static str,
    /// Expected response type name.
    pub expected: &'static str,
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("out of stock")]
    struct OutOfStock;

    #[test]
    fn test_invocation_is_transparent() {
        let err = DispatchError::invocation(OutOfStock);

        assert_eq!(err.to_string(), "out of stock");
        assert!(err.downcast_ref::<OutOfStock>().is_some());
        assert!(err.downcast_ref::<ResponseTypeMismatch>().is_none());
        assert!(err.into_invocation().is_ok());
    }

    #[test]
    fn test_lookup_errors() {
        let missing = DispatchError::HandlerNotFound { request: "Ping" };
        let ambiguous = DispatchError::HandlerAmbiguity {
            request: "Ping",
            count: 2,
        };

        assert!(missing.is_not_found());
        assert!(ambiguous.is_ambiguity());
        assert_eq!(
            ambiguous.to_string(),
            "2 handlers registered for request 'Ping', expected exactly one"
        );
        assert!(missing.downcast_ref::<OutOfStock>().is_none());
    }

    #[test]
    fn test_aggregate_failure_message() {
        let aggregate = AggregateFailure::new(
            "OrderPlaced",
            3,
            vec![HandlerFailure {
                index: 1,
                handler: "EmailHandler",
                source: Box::new(OutOfStock),
            }],
        );

        assert_eq!(
            aggregate.to_string(),
            "1 of 3 handlers failed for notification 'OrderPlaced' [#1 EmailHandler]"
        );
        assert_eq!(
            aggregate.failures()[0].to_string(),
            "handler #1 (EmailHandler) failed"
        );
        assert!(aggregate.find::<OutOfStock>().is_some());
    }

    #[test]
    fn test_aggregate_failure_source_chain() {
        use std::error::Error as _;

        let err = DispatchError::from(AggregateFailure::new(
            "OrderPlaced",
            3,
            vec![
                HandlerFailure {
                    index: 0,
                    handler: "EmailHandler",
                    source: Box::new(OutOfStock),
                },
                HandlerFailure {
                    index: 2,
                    handler: "SearchHandler",
                    source: "index offline".into(),
                },
            ],
        ));

        assert_eq!(
            err.to_string(),
            "2 of 3 handlers failed for notification 'OrderPlaced' \
             [#0 EmailHandler, #2 SearchHandler]"
        );

        let first = err.source().expect("aggregate exposes its first failure");
        assert_eq!(first.to_string(), "handler #0 (EmailHandler) failed");
        let cause = first.source().expect("handler failure exposes its error");
        assert!(cause.downcast_ref::<OutOfStock>().is_some());
        assert!(cause.source().is_none());
    }
}

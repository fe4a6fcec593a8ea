//! Message types and their runtime identity.
//!
//! Every value that flows through the mediator is either a [`Request`]
//! (routed to exactly one handler) or a [`Notification`] (broadcast to any
//! number of handlers). The registry looks messages up by their [`Shape`],
//! an explicit identifier derived from the Rust type rather than from
//! runtime introspection of the value.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A message routed to exactly one [`RequestHandler`](crate::RequestHandler).
///
/// Fire-and-forget requests declare `type Response = ();` and are sent with
/// [`Mediator::send_void`](crate::Mediator::send_void).
///
/// # Example
///
/// ```rust,ignore
/// struct CreateOrder {
///     id: u64,
/// }
///
/// impl Request for CreateOrder {
///     type Response = OrderCreated;
/// }
/// ```
pub trait Request: Send + Sync + 'static {
    /// The value produced by the handler for this request.
    type Response: Send + 'static;

    /// Stable name used in diagnostics and error messages.
    ///
    /// Defaults to the Rust type name. `#[derive(Request)]` can override it
    /// with `#[request(name = "...")]`.
    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A message broadcast to every registered
/// [`NotificationHandler`](crate::NotificationHandler).
pub trait Notification: Send + Sync + 'static {
    /// Stable name used in diagnostics and error messages.
    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// A type-erased response value, produced by continuations handed to
/// [`OpenBehavior`](crate::OpenBehavior)s.
pub type ErasedResponse = Box<dyn Any + Send>;

// ============================================================================
// Shape
// ============================================================================

/// The runtime identity of a message kind.
///
/// Two shapes are equal when they describe the same Rust type; the name is
/// carried along for logging only.
#[derive(Clone, Copy)]
pub struct Shape {
    id: TypeId,
    name: &'static str,
}

impl Shape {
    /// The shape of an arbitrary type, named after its Rust type name.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The shape of a request type, named by [`Request::name`].
    pub fn of_request<R: Request>() -> Self {
        Self {
            id: TypeId::of::<R>(),
            name: R::name(),
        }
    }

    /// The shape of a notification type, named by [`Notification::name`].
    pub fn of_notification<N: Notification>() -> Self {
        Self {
            id: TypeId::of::<N>(),
            name: N::name(),
        }
    }

    /// Returns the underlying type identifier.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Returns the display name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` if this shape describes the type `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    /// Returns `true` for the unit type, i.e. the response of a
    /// fire-and-forget request.
    pub fn is_unit(&self) -> bool {
        self.is::<()>()
    }
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Shape {}

impl Hash for Shape {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shape").field(&self.name).finish()
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ============================================================================
// RequestView
// ============================================================================

/// A borrowed, type-erased view of a request.
///
/// Handed to behaviors that are not bound to one concrete request type
/// ([`ResponseBehavior`](crate::ResponseBehavior) and
/// [`OpenBehavior`](crate::OpenBehavior)). The concrete request can be
/// recovered with [`downcast_ref`](Self::downcast_ref).
#[derive(Clone, Copy)]
pub struct RequestView<'a> {
    shape: Shape,
    value: &'a (dyn Any + Send + Sync),
}

impl<'a> RequestView<'a> {
    /// Creates a view over a concrete request.
    pub fn of<R: Request>(request: &'a R) -> Self {
        Self {
            shape: Shape::of_request::<R>(),
            value: request,
        }
    }

    /// Returns the shape of the viewed request.
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Returns the request's display name.
    pub fn name(&self) -> &'static str {
        self.shape.name()
    }

    /// Returns `true` if the viewed request is an `R`.
    pub fn is<R: Request>(&self) -> bool {
        self.value.is::<R>()
    }

    /// Attempts to borrow the viewed request as an `R`.
    pub fn downcast_ref<R: Request>(&self) -> Option<&'a R> {
        self.value.downcast_ref::<R>()
    }
}

impl fmt::Debug for RequestView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestView")
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;

    impl Request for Plain {
        type Response = ();
    }

    struct Named;

    impl Request for Named {
        type Response = u32;

        fn name() -> &'static str {
            "orders.named"
        }
    }

    #[test]
    fn test_shape_identity_ignores_name() {
        let a = Shape::of_request::<Named>();
        let b = Shape::of::<Named>();

        assert_eq!(a, b);
        assert_eq!(a.name(), "orders.named");
        assert!(b.name().ends_with("Named"));
        assert_ne!(a, Shape::of_request::<Plain>());
    }

    #[test]
    fn test_unit_response_shape() {
        assert!(Shape::of::<<Plain as Request>::Response>().is_unit());
        assert!(!Shape::of::<<Named as Request>::Response>().is_unit());
    }

    #[test]
    fn test_request_view_downcast() {
        let request = Named;
        let view = RequestView::of(&request);

        assert!(view.is::<Named>());
        assert!(view.downcast_ref::<Plain>().is_none());
        assert!(view.downcast_ref::<Named>().is_some());
        assert_eq!(view.name(), "orders.named");
    }
}

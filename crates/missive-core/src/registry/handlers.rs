//! Request and notification handler registry.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::Factory;
use crate::error::{DispatchError, DispatchResult};
use crate::handler::{NotificationHandler, RequestHandler};
use crate::message::{Notification, Request, Shape};
use crate::scope::CallScope;

/// One registered factory.
struct Registration<T: ?Sized> {
    name: &'static str,
    factory: Factory<T>,
}

/// All registrations for one message shape.
///
/// `registrations` holds a `Vec<Registration<dyn RequestHandler<R>>>` or a
/// `Vec<Registration<dyn NotificationHandler<N>>>`, keyed by the shape's
/// `TypeId` in the owning map.
struct Entry {
    shape: Shape,
    response: Option<Shape>,
    names: Vec<&'static str>,
    registrations: Box<dyn Any + Send + Sync>,
}

impl Entry {
    fn new<T: ?Sized + 'static>(shape: Shape, response: Option<Shape>) -> Self {
        Self {
            shape,
            response,
            names: Vec::new(),
            registrations: Box::new(Vec::<Registration<T>>::new()),
        }
    }

    fn push<T: ?Sized + 'static>(&mut self, registration: Registration<T>) {
        if let Some(list) = self.registrations.downcast_mut::<Vec<Registration<T>>>() {
            self.names.push(registration.name);
            list.push(registration);
        }
    }

    fn registrations<T: ?Sized + 'static>(&self) -> &[Registration<T>] {
        self.registrations
            .downcast_ref::<Vec<Registration<T>>>()
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn summary(&self) -> HandlerSummary {
        HandlerSummary {
            shape: self.shape,
            response: self.response,
            handlers: self.names.clone(),
        }
    }
}

// ============================================================================
// Resolved handlers
// ============================================================================

/// A request handler instance resolved for one call.
pub struct ResolvedHandler<R: Request> {
    name: &'static str,
    instance: Arc<dyn RequestHandler<R>>,
}

impl<R: Request> ResolvedHandler<R> {
    /// Pairs a handler instance with its display name.
    pub fn new(name: &'static str, instance: Arc<dyn RequestHandler<R>>) -> Self {
        Self { name, instance }
    }

    /// Type name of the handler.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The handler instance.
    pub fn instance(&self) -> &Arc<dyn RequestHandler<R>> {
        &self.instance
    }
}

impl<R: Request> fmt::Debug for ResolvedHandler<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedHandler")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A notification handler instance resolved for one call.
pub struct ResolvedNotificationHandler<N: Notification> {
    name: &'static str,
    instance: Arc<dyn NotificationHandler<N>>,
}

impl<N: Notification> ResolvedNotificationHandler<N> {
    /// Type name of the handler.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The handler instance.
    pub fn instance(&self) -> &Arc<dyn NotificationHandler<N>> {
        &self.instance
    }
}

impl<N: Notification> fmt::Debug for ResolvedNotificationHandler<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedNotificationHandler")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Registration summary for one message shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSummary {
    /// The request or notification shape.
    pub shape: Shape,
    /// The declared response shape; `None` for notifications and
    /// fire-and-forget requests.
    pub response: Option<Shape>,
    /// Handler type names, in registration order.
    pub handlers: Vec<&'static str>,
}

// ============================================================================
// HandlerRegistry
// ============================================================================

/// Handler lookup tables keyed by message shape.
///
/// Request handlers are singular: registering a second handler for the same
/// request shape is recorded (not rejected) and reported as
/// [`DispatchError::HandlerAmbiguity`] by [`validate`](Self::validate) and at
/// dispatch time. Notification handlers are ordered by registration.
#[derive(Default)]
pub struct HandlerRegistry {
    requests: HashMap<TypeId, Entry>,
    notifications: HashMap<TypeId, Entry>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request handler created per call by `factory`.
    pub fn register_request_handler<R, H, F>(&mut self, factory: F)
    where
        R: Request,
        H: RequestHandler<R>,
        F: Fn(&CallScope) -> H + Send + Sync + 'static,
    {
        self.push_request::<R>(Registration {
            name: std::any::type_name::<H>(),
            factory: Arc::new(move |scope: &CallScope| {
                Arc::new(factory(scope)) as Arc<dyn RequestHandler<R>>
            }),
        });
    }

    /// Registers a request handler instance shared by every call.
    pub fn register_request_handler_instance<R, H>(&mut self, handler: H)
    where
        R: Request,
        H: RequestHandler<R>,
    {
        let instance: Arc<dyn RequestHandler<R>> = Arc::new(handler);
        self.push_request::<R>(Registration {
            name: std::any::type_name::<H>(),
            factory: Arc::new(move |_: &CallScope| Arc::clone(&instance)),
        });
    }

    /// Registers a notification handler created per call by `factory`.
    pub fn register_notification_handler<N, H, F>(&mut self, factory: F)
    where
        N: Notification,
        H: NotificationHandler<N>,
        F: Fn(&CallScope) -> H + Send + Sync + 'static,
    {
        self.push_notification::<N>(Registration {
            name: std::any::type_name::<H>(),
            factory: Arc::new(move |scope: &CallScope| {
                Arc::new(factory(scope)) as Arc<dyn NotificationHandler<N>>
            }),
        });
    }

    /// Registers a notification handler instance shared by every call.
    pub fn register_notification_handler_instance<N, H>(&mut self, handler: H)
    where
        N: Notification,
        H: NotificationHandler<N>,
    {
        let instance: Arc<dyn NotificationHandler<N>> = Arc::new(handler);
        self.push_notification::<N>(Registration {
            name: std::any::type_name::<H>(),
            factory: Arc::new(move |_: &CallScope| Arc::clone(&instance)),
        });
    }

    fn push_request<R: Request>(&mut self, registration: Registration<dyn RequestHandler<R>>) {
        let response = Shape::of::<R::Response>();
        let entry = self.requests.entry(TypeId::of::<R>()).or_insert_with(|| {
            Entry::new::<dyn RequestHandler<R>>(
                Shape::of_request::<R>(),
                (!response.is_unit()).then_some(response),
            )
        });

        debug!(
            request = R::name(),
            response = %response,
            handler = registration.name,
            "Registered request handler"
        );
        entry.push(registration);
    }

    fn push_notification<N: Notification>(
        &mut self,
        registration: Registration<dyn NotificationHandler<N>>,
    ) {
        let entry = self
            .notifications
            .entry(TypeId::of::<N>())
            .or_insert_with(|| {
                Entry::new::<dyn NotificationHandler<N>>(Shape::of_notification::<N>(), None)
            });

        debug!(
            notification = N::name(),
            handler = registration.name,
            position = entry.names.len(),
            "Registered notification handler"
        );
        entry.push(registration);
    }

    /// Resolves the single handler for the request shape `R` and
    /// instantiates it for `scope`.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::HandlerNotFound`] if no handler is registered
    /// - [`DispatchError::HandlerAmbiguity`] if more than one is registered
    pub fn resolve_request_handler<R: Request>(
        &self,
        scope: &CallScope,
    ) -> DispatchResult<ResolvedHandler<R>> {
        let registrations = self
            .requests
            .get(&TypeId::of::<R>())
            .map(Entry::registrations::<dyn RequestHandler<R>>)
            .unwrap_or_default();

        match registrations {
            [] => Err(DispatchError::HandlerNotFound { request: R::name() }),
            [only] => Ok(ResolvedHandler::new(only.name, (only.factory)(scope))),
            many => Err(DispatchError::HandlerAmbiguity {
                request: R::name(),
                count: many.len(),
            }),
        }
    }

    /// Resolves every handler for the notification shape `N`, in
    /// registration order, instantiated for `scope`.
    ///
    /// Returns an empty list when none is registered.
    pub fn resolve_notification_handlers<N: Notification>(
        &self,
        scope: &CallScope,
    ) -> Vec<ResolvedNotificationHandler<N>> {
        self.notifications
            .get(&TypeId::of::<N>())
            .map(Entry::registrations::<dyn NotificationHandler<N>>)
            .unwrap_or_default()
            .iter()
            .map(|registration| ResolvedNotificationHandler {
                name: registration.name,
                instance: (registration.factory)(scope),
            })
            .collect()
    }

    /// Checks that no request shape has more than one handler.
    ///
    /// Shapes are checked in name order, so the reported error is stable.
    pub fn validate(&self) -> DispatchResult<()> {
        let mut entries: Vec<&Entry> = self.requests.values().collect();
        entries.sort_by_key(|entry| entry.shape.name());

        match entries.into_iter().find(|entry| entry.names.len() > 1) {
            Some(entry) => Err(DispatchError::HandlerAmbiguity {
                request: entry.shape.name(),
                count: entry.names.len(),
            }),
            None => Ok(()),
        }
    }

    /// Number of handlers registered for the request shape `R`.
    pub fn request_handler_count<R: Request>(&self) -> usize {
        self.requests
            .get(&TypeId::of::<R>())
            .map_or(0, |entry| entry.names.len())
    }

    /// Number of handlers registered for the notification shape `N`.
    pub fn notification_handler_count<N: Notification>(&self) -> usize {
        self.notifications
            .get(&TypeId::of::<N>())
            .map_or(0, |entry| entry.names.len())
    }

    /// Summaries of every registered request shape, sorted by name.
    pub fn request_summaries(&self) -> Vec<HandlerSummary> {
        Self::summaries(&self.requests)
    }

    /// Summaries of every registered notification shape, sorted by name.
    pub fn notification_summaries(&self) -> Vec<HandlerSummary> {
        Self::summaries(&self.notifications)
    }

    fn summaries(map: &HashMap<TypeId, Entry>) -> Vec<HandlerSummary> {
        let mut summaries: Vec<HandlerSummary> = map.values().map(Entry::summary).collect();
        summaries.sort_by_key(|summary| summary.shape.name());
        summaries
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("request_shapes", &self.requests.len())
            .field("notification_shapes", &self.notifications.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::assert_err;

    use super::*;
    use crate::testing::{CreateOrder, CreateOrderHandler, OrderPlaced, Recorder, RecordingListener};

    fn scope() -> CallScope {
        CallScope::open(Shape::of_request::<CreateOrder>())
    }

    #[test]
    fn test_missing_request_handler() {
        let registry = HandlerRegistry::new();

        let err = assert_err!(registry.resolve_request_handler::<CreateOrder>(&scope()));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_ambiguous_request_handler() {
        let recorder = Recorder::default();
        let mut registry = HandlerRegistry::new();
        let first = recorder.clone();
        registry.register_request_handler::<CreateOrder, _, _>(move |_| {
            CreateOrderHandler::new(first.clone())
        });
        let second = CreateOrderHandler::new(recorder);
        registry.register_request_handler_instance::<CreateOrder, _>(second);

        let err = assert_err!(registry.resolve_request_handler::<CreateOrder>(&scope()));
        assert!(matches!(err, DispatchError::HandlerAmbiguity { count: 2, .. }));
        assert!(registry.validate().is_err());
    }

    #[test]
    fn test_single_request_handler_is_instantiated_per_call() {
        let recorder = Recorder::default();
        let mut registry = HandlerRegistry::new();
        registry.register_request_handler::<CreateOrder, _, _>(move |_| {
            CreateOrderHandler::new(recorder.clone())
        });

        let a = registry
            .resolve_request_handler::<CreateOrder>(&scope())
            .unwrap();
        let b = registry
            .resolve_request_handler::<CreateOrder>(&scope())
            .unwrap();

        assert!(!Arc::ptr_eq(a.instance(), b.instance()));
        assert!(a.name().ends_with("CreateOrderHandler"));
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn test_instance_registration_is_shared() {
        let mut registry = HandlerRegistry::new();
        let handler = CreateOrderHandler::new(Recorder::default());
        registry.register_request_handler_instance::<CreateOrder, _>(handler);

        let a = registry
            .resolve_request_handler::<CreateOrder>(&scope())
            .unwrap();
        let b = registry
            .resolve_request_handler::<CreateOrder>(&scope())
            .unwrap();

        assert!(Arc::ptr_eq(a.instance(), b.instance()));
    }

    #[test]
    fn test_notification_handlers_keep_registration_order() {
        let recorder = Recorder::default();
        let mut registry = HandlerRegistry::new();
        for label in ["N1", "N2", "N3"] {
            let recorder = recorder.clone();
            registry.register_notification_handler::<OrderPlaced, _, _>(move |_| {
                RecordingListener::new(label, recorder.clone())
            });
        }

        let handlers = registry.resolve_notification_handlers::<OrderPlaced>(&scope());
        assert_eq!(handlers.len(), 3);
        assert_eq!(registry.notification_handler_count::<OrderPlaced>(), 3);

        let summary = &registry.notification_summaries()[0];
        assert_eq!(summary.handlers.len(), 3);
        assert_eq!(summary.response, None);
    }

    #[test]
    fn test_no_notification_handlers_is_empty() {
        let registry = HandlerRegistry::new();

        let handlers = registry.resolve_notification_handlers::<OrderPlaced>(&scope());
        assert!(handlers.is_empty());
    }

    #[test]
    fn test_request_summary_records_response_shape() {
        let mut registry = HandlerRegistry::new();
        let handler = CreateOrderHandler::new(Recorder::default());
        registry.register_request_handler_instance::<CreateOrder, _>(handler);

        let summaries = registry.request_summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].shape, Shape::of::<CreateOrder>());
        assert!(
            summaries[0]
                .response
                .is_some_and(|shape| shape.name().ends_with("OrderCreated"))
        );
        assert_eq!(registry.request_handler_count::<CreateOrder>(), 1);
    }
}

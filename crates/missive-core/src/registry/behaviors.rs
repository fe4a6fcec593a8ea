//! Pipeline behavior registry.
//!
//! Behaviors come in three registration kinds:
//!
//! | Kind | Applies to | Contract |
//! |------|-----------|----------|
//! | [`BehaviorKind::Request`] | one request shape | [`PipelineBehavior<R>`] |
//! | [`BehaviorKind::Response`] | every request responding with `T` | [`ResponseBehavior<T>`] |
//! | [`BehaviorKind::Open`] | every request | [`OpenBehavior`] |
//!
//! All kinds share a single registration sequence. The behaviors applicable
//! to a request are the matching registrations in that sequence, so the
//! first-registered behavior is the outermost link regardless of its kind.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use super::Factory;
use crate::error::{BoxError, ResponseTypeMismatch};
use crate::handler::{OpenBehavior, PipelineBehavior, ResponseBehavior};
use crate::message::{Request, RequestView};
use crate::pipeline::Next;
use crate::scope::CallScope;

/// How a behavior was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BehaviorKind {
    /// Bound to one request shape.
    Request,
    /// Bound to every request with a given response type.
    Response,
    /// Bound to every request.
    Open,
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Open => "open",
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Request { id: TypeId, name: &'static str },
    Response { id: TypeId, name: &'static str },
    Open,
}

impl Target {
    fn matches(&self, request: TypeId, response: TypeId) -> bool {
        match *self {
            Self::Request { id, .. } => id == request,
            Self::Response { id, .. } => id == response,
            Self::Open => true,
        }
    }

    fn kind(&self) -> BehaviorKind {
        match self {
            Self::Request { .. } => BehaviorKind::Request,
            Self::Response { .. } => BehaviorKind::Response,
            Self::Open => BehaviorKind::Open,
        }
    }

    fn name(&self) -> &'static str {
        match *self {
            Self::Request { name, .. } | Self::Response { name, .. } => name,
            Self::Open => "*",
        }
    }
}

/// One registration. `factory` holds a `Factory<dyn PipelineBehavior<R>>`,
/// a `Factory<dyn ResponseBehavior<T>>` or a `Factory<dyn OpenBehavior>`,
/// according to `target`.
struct BehaviorEntry {
    name: &'static str,
    target: Target,
    factory: Box<dyn Any + Send + Sync>,
}

// ============================================================================
// Resolved behaviors
// ============================================================================

/// A behavior instance resolved for one call, adapted to the request shape.
pub struct ResolvedBehavior<R: Request> {
    name: &'static str,
    kind: BehaviorKind,
    instance: Arc<dyn PipelineBehavior<R>>,
}

impl<R: Request> ResolvedBehavior<R> {
    /// Pairs a behavior instance with its display name and kind.
    pub fn new(
        name: &'static str,
        kind: BehaviorKind,
        instance: Arc<dyn PipelineBehavior<R>>,
    ) -> Self {
        Self {
            name,
            kind,
            instance,
        }
    }

    /// Type name of the behavior.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The kind the behavior was registered as.
    pub fn kind(&self) -> BehaviorKind {
        self.kind
    }

    /// The behavior instance.
    pub fn instance(&self) -> &Arc<dyn PipelineBehavior<R>> {
        &self.instance
    }
}

impl<R: Request> fmt::Debug for ResolvedBehavior<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedBehavior")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Registration summary of one behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehaviorSummary {
    /// Position in the registration sequence.
    pub position: usize,
    /// Type name of the behavior.
    pub name: &'static str,
    /// Registration kind.
    pub kind: BehaviorKind,
    /// Request or response type the behavior is bound to; `*` for open
    /// behaviors.
    pub target: &'static str,
}

// ============================================================================
// Adapters
// ============================================================================

struct ResponseAdapter<R: Request> {
    inner: Arc<dyn ResponseBehavior<R::Response>>,
    _request: PhantomData<fn(R)>,
}

#[async_trait]
impl<R: Request> PipelineBehavior<R> for ResponseAdapter<R> {
    async fn handle(
        &self,
        request: &R,
        next: Next<'_, R::Response>,
        cancel: &CancellationToken,
    ) -> Result<R::Response, BoxError> {
        self.inner
            .handle(RequestView::of(request), next, cancel)
            .await
    }
}

struct OpenAdapter<R: Request> {
    name: &'static str,
    inner: Arc<dyn OpenBehavior>,
    _request: PhantomData<fn(R)>,
}

#[async_trait]
impl<R: Request> PipelineBehavior<R> for OpenAdapter<R> {
    async fn handle(
        &self,
        request: &R,
        next: Next<'_, R::Response>,
        cancel: &CancellationToken,
    ) -> Result<R::Response, BoxError> {
        let response = self
            .inner
            .handle(RequestView::of(request), next.erase(), cancel)
            .await?;

        match response.downcast::<R::Response>() {
            Ok(response) => Ok(*response),
            Err(_) => Err(ResponseTypeMismatch {
                behavior: self.name,
                expected: std::any::type_name::<R::Response>(),
            }
            .into()),
        }
    }
}

// ============================================================================
// BehaviorRegistry
// ============================================================================

/// Ordered behavior registrations, with a memoized per-request plan.
///
/// The plan (the indices of the registrations applicable to a request
/// shape) is computed on first dispatch of that shape and reused afterwards.
/// Registering a new behavior discards every memoized plan.
#[derive(Default)]
pub struct BehaviorRegistry {
    entries: Vec<BehaviorEntry>,
    plans: RwLock<HashMap<TypeId, Arc<[usize]>>>,
}

impl BehaviorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a behavior for the request shape `R`, created per call.
    pub fn register<R, B, F>(&mut self, factory: F)
    where
        R: Request,
        B: PipelineBehavior<R>,
        F: Fn(&CallScope) -> B + Send + Sync + 'static,
    {
        let factory: Factory<dyn PipelineBehavior<R>> = Arc::new(move |scope: &CallScope| {
            Arc::new(factory(scope)) as Arc<dyn PipelineBehavior<R>>
        });
        self.push(
            std::any::type_name::<B>(),
            Target::Request {
                id: TypeId::of::<R>(),
                name: R::name(),
            },
            Box::new(factory),
        );
    }

    /// Registers a behavior instance for the request shape `R`.
    pub fn register_instance<R, B>(&mut self, behavior: B)
    where
        R: Request,
        B: PipelineBehavior<R>,
    {
        let instance: Arc<dyn PipelineBehavior<R>> = Arc::new(behavior);
        let factory: Factory<dyn PipelineBehavior<R>> =
            Arc::new(move |_: &CallScope| Arc::clone(&instance));
        self.push(
            std::any::type_name::<B>(),
            Target::Request {
                id: TypeId::of::<R>(),
                name: R::name(),
            },
            Box::new(factory),
        );
    }

    /// Registers a behavior for every request responding with `T`, created
    /// per call.
    pub fn register_for_response<T, B, F>(&mut self, factory: F)
    where
        T: Send + 'static,
        B: ResponseBehavior<T>,
        F: Fn(&CallScope) -> B + Send + Sync + 'static,
    {
        let factory: Factory<dyn ResponseBehavior<T>> = Arc::new(move |scope: &CallScope| {
            Arc::new(factory(scope)) as Arc<dyn ResponseBehavior<T>>
        });
        self.push(
            std::any::type_name::<B>(),
            Target::Response {
                id: TypeId::of::<T>(),
                name: std::any::type_name::<T>(),
            },
            Box::new(factory),
        );
    }

    /// Registers a behavior instance for every request responding with `T`.
    pub fn register_for_response_instance<T, B>(&mut self, behavior: B)
    where
        T: Send + 'static,
        B: ResponseBehavior<T>,
    {
        let instance: Arc<dyn ResponseBehavior<T>> = Arc::new(behavior);
        let factory: Factory<dyn ResponseBehavior<T>> =
            Arc::new(move |_: &CallScope| Arc::clone(&instance));
        self.push(
            std::any::type_name::<B>(),
            Target::Response {
                id: TypeId::of::<T>(),
                name: std::any::type_name::<T>(),
            },
            Box::new(factory),
        );
    }

    /// Registers a behavior for every request, created per call.
    pub fn register_open<B, F>(&mut self, factory: F)
    where
        B: OpenBehavior,
        F: Fn(&CallScope) -> B + Send + Sync + 'static,
    {
        let factory: Factory<dyn OpenBehavior> =
            Arc::new(move |scope: &CallScope| Arc::new(factory(scope)) as Arc<dyn OpenBehavior>);
        self.push(std::any::type_name::<B>(), Target::Open, Box::new(factory));
    }

    /// Registers a behavior instance for every request.
    pub fn register_open_instance<B: OpenBehavior>(&mut self, behavior: B) {
        let instance: Arc<dyn OpenBehavior> = Arc::new(behavior);
        let factory: Factory<dyn OpenBehavior> =
            Arc::new(move |_: &CallScope| Arc::clone(&instance));
        self.push(std::any::type_name::<B>(), Target::Open, Box::new(factory));
    }

    fn push(&mut self, name: &'static str, target: Target, factory: Box<dyn Any + Send + Sync>) {
        debug!(
            behavior = name,
            kind = %target.kind(),
            target = target.name(),
            position = self.entries.len(),
            "Registered pipeline behavior"
        );
        self.entries.push(BehaviorEntry {
            name,
            target,
            factory,
        });
        self.plans.get_mut().clear();
    }

    /// Indices of the registrations applicable to `R`, in registration order.
    fn plan_for<R: Request>(&self) -> Arc<[usize]> {
        let key = TypeId::of::<R>();
        if let Some(plan) = self.plans.read().get(&key) {
            return Arc::clone(plan);
        }

        let response = TypeId::of::<R::Response>();
        let plan: Arc<[usize]> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.target.matches(key, response))
            .map(|(index, _)| index)
            .collect();

        trace!(
            request = R::name(),
            behaviors = plan.len(),
            "Computed behavior plan"
        );
        Arc::clone(self.plans.write().entry(key).or_insert(plan))
    }

    /// Resolves and instantiates every behavior applicable to `R` for
    /// `scope`, in registration order.
    pub fn resolve<R: Request>(&self, scope: &CallScope) -> Vec<ResolvedBehavior<R>> {
        self.plan_for::<R>()
            .iter()
            .filter_map(|&index| {
                let entry = &self.entries[index];
                let resolved = self.instantiate::<R>(entry, scope);
                if resolved.is_none() {
                    error!(
                        behavior = entry.name,
                        request = R::name(),
                        "Behavior factory does not match its registration"
                    );
                }
                debug_assert!(
                    resolved.is_some(),
                    "behavior '{}' holds a factory for another shape than '{}'",
                    entry.name,
                    R::name()
                );
                resolved
            })
            .collect()
    }

    fn instantiate<R: Request>(
        &self,
        entry: &BehaviorEntry,
        scope: &CallScope,
    ) -> Option<ResolvedBehavior<R>> {
        let instance: Arc<dyn PipelineBehavior<R>> = match entry.target {
            Target::Request { .. } => {
                let factory = entry
                    .factory
                    .downcast_ref::<Factory<dyn PipelineBehavior<R>>>()?;
                factory(scope)
            }
            Target::Response { .. } => {
                let factory = entry
                    .factory
                    .downcast_ref::<Factory<dyn ResponseBehavior<R::Response>>>()?;
                Arc::new(ResponseAdapter::<R> {
                    inner: factory(scope),
                    _request: PhantomData,
                })
            }
            Target::Open => {
                let factory = entry.factory.downcast_ref::<Factory<dyn OpenBehavior>>()?;
                Arc::new(OpenAdapter::<R> {
                    name: entry.name,
                    inner: factory(scope),
                    _request: PhantomData,
                })
            }
        };

        Some(ResolvedBehavior::new(entry.name, entry.target.kind(), instance))
    }

    /// Summaries of every registration, in registration order.
    pub fn summaries(&self) -> Vec<BehaviorSummary> {
        self.entries
            .iter()
            .enumerate()
            .map(|(position, entry)| BehaviorSummary {
                position,
                name: entry.name,
                kind: entry.target.kind(),
                target: entry.target.name(),
            })
            .collect()
    }

    /// Number of registered behaviors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no behavior is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorRegistry")
            .field("behaviors", &self.entries.len())
            .field("plans", &self.plans.read().len())
            .finish()
    }
}

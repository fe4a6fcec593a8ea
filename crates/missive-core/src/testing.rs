//! Shared fixtures for the unit tests of this crate.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::BoxError;
use crate::handler::{
    NotificationHandler, OpenBehavior, PipelineBehavior, RequestHandler, ResponseBehavior,
};
use crate::message::{ErasedResponse, Notification, Request, RequestView};
use crate::pipeline::Next;

/// Collects an ordered trace of what ran.
#[derive(Debug, Clone, Default)]
pub(crate) struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) struct CreateOrder {
    pub(crate) id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OrderCreated {
    pub(crate) id: u64,
}

impl Request for CreateOrder {
    type Response = OrderCreated;
}

#[derive(Debug, Clone)]
pub(crate) struct DeleteOrder {
    pub(crate) id: u64,
}

impl Request for DeleteOrder {
    type Response = ();
}

#[derive(Debug, Clone)]
pub(crate) struct OrderPlaced {
    pub(crate) id: u64,
}

impl Notification for OrderPlaced {}

// ============================================================================
// Handlers
// ============================================================================

pub(crate) struct CreateOrderHandler {
    recorder: Recorder,
}

impl CreateOrderHandler {
    pub(crate) fn new(recorder: Recorder) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl RequestHandler<CreateOrder> for CreateOrderHandler {
    async fn handle(
        &self,
        request: &CreateOrder,
        _cancel: &CancellationToken,
    ) -> Result<OrderCreated, BoxError> {
        self.recorder.push(format!("Handler:id={}", request.id));
        Ok(OrderCreated { id: request.id })
    }
}

pub(crate) struct DeleteOrderHandler {
    recorder: Recorder,
}

impl DeleteOrderHandler {
    pub(crate) fn new(recorder: Recorder) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl RequestHandler<DeleteOrder> for DeleteOrderHandler {
    async fn handle(
        &self,
        request: &DeleteOrder,
        _cancel: &CancellationToken,
    ) -> Result<(), BoxError> {
        self.recorder.push(format!("Delete:id={}", request.id));
        Ok(())
    }
}

pub(crate) struct RecordingListener {
    label: &'static str,
    recorder: Recorder,
}

impl RecordingListener {
    pub(crate) fn new(label: &'static str, recorder: Recorder) -> Self {
        Self { label, recorder }
    }
}

#[async_trait]
impl NotificationHandler<OrderPlaced> for RecordingListener {
    async fn handle(
        &self,
        notification: &OrderPlaced,
        _cancel: &CancellationToken,
    ) -> Result<(), BoxError> {
        self.recorder
            .push(format!("{}:id={}", self.label, notification.id));
        Ok(())
    }
}

#[derive(Debug, Error)]
#[error("listener {0} failed")]
pub(crate) struct ListenerFailed(pub &'static str);

pub(crate) struct FailingListener {
    label: &'static str,
    recorder: Recorder,
}

impl FailingListener {
    pub(crate) fn new(label: &'static str, recorder: Recorder) -> Self {
        Self { label, recorder }
    }
}

#[async_trait]
impl NotificationHandler<OrderPlaced> for FailingListener {
    async fn handle(
        &self,
        _notification: &OrderPlaced,
        _cancel: &CancellationToken,
    ) -> Result<(), BoxError> {
        self.recorder.push(format!("{}:fail", self.label));
        Err(ListenerFailed(self.label).into())
    }
}

// ============================================================================
// Behaviors
// ============================================================================

/// Records entry and exit around the rest of the chain, for any request.
pub(crate) struct Around {
    label: &'static str,
    recorder: Recorder,
}

impl Around {
    pub(crate) fn new(label: &'static str, recorder: Recorder) -> Self {
        Self { label, recorder }
    }
}

#[async_trait]
impl<R: Request> PipelineBehavior<R> for Around {
    async fn handle(
        &self,
        _request: &R,
        next: Next<'_, R::Response>,
        _cancel: &CancellationToken,
    ) -> Result<R::Response, BoxError> {
        self.recorder.push(format!("{}:enter", self.label));
        let result = next.run().await;
        self.recorder.push(format!("{}:exit", self.label));
        result
    }
}

/// [`Around`], registered per response type.
pub(crate) struct AroundResponse {
    label: &'static str,
    recorder: Recorder,
}

impl AroundResponse {
    pub(crate) fn new(label: &'static str, recorder: Recorder) -> Self {
        Self { label, recorder }
    }
}

#[async_trait]
impl<T: Send + 'static> ResponseBehavior<T> for AroundResponse {
    async fn handle(
        &self,
        _request: RequestView<'_>,
        next: Next<'_, T>,
        _cancel: &CancellationToken,
    ) -> Result<T, BoxError> {
        self.recorder.push(format!("{}:enter", self.label));
        let result = next.run().await;
        self.recorder.push(format!("{}:exit", self.label));
        result
    }
}

/// [`Around`], registered for every request.
pub(crate) struct AroundAny {
    label: &'static str,
    recorder: Recorder,
}

impl AroundAny {
    pub(crate) fn new(label: &'static str, recorder: Recorder) -> Self {
        Self { label, recorder }
    }
}

#[async_trait]
impl OpenBehavior for AroundAny {
    async fn handle(
        &self,
        _request: RequestView<'_>,
        next: Next<'_, ErasedResponse>,
        _cancel: &CancellationToken,
    ) -> Result<ErasedResponse, BoxError> {
        self.recorder.push(format!("{}:enter", self.label));
        let result = next.run().await;
        self.recorder.push(format!("{}:exit", self.label));
        result
    }
}

/// Open behavior that replaces the response with a value of another type.
pub(crate) struct SwapResponse;

#[async_trait]
impl OpenBehavior for SwapResponse {
    async fn handle(
        &self,
        _request: RequestView<'_>,
        next: Next<'_, ErasedResponse>,
        _cancel: &CancellationToken,
    ) -> Result<ErasedResponse, BoxError> {
        next.run().await?;
        Ok(Box::new("swapped"))
    }
}

/// Returns a fixed response without running the rest of the chain.
pub(crate) struct ReturnCached {
    label: &'static str,
    value: OrderCreated,
    recorder: Recorder,
}

impl ReturnCached {
    pub(crate) fn new(label: &'static str, value: OrderCreated, recorder: Recorder) -> Self {
        Self {
            label,
            value,
            recorder,
        }
    }
}

#[async_trait]
impl PipelineBehavior<CreateOrder> for ReturnCached {
    async fn handle(
        &self,
        _request: &CreateOrder,
        _next: Next<'_, OrderCreated>,
        _cancel: &CancellationToken,
    ) -> Result<OrderCreated, BoxError> {
        self.recorder.push(format!("{}:cached", self.label));
        Ok(self.value.clone())
    }
}

#[derive(Debug, Error)]
#[error("rejected by {0}")]
pub(crate) struct Rejected(pub &'static str);

/// Fails without running the rest of the chain.
pub(crate) struct Reject {
    label: &'static str,
    recorder: Recorder,
}

impl Reject {
    pub(crate) fn new(label: &'static str, recorder: Recorder) -> Self {
        Self { label, recorder }
    }
}

#[async_trait]
impl<R: Request> PipelineBehavior<R> for Reject {
    async fn handle(
        &self,
        _request: &R,
        _next: Next<'_, R::Response>,
        _cancel: &CancellationToken,
    ) -> Result<R::Response, BoxError> {
        self.recorder.push(format!("{}:reject", self.label));
        Err(Rejected(self.label).into())
    }
}

//! Orders Example
//!
//! Walks through the two dispatch styles of the Missive mediator using a
//! small order-processing domain.
//!
//! # Requests
//!
//! `CreateOrder` travels through every behavior that applies to it, in
//! registration order, before reaching its single handler:
//!
//! ```text
//! Timing (open) ──▶ Logging (CreateOrder) ──▶ Validation (CreateOrder)
//!     ──▶ Audit (response = OrderCreated) ──▶ CreateOrderHandler
//! ```
//!
//! # Notifications
//!
//! `OrderPlaced` is delivered to every listener at once. A failing listener
//! does not stop the others; the publish call reports every failure together.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package orders
//! ```

use std::time::Instant;

use anyhow::Result;
use missive::core::ErasedResponse;
use missive::prelude::*;
use tracing::{error, info, warn};

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug)]
struct OrderCreated {
    id: u64,
}

#[derive(Debug, Request)]
#[request(response = "OrderCreated", name = "orders.create", crate = "missive::core")]
struct CreateOrder {
    id: u64,
}

#[derive(Debug, Request)]
#[request(name = "orders.cancel", crate = "missive::core")]
struct CancelOrder {
    id: u64,
}

#[derive(Debug, Notification)]
#[notification(name = "orders.placed", crate = "missive::core")]
struct OrderPlaced {
    id: u64,
}

#[derive(Debug, thiserror::Error)]
enum OrderError {
    #[error("order id must not be zero")]
    InvalidId,
    #[error("search index for order {0} is unavailable")]
    IndexUnavailable(u64),
}

// ============================================================================
// Handlers
// ============================================================================

struct CreateOrderHandler;

#[async_trait]
impl RequestHandler<CreateOrder> for CreateOrderHandler {
    async fn handle(
        &self,
        request: &CreateOrder,
        _cancel: &CancellationToken,
    ) -> Result<OrderCreated, BoxError> {
        info!(id = request.id, "Creating order");
        Ok(OrderCreated { id: request.id })
    }
}

struct CancelOrderHandler;

#[async_trait]
impl RequestHandler<CancelOrder> for CancelOrderHandler {
    async fn handle(
        &self,
        request: &CancelOrder,
        _cancel: &CancellationToken,
    ) -> Result<(), BoxError> {
        info!(id = request.id, "Cancelling order");
        Ok(())
    }
}

struct SendReceipt;

#[async_trait]
impl NotificationHandler<OrderPlaced> for SendReceipt {
    async fn handle(
        &self,
        event: &OrderPlaced,
        _cancel: &CancellationToken,
    ) -> Result<(), BoxError> {
        info!(id = event.id, "Receipt sent");
        Ok(())
    }
}

struct UpdateSearchIndex;

#[async_trait]
impl NotificationHandler<OrderPlaced> for UpdateSearchIndex {
    async fn handle(
        &self,
        event: &OrderPlaced,
        _cancel: &CancellationToken,
    ) -> Result<(), BoxError> {
        Err(OrderError::IndexUnavailable(event.id).into())
    }
}

// ============================================================================
// Behaviors
// ============================================================================

/// Times every request passing through the mediator.
struct Timing;

#[async_trait]
impl OpenBehavior for Timing {
    async fn handle(
        &self,
        request: RequestView<'_>,
        next: Next<'_, ErasedResponse>,
        _cancel: &CancellationToken,
    ) -> Result<ErasedResponse, BoxError> {
        let started = Instant::now();
        let result = next.run().await;
        info!(request = request.name(), elapsed = ?started.elapsed(), "Request finished");
        result
    }
}

struct Logging;

#[async_trait]
impl PipelineBehavior<CreateOrder> for Logging {
    async fn handle(
        &self,
        request: &CreateOrder,
        next: Next<'_, OrderCreated>,
        _cancel: &CancellationToken,
    ) -> Result<OrderCreated, BoxError> {
        info!(id = request.id, "Logging: before");
        let response = next.run().await;
        info!(ok = response.is_ok(), "Logging: after");
        response
    }
}

struct Validation;

#[async_trait]
impl PipelineBehavior<CreateOrder> for Validation {
    async fn handle(
        &self,
        request: &CreateOrder,
        next: Next<'_, OrderCreated>,
        _cancel: &CancellationToken,
    ) -> Result<OrderCreated, BoxError> {
        if request.id == 0 {
            return Err(OrderError::InvalidId.into());
        }
        next.run().await
    }
}

/// Applies to every request that answers with `OrderCreated`.
struct Audit;

#[async_trait]
impl ResponseBehavior<OrderCreated> for Audit {
    async fn handle(
        &self,
        request: RequestView<'_>,
        next: Next<'_, OrderCreated>,
        _cancel: &CancellationToken,
    ) -> Result<OrderCreated, BoxError> {
        let created = next.run().await?;
        info!(request = request.name(), id = created.id, "Audit: order recorded");
        Ok(created)
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let mediator = MediatorBuilder::new()
        .load_config(ConfigLoader::new().search_path(env!("CARGO_MANIFEST_DIR")))?
        .init_logging()
        .open_behavior_instance(Timing)
        .behavior::<CreateOrder, _, _>(|_| Logging)
        .behavior::<CreateOrder, _, _>(|_| Validation)
        .response_behavior::<OrderCreated, _, _>(|_| Audit)
        .request_handler::<CreateOrder, _, _>(|_| CreateOrderHandler)
        .request_handler_instance::<CancelOrder, _>(CancelOrderHandler)
        .notification_handler::<OrderPlaced, _, _>(|_| SendReceipt)
        .notification_handler::<OrderPlaced, _, _>(|_| UpdateSearchIndex)
        .build()?;

    let cancel = CancellationToken::new();

    // ========================================================================
    // Requests
    // ========================================================================

    let created = mediator.send(CreateOrder { id: 7 }, &cancel).await?;
    info!(?created, "Order created");

    match mediator.send(CreateOrder { id: 0 }, &cancel).await {
        Ok(created) => warn!(?created, "Invalid order was accepted"),
        Err(e) => match e.downcast_ref::<OrderError>() {
            Some(OrderError::InvalidId) => info!("Invalid order rejected by validation"),
            _ => error!("Unexpected failure: {e}"),
        },
    }

    mediator.send_void(CancelOrder { id: 7 }, &cancel).await?;

    // ========================================================================
    // Notifications
    // ========================================================================

    if let Err(e) = mediator.publish(OrderPlaced { id: 7 }, &cancel).await {
        warn!(error = %e, "Some order listeners failed");
    }

    Ok(())
}

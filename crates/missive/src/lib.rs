//! # Missive
//!
//! An in-process mediator for Rust applications.
//!
//! ## Overview
//!
//! Callers never talk to handlers directly. They hand a message to the
//! [`Mediator`](core::Mediator), which routes it:
//!
//! - a **request** goes to exactly one handler, through an ordered chain of
//!   pipeline behaviors (logging, validation, transactions, caching, ...)
//! - a **notification** goes to every registered handler, concurrently, and
//!   the publish call waits for all of them
//!
//! ```text
//!                ┌──────────┐   ┌──────────────────────────────────────────┐
//! send(req)  ───▶│ Mediator │──▶│ Logging ──▶ Validation ──▶ Handler       │
//!                │          │   └──────────────────────────────────────────┘
//! publish(n) ───▶│          │──▶ Receipt ║ Audit ║ Search   (all settle)
//!                └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use missive::prelude::*;
//!
//! #[derive(Request)]
//! #[request(response = "OrderCreated", crate = "missive::core")]
//! struct CreateOrder {
//!     id: u64,
//! }
//!
//! struct CreateOrderHandler;
//!
//! #[async_trait]
//! impl RequestHandler<CreateOrder> for CreateOrderHandler {
//!     async fn handle(
//!         &self,
//!         request: &CreateOrder,
//!         _cancel: &CancellationToken,
//!     ) -> Result<OrderCreated, BoxError> {
//!         Ok(OrderCreated { id: request.id })
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mediator = MediatorBuilder::new()
//!         .init_logging()
//!         .request_handler::<CreateOrder, _, _>(|_| CreateOrderHandler)
//!         .build()?;
//!
//!     let created = mediator
//!         .send(CreateOrder { id: 7 }, &CancellationToken::new())
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `macros`: `#[derive(Request)]` and `#[derive(Notification)]` (default).
//!   The derives refer to `::missive_core` unless told otherwise; through
//!   this crate, pass `crate = "missive::core"`.
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use missive_core as core;
pub use missive_runtime as runtime;

#[cfg(feature = "macros")]
pub use missive_macros::{Notification, Request};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use missive::prelude::*;
/// ```
pub mod prelude {
    // Composition root
    pub use missive_runtime::{ConfigLoader, MediatorBuilder, MissiveConfig};

    // Dispatch
    pub use missive_core::prelude::*;
    pub use missive_core::{CallScope, DispatchResult};

    // Derives
    #[cfg(feature = "macros")]
    pub use missive_macros::{Notification, Request};
}

#[cfg(all(test, feature = "macros"))]
mod tests {
    use tokio_test::assert_ok;

    use crate::prelude::*;

    #[derive(Debug, PartialEq)]
    struct Receipt(u64);

    #[derive(Request)]
    #[request(response = "Receipt", name = "shop.checkout", crate = "crate::core")]
    struct Checkout {
        cart: u64,
    }

    #[derive(Request)]
    #[request(crate = "crate::core")]
    struct EmptyCart;

    #[derive(Notification)]
    #[notification(crate = "crate::core")]
    struct CartEmptied;

    struct CheckoutHandler;

    #[async_trait]
    impl RequestHandler<Checkout> for CheckoutHandler {
        async fn handle(
            &self,
            request: &Checkout,
            _cancel: &CancellationToken,
        ) -> Result<Receipt, BoxError> {
            Ok(Receipt(request.cart))
        }
    }

    struct EmptyCartHandler;

    #[async_trait]
    impl RequestHandler<EmptyCart> for EmptyCartHandler {
        async fn handle(
            &self,
            _request: &EmptyCart,
            _cancel: &CancellationToken,
        ) -> Result<(), BoxError> {
            Ok(())
        }
    }

    #[test]
    fn test_derived_names() {
        assert_eq!(<Checkout as crate::core::Request>::name(), "shop.checkout");
        assert!(<EmptyCart as crate::core::Request>::name().ends_with("EmptyCart"));
        assert!(<CartEmptied as crate::core::Notification>::name().ends_with("CartEmptied"));
    }

    #[tokio::test]
    async fn test_derived_messages_dispatch() {
        let mediator = assert_ok!(
            MediatorBuilder::new()
                .request_handler::<Checkout, _, _>(|_| CheckoutHandler)
                .request_handler_instance::<EmptyCart, _>(EmptyCartHandler)
                .build()
        );
        let cancel = CancellationToken::new();

        let receipt = assert_ok!(mediator.send(Checkout { cart: 3 }, &cancel).await);
        assert_eq!(receipt, Receipt(3));
        assert_ok!(mediator.send_void(EmptyCart, &cancel).await);
        assert_ok!(mediator.publish(CartEmptied, &cancel).await);
    }
}

//! Procedural macros for the Missive mediator.
//!
//! This crate provides:
//!
//! - `#[derive(Request)]` - implements `Request` with a declared response type
//! - `#[derive(Notification)]` - implements `Notification`
//!
//! # Example
//!
//! ```rust,ignore
//! use missive_macros::{Notification, Request};
//!
//! #[derive(Request)]
//! #[request(response = "OrderCreated")]
//! pub struct CreateOrder {
//!     pub id: u64,
//! }
//!
//! #[derive(Notification)]
//! #[notification(name = "orders.placed")]
//! pub struct OrderPlaced {
//!     pub id: u64,
//! }
//! ```

mod message;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `Request` for a struct or enum.
///
/// # Attributes
///
/// - `#[request(response = "...")]` - The response type (default: `()`)
/// - `#[request(name = "...")]` - Override the diagnostic name
/// - `#[request(crate = "...")]` - Path to the core crate (default:
///   `::missive_core`)
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Request)]
/// #[request(response = "Vec<Order>", name = "orders.list")]
/// pub struct ListOrders;
///
/// // Fire-and-forget
/// #[derive(Request)]
/// pub struct DeleteOrder {
///     pub id: u64,
/// }
/// ```
#[proc_macro_derive(Request, attributes(request))]
pub fn derive_request(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match message::derive_request(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Derives `Notification` for a struct or enum.
///
/// # Attributes
///
/// - `#[notification(name = "...")]` - Override the diagnostic name
/// - `#[notification(crate = "...")]` - Path to the core crate (default:
///   `::missive_core`)
#[proc_macro_derive(Notification, attributes(notification))]
pub fn derive_notification(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match message::derive_notification(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

//! `Request` / `Notification` derive implementation.
//!
//! # Struct-level attributes
//!
//! | Attribute | Key | Example | Description |
//! |-----------|-----|---------|-------------|
//! | `#[request(...)]` | `response` | `"OrderCreated"` | Response type (default `()`) |
//! | both | `name` | `"orders.create"` | Diagnostic name (default: Rust type name) |
//! | both | `crate` | `"::missive::core"` | Path to the core crate |

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, LitStr, Path, Type, spanned::Spanned};

// ============================================================================
// Attribute structures
// ============================================================================

#[derive(Default)]
struct MessageAttrs {
    response: Option<Type>,
    name: Option<LitStr>,
    krate: Option<Path>,
}

impl MessageAttrs {
    fn krate(&self) -> TokenStream {
        match &self.krate {
            Some(path) => quote! { #path },
            None => quote! { ::missive_core },
        }
    }

    fn name_fn(&self) -> TokenStream {
        match &self.name {
            Some(name) => quote! {
                fn name() -> &'static str {
                    #name
                }
            },
            None => quote! {},
        }
    }
}

// ============================================================================
// Entry points
// ============================================================================

pub fn derive_request(input: &DeriveInput) -> syn::Result<TokenStream> {
    reject_unions(input, "Request")?;
    let attrs = parse_attrs(&input.attrs, "request", true)?;

    let ident = &input.ident;
    let krate = attrs.krate();
    let name_fn = attrs.name_fn();
    let response = match &attrs.response {
        Some(ty) => quote! { #ty },
        None => quote! { () },
    };
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #krate::Request for #ident #ty_generics #where_clause {
            type Response = #response;

            #name_fn
        }
    })
}

pub fn derive_notification(input: &DeriveInput) -> syn::Result<TokenStream> {
    reject_unions(input, "Notification")?;
    let attrs = parse_attrs(&input.attrs, "notification", false)?;

    let ident = &input.ident;
    let krate = attrs.krate();
    let name_fn = attrs.name_fn();
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics #krate::Notification for #ident #ty_generics #where_clause {
            #name_fn
        }
    })
}

fn reject_unions(input: &DeriveInput, derive: &str) -> syn::Result<()> {
    match input.data {
        Data::Union(_) => Err(syn::Error::new(
            input.span(),
            format!("{derive} cannot be derived for unions"),
        )),
        Data::Struct(_) | Data::Enum(_) => Ok(()),
    }
}

// ============================================================================
// Attribute parsing
// ============================================================================

fn parse_attrs(
    attrs: &[Attribute],
    ident: &str,
    allow_response: bool,
) -> syn::Result<MessageAttrs> {
    let mut parsed = MessageAttrs::default();

    for attr in attrs.iter().filter(|attr| attr.path().is_ident(ident)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                parsed.name = Some(meta.value()?.parse::<LitStr>()?);
            } else if meta.path.is_ident("crate") {
                parsed.krate = Some(meta.value()?.parse::<LitStr>()?.parse::<Path>()?);
            } else if allow_response && meta.path.is_ident("response") {
                parsed.response = Some(meta.value()?.parse::<LitStr>()?.parse::<Type>()?);
            } else {
                return Err(meta.error(format!("unsupported #[{ident}] attribute")));
            }
            Ok(())
        })?;
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use syn::parse_quote;

    use super::*;

    #[test]
    fn test_request_expansion() {
        let input: DeriveInput = parse_quote! {
            #[request(response = "OrderCreated", name = "orders.create", crate = "missive::core")]
            struct CreateOrder {
                id: u64,
            }
        };

        let expanded = derive_request(&input).unwrap().to_string();

        assert!(expanded.contains("impl missive :: core :: Request for CreateOrder"));
        assert!(expanded.contains("type Response = OrderCreated"));
        assert!(expanded.contains("\"orders.create\""));
    }

    #[test]
    fn test_unions_are_rejected() {
        let input: DeriveInput = parse_quote! {
            union Raw {
                int: u32,
                float: f32,
            }
        };

        let err = derive_request(&input).unwrap_err();
        assert_eq!(err.to_string(), "Request cannot be derived for unions");
        assert!(derive_notification(&input).is_err());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let input: DeriveInput = parse_quote! {
            #[request(bogus = "x")]
            struct Ping;
        };
        let err = derive_request(&input).unwrap_err();
        assert_eq!(err.to_string(), "unsupported #[request] attribute");

        // `response` only makes sense on requests.
        let input: DeriveInput = parse_quote! {
            #[notification(response = "()")]
            struct Pinged;
        };
        assert!(derive_notification(&input).is_err());
    }
}

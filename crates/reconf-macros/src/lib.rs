//! Procedural macros for reconf.
//!
//! This crate provides:
//!
//! - `#[derive(Config)]` - Generates the member catalog and introspection
//!   implementations for a configuration struct
//!
//! ```rust,ignore
//! use reconf::prelude::*;
//!
//! #[derive(Config, Clone, Default)]
//! #[config(name = "ServerSettings", scope = "server_shared")]
//! pub struct ServerSettings {
//!     #[config(reload_required)]
//!     pub port: u16,
//!     pub motd: String,
//!     #[config(ignore)]
//!     pub last_saved: u64,
//! }
//! ```

mod config;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `Inspect`, `Aggregate` and `Configurable` for a struct with named
/// fields.
///
/// # Attributes
///
/// - `#[config(name = "...")]` - Override the local name (default: struct name)
/// - `#[config(scope = "...")]` - `client_only`, `server_only` or `server_shared`
/// - `#[config(label = "...")]` - Display label, on the struct or a field
/// - `#[config(reload_required)]` - Differences require a full reload
/// - `#[config(ignore)]` - Excluded from diffing, equality and persistence
/// - `#[config(native_eq)]` - Struct-level: compare with `PartialEq`
/// - `#[config(skip)]` - Field-level: leave the field out of the catalog
///
/// Every cataloged field type must implement `Inspect`.
#[proc_macro_derive(Config, attributes(config))]
pub fn derive_config(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match config::derive_config(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

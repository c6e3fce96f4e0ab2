#![allow(unreachable_pub)]
#![allow(clippy::needless_pass_by_value)]

//! # Macros
//!
//! Procedural macros shared by the flag engine crates.
//!
//! Every infrastructure and feature crate declares its error enum through
//! [`macro@vexil_error`], so errors look and behave the same across the
//! workspace: a `thiserror` display, an optional context string, and a
//! `.context(...)` extension on foreign results.

mod macros;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Attribute macro for declaring a crate's error enum.
///
/// # Injected items
///
/// * `#[derive(Debug, thiserror::Error)]` unless already present.
/// * A `<Name>Ext` trait with `.context(..)` for `Result<T, Name>`, plus an
///   implementation for `Result<T, Source>` for every variant wrapping a
///   foreign `source` error.
/// * `From<Source>` for those variants, so `?` works on upstream errors.
/// * `From<&'static str>` and `From<String>` when an `Internal` variant exists.
/// * A module-private `format_context` helper used in `#[error(..)]` strings.
///
/// # Requirements
///
/// 1. Applied to an **enum** with named-field variants only.
/// 2. A `context` field, when present, must be `Option<Cow<'static, str>>`.
/// 3. Variants wrapping a foreign error (a `source` field or a field marked
///    `#[source]`/`#[from]`) must also carry `context`.
///
/// # Example
///
/// ```rust,ignore
/// use std::borrow::Cow;
///
/// #[vexil_derive::vexil_error]
/// pub enum RegistryError {
///     #[error("Malformed registry document{}: {source}", format_context(.context))]
///     Parse { source: serde_json::Error, context: Option<Cow<'static, str>> },
///
///     #[error("Internal registry error{}: {message}", format_context(.context))]
///     Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
/// }
///
/// fn parse(raw: &str) -> Result<Document, RegistryError> {
///     serde_json::from_str(raw).context("Parsing flag registry")
/// }
/// ```
#[proc_macro_attribute]
pub fn vexil_error(_args: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as DeriveInput);
    macros::error::expand(input).into()
}

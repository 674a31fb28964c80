//! Procedural macros for the stowage object-storage client.
//!
//! This crate provides `#[derive(Options)]`, which maps the fields of an options
//! struct to their wire location: query string, header or request body.

mod options_derive;

use proc_macro::TokenStream;

/// Derive macro for call options.
///
/// Generates an implementation of `stowage::EncodeOptions`. Every field value is
/// encoded through `stowage::WireValue`, so field types can customize their
/// representation.
///
/// # Struct Attributes
///
/// - `#[wire(rename_all = "...")]` - Rename all fields using a case convention
///
/// Supported case conventions:
/// - `lowercase`, `UPPERCASE`
/// - `camelCase`, `PascalCase`
/// - `snake_case`, `SCREAMING_SNAKE_CASE`
/// - `kebab-case`, `SCREAMING-KEBAB-CASE`
///
/// # Field Attributes
///
/// - `#[wire(query)]` or `#[wire(query = "name")]` - Query parameter (the default location)
/// - `#[wire(header)]` or `#[wire(header = "name")]` - Header
/// - `#[wire(body = "xml")]` or `#[wire(body = "json")]` - Request body (at most one field)
/// - `#[wire(rename = "name")]` - Wire name, overrides `rename_all`
/// - `#[wire(json)]` - Transmit the value as one JSON document
/// - `#[wire(omit_empty)]` - Skip zero values (empty strings, `0`, `false`, `None`)
/// - `#[wire(skip)]` - Never encode the field
///
/// `Option<T>` fields are absent when `None`; `Some(v)` is always transmitted.
///
/// # Example
///
/// ```ignore
/// use stowage::Options;
///
/// #[derive(Options)]
/// #[wire(rename_all = "kebab-case")]
/// struct ImageRecognitionOptions {
///     #[wire(query = "ci-process")]
///     ci_process: String,
///     detect_type: String,           // becomes "detect-type"
///     #[wire(omit_empty)]
///     biz_type: String,              // absent when empty
///     large_image_detect: Option<bool>,
///     #[wire(header = "x-cos-traffic-limit", omit_empty)]
///     traffic_limit: u64,
/// }
/// ```
#[proc_macro_derive(Options, attributes(wire))]
pub fn derive_options(input: TokenStream) -> TokenStream {
    options_derive::expand_options_derive(input.into())
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

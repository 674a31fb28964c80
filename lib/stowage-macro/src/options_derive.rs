//! Options derive macro implementation.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{DeriveInput, Fields, Type, parse2};

/// Struct-level options parsed from `#[wire(...)]` attributes.
#[derive(Debug, Clone, Default)]
struct WireStructOptions {
    /// Rename all fields using the given case convention.
    rename_all: Option<RenameRule>,
}

/// Case conversion rules for `rename_all`.
#[derive(Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
enum RenameRule {
    /// `lowercase`
    LowerCase,
    /// `UPPERCASE`
    UpperCase,
    /// `camelCase`
    CamelCase,
    /// `PascalCase`
    PascalCase,
    /// `snake_case`
    SnakeCase,
    /// `SCREAMING_SNAKE_CASE`
    ScreamingSnakeCase,
    /// `kebab-case`
    KebabCase,
    /// `SCREAMING-KEBAB-CASE`
    ScreamingKebabCase,
}

impl RenameRule {
    /// Parse a rename rule from a string.
    fn parse(s: &str) -> Option<Self> {
        match s {
            "lowercase" => Some(Self::LowerCase),
            "UPPERCASE" => Some(Self::UpperCase),
            "camelCase" => Some(Self::CamelCase),
            "PascalCase" => Some(Self::PascalCase),
            "snake_case" => Some(Self::SnakeCase),
            "SCREAMING_SNAKE_CASE" => Some(Self::ScreamingSnakeCase),
            "kebab-case" => Some(Self::KebabCase),
            "SCREAMING-KEBAB-CASE" => Some(Self::ScreamingKebabCase),
            _ => None,
        }
    }

    /// Apply the rename rule to a field name.
    fn apply(self, name: &str) -> String {
        match self {
            Self::LowerCase => name.to_lowercase(),
            Self::UpperCase => name.to_uppercase(),
            Self::CamelCase => to_camel_case(name),
            Self::PascalCase => to_pascal_case(name),
            Self::SnakeCase => to_snake_case(name),
            Self::ScreamingSnakeCase => to_snake_case(name).to_uppercase(),
            Self::KebabCase => to_snake_case(name).replace('_', "-"),
            Self::ScreamingKebabCase => to_snake_case(name).to_uppercase().replace('_', "-"),
        }
    }
}

/// Convert a string to `snake_case`.
fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_lowercase().next().unwrap_or(c));
        } else {
            result.push(c);
        }
    }
    result
}

/// Convert a string to `camelCase`.
fn to_camel_case(s: &str) -> String {
    let mut result = String::new();
    let mut capitalize_next = false;
    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_uppercase().next().unwrap_or(c));
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

/// Convert a string to `PascalCase`.
fn to_pascal_case(s: &str) -> String {
    let camel = to_camel_case(s);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Where a field goes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Location {
    #[default]
    Query,
    Header,
    Body(BodyKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Xml,
    Json,
}

/// Field options parsed from `#[wire(...)]` attributes.
#[derive(Debug, Clone, Default)]
struct WireFieldOptions {
    location: Location,
    /// Explicit wire name.
    rename: Option<String>,
    /// Serialize the value as one JSON parameter.
    json: bool,
    /// Skip zero values.
    omit_empty: bool,
    /// Never encode this field.
    skip: bool,
}

/// Expand the `#[derive(Options)]` macro.
pub fn expand_options_derive(input: TokenStream) -> syn::Result<TokenStream> {
    let input: DeriveInput = parse2(input)?;
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let struct_options = parse_wire_struct_options(&input.attrs)?;

    let fields = match &input.data {
        syn::Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Options derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input,
                "Options derive only supports structs",
            ));
        }
    };

    let mut query_handlers = Vec::new();
    let mut header_handlers = Vec::new();
    let mut body_handler: Option<TokenStream> = None;

    for field in fields {
        let Some(field_name) = field.ident.as_ref() else {
            continue;
        };
        let options = parse_wire_field_options(field)?;
        if options.skip {
            continue;
        }

        // Explicit name > rename_all > field name
        let key = if let Some(ref rename) = options.rename {
            rename.clone()
        } else if let Some(rule) = struct_options.rename_all {
            rule.apply(&field_name.to_string())
        } else {
            field_name.to_string()
        };

        match options.location {
            Location::Query => {
                query_handlers.push(generate_field_handler(field_name, &field.ty, &key, &options));
            }
            Location::Header => {
                header_handlers.push(generate_field_handler(field_name, &field.ty, &key, &options));
            }
            Location::Body(kind) => {
                if body_handler.is_some() {
                    return Err(syn::Error::new_spanned(
                        field,
                        "only one field can be the request body",
                    ));
                }
                body_handler = Some(generate_body_handler(field_name, &field.ty, kind));
            }
        }
    }

    let body_fn = body_handler.map(|handler| {
        quote! {
            fn encode_body(&self) -> ::stowage::Result<::std::option::Option<::stowage::Payload>> {
                #handler
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::stowage::EncodeOptions for #name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn encode_query(&self, out: &mut ::stowage::ParamMap) -> ::stowage::Result<()> {
                #(#query_handlers)*
                ::std::result::Result::Ok(())
            }

            #[allow(unused_variables)]
            fn encode_headers(&self, out: &mut ::stowage::ParamMap) -> ::stowage::Result<()> {
                #(#header_handlers)*
                ::std::result::Result::Ok(())
            }

            #body_fn
        }
    })
}

/// Parse struct-level options from `#[wire(...)]` attributes.
fn parse_wire_struct_options(attrs: &[syn::Attribute]) -> syn::Result<WireStructOptions> {
    let mut options = WireStructOptions::default();

    for attr in attrs {
        if !attr.path().is_ident("wire") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                let value: syn::LitStr = meta.value()?.parse()?;
                let rule = RenameRule::parse(&value.value()).ok_or_else(|| {
                    syn::Error::new_spanned(
                        &value,
                        format!(
                            "unknown rename_all value: \"{}\". Expected one of: \
                             lowercase, UPPERCASE, camelCase, PascalCase, \
                             snake_case, SCREAMING_SNAKE_CASE, kebab-case, SCREAMING-KEBAB-CASE",
                            value.value()
                        ),
                    )
                })?;
                options.rename_all = Some(rule);
                Ok(())
            } else {
                Err(meta.error("unknown wire attribute, expected `rename_all`"))
            }
        })?;
    }

    Ok(options)
}

/// Parse field options from `#[wire(...)]` attributes.
fn parse_wire_field_options(field: &syn::Field) -> syn::Result<WireFieldOptions> {
    let mut options = WireFieldOptions::default();
    let mut location_set = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("wire") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            let location = if meta.path.is_ident("query") {
                Some(Location::Query)
            } else if meta.path.is_ident("header") {
                Some(Location::Header)
            } else {
                None
            };

            if let Some(location) = location {
                if location_set {
                    return Err(meta.error("a field has a single wire location"));
                }
                location_set = true;
                options.location = location;
                if meta.input.peek(syn::Token![=]) {
                    let value: syn::LitStr = meta.value()?.parse()?;
                    options.rename = Some(value.value());
                }
            } else if meta.path.is_ident("body") {
                if location_set {
                    return Err(meta.error("a field has a single wire location"));
                }
                location_set = true;
                let value: syn::LitStr = meta.value()?.parse()?;
                let kind = match value.value().as_str() {
                    "xml" => BodyKind::Xml,
                    "json" => BodyKind::Json,
                    other => {
                        return Err(syn::Error::new_spanned(
                            &value,
                            format!(
                                "unknown body format: \"{other}\". Expected \"xml\" or \"json\""
                            ),
                        ));
                    }
                };
                options.location = Location::Body(kind);
            } else if meta.path.is_ident("rename") {
                let value: syn::LitStr = meta.value()?.parse()?;
                options.rename = Some(value.value());
            } else if meta.path.is_ident("json") {
                options.json = true;
            } else if meta.path.is_ident("omit_empty") {
                options.omit_empty = true;
            } else if meta.path.is_ident("skip") {
                options.skip = true;
            } else {
                return Err(meta.error(
                    "unknown wire attribute, expected one of: \
                     query, header, body, rename, json, omit_empty, skip",
                ));
            }
            Ok(())
        })?;
    }

    Ok(options)
}

/// Generate code for encoding a single query or header field.
fn generate_field_handler(
    field_name: &syn::Ident,
    field_ty: &Type,
    key: &str,
    options: &WireFieldOptions,
) -> TokenStream {
    if options.json {
        // JSON fields: `None` is absent, `Some(v)` is one JSON document
        return if is_option_type(field_ty) {
            quote! {
                if let ::std::option::Option::Some(value) = &self.#field_name {
                    ::stowage::WireValue::encode_value(&::stowage::Json(value), #key, out)?;
                }
            }
        } else {
            quote! {
                ::stowage::WireValue::encode_value(&::stowage::Json(&self.#field_name), #key, out)?;
            }
        };
    }

    if options.omit_empty {
        quote! {
            if !::stowage::WireValue::is_zero(&self.#field_name) {
                ::stowage::WireValue::encode_value(&self.#field_name, #key, out)?;
            }
        }
    } else {
        quote! {
            ::stowage::WireValue::encode_value(&self.#field_name, #key, out)?;
        }
    }
}

/// Generate the body of `encode_body` for the body field.
fn generate_body_handler(field_name: &syn::Ident, field_ty: &Type, kind: BodyKind) -> TokenStream {
    let constructor = match kind {
        BodyKind::Xml => quote! { ::stowage::Payload::xml },
        BodyKind::Json => quote! { ::stowage::Payload::json },
    };

    if is_option_type(field_ty) {
        quote! {
            match &self.#field_name {
                ::std::option::Option::Some(value) => {
                    #constructor(value).map(::std::option::Option::Some)
                }
                ::std::option::Option::None => ::std::result::Result::Ok(::std::option::Option::None),
            }
        }
    } else {
        quote! {
            #constructor(&self.#field_name).map(::std::option::Option::Some)
        }
    }
}

/// Check if a type is `Option<T>`.
fn is_option_type(ty: &Type) -> bool {
    matches!(ty, Type::Path(type_path)
        if type_path.path.segments.last()
            .is_some_and(|seg| seg.ident == "Option"))
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::*;

    #[test]
    fn rename_rules() {
        check!(RenameRule::KebabCase.apply("detect_type") == "detect-type");
        check!(RenameRule::CamelCase.apply("card_side") == "cardSide");
        check!(RenameRule::PascalCase.apply("card_side") == "CardSide");
        check!(RenameRule::ScreamingSnakeCase.apply("card_side") == "CARD_SIDE");
        check!(RenameRule::parse("kebab_case").is_none());
    }

    #[test]
    fn expands_query_header_and_body() {
        let input = quote! {
            #[wire(rename_all = "kebab-case")]
            struct PutOrigin {
                detect_type: String,
                #[wire(header = "x-cos-traffic-limit", omit_empty)]
                traffic_limit: u64,
                #[wire(body = "xml")]
                rules: OriginRules,
                #[wire(skip)]
                internal: u8,
            }
        };

        let output = expand_options_derive(input).expect("expand").to_string();
        check!(output.contains("EncodeOptions for PutOrigin"));
        check!(output.contains("\"detect-type\""));
        check!(output.contains("\"x-cos-traffic-limit\""));
        check!(output.contains("Payload :: xml"));
        check!(!output.contains("internal"));
    }

    #[test]
    fn json_option_field_is_guarded() {
        let input = quote! {
            struct IdCardOcr {
                #[wire(query = "Config", json)]
                config: Option<OcrConfig>,
            }
        };

        let output = expand_options_derive(input).expect("expand").to_string();
        check!(output.contains("Json (value)"));
        check!(output.contains("\"Config\""));
    }

    #[test]
    fn rejects_two_bodies() {
        let input = quote! {
            struct Twice {
                #[wire(body = "xml")]
                a: A,
                #[wire(body = "json")]
                b: B,
            }
        };

        let_assert!(Err(err) = expand_options_derive(input));
        check!(err.to_string().contains("only one field"));
    }

    #[test]
    fn rejects_unknown_attributes() {
        let input = quote! {
            struct Unknown {
                #[wire(path)]
                a: String,
            }
        };
        check!(expand_options_derive(input).is_err());

        let input = quote! {
            struct BadBody {
                #[wire(body = "yaml")]
                a: String,
            }
        };
        check!(expand_options_derive(input).is_err());
    }

    #[test]
    fn rejects_tuple_structs() {
        let input = quote! { struct Tuple(String); };
        check!(expand_options_derive(input).is_err());
    }
}

//! Procedural macros for [`structbind`](https://docs.rs/structbind).

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput, ItemFn};

mod enumeration;
mod record;
mod traced;

/// Derive `Record` (and the conversions a record field needs) for a struct with named fields.
///
/// # Attributes
///
/// ```ignore
/// #[derive(Record)]
/// #[record(bitwise, depth = 2, reverse, aligned = 4, union, union = "field", container)]
/// struct Name {
///     #[field(codec = EXPR)]
///     plain: T,
///     #[field(record)]                  // or `record = Type`
///     header: Header,
///     #[field(nested = Type, codec = EXPR)]
///     items: Vec<Type>,
///     #[field(enumeration = Type, codec = EXPR)]
///     mode: EnumValue<Type>,
///     #[field(typed = Type, codec = EXPR, doc = "...", parsed = EXPR, meta(key = 1))]
///     other: U,
/// }
/// ```
///
/// Every field needs a `#[field(...)]` attribute. `#[record(...)]` is optional; its keys map
/// one-to-one onto `RecordOptions`, and `container` additionally derives `Lookup`.
#[proc_macro_derive(Record, attributes(record, field))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    record::expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derive `Enumeration` for a fieldless enum.
///
/// Member values are the variant discriminants (explicit or implicit).
#[proc_macro_derive(Enumeration)]
pub fn derive_enumeration(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    enumeration::expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Run a test with a `tracing` subscriber that writes to the test output.
///
/// The level defaults to `DEBUG` and can be set with `#[test_traced("INFO")]` or
/// `#[test_traced(level = "INFO")]`.
#[proc_macro_attribute]
pub fn test_traced(attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemFn);
    traced::expand(attr.into(), input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

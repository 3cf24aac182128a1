use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{Ident, ItemFn, LitStr, Result};

const LEVELS: [&str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];

fn parse_level(attr: TokenStream) -> Result<Ident> {
    let mut level = LitStr::new("DEBUG", Span::call_site());
    if !attr.is_empty() {
        if let Ok(lit) = syn::parse2::<LitStr>(attr.clone()) {
            level = lit;
        } else {
            let parser = syn::meta::parser(|meta| {
                if meta.path.is_ident("level") {
                    level = meta.value()?.parse()?;
                    Ok(())
                } else {
                    Err(meta.error("expected `level`"))
                }
            });
            syn::parse::Parser::parse2(parser, attr)?;
        }
    }

    let name = level.value().to_uppercase();
    if !LEVELS.contains(&name.as_str()) {
        return Err(syn::Error::new(
            level.span(),
            format!("unknown level `{}`; expected one of {}", level.value(), LEVELS.join(", ")),
        ));
    }
    Ok(Ident::new(&name, level.span()))
}

pub(crate) fn expand(attr: TokenStream, input: ItemFn) -> Result<TokenStream> {
    let level = parse_level(attr)?;
    let ItemFn {
        attrs,
        vis,
        sig,
        block,
    } = input;

    Ok(quote! {
        #[test]
        #(#attrs)*
        #vis #sig {
            let subscriber = ::structbind_macros::tracing_subscriber::fmt()
                .with_test_writer()
                .with_max_level(::structbind_macros::tracing::Level::#level)
                .with_line_number(true)
                .finish();
            let dispatcher = ::structbind_macros::tracing::Dispatch::new(subscriber);
            ::structbind_macros::tracing::dispatcher::with_default(&dispatcher, || #block)
        }
    })
}

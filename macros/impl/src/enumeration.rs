use proc_macro2::TokenStream;
use quote::quote;
use syn::{ext::IdentExt, Data, DeriveInput, Fields, LitStr, Result};

pub(crate) fn expand(input: DeriveInput) -> Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "enumerations cannot be generic",
        ));
    }
    let Data::Enum(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "`Enumeration` can only be derived for enums",
        ));
    };
    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "enumerations need at least one variant",
        ));
    }
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "enumeration variants cannot carry fields",
            ));
        }
    }

    let ident = &input.ident;
    let name = LitStr::new(&ident.unraw().to_string(), ident.span());
    let variants: Vec<_> = data.variants.iter().map(|v| &v.ident).collect();
    let labels: Vec<_> = variants
        .iter()
        .map(|v| LitStr::new(&v.unraw().to_string(), v.span()))
        .collect();

    Ok(quote! {
        impl ::structbind::Enumeration for #ident {
            const NAME: &'static str = #name;
            const MEMBERS: &'static [(&'static str, i128)] = &[
                #((#labels, Self::#variants as i128),)*
            ];

            fn from_value(value: i128) -> ::core::option::Option<Self> {
                #(
                    if value == Self::#variants as i128 {
                        return ::core::option::Option::Some(Self::#variants);
                    }
                )*
                ::core::option::Option::None
            }

            fn value(self) -> i128 {
                self as i128
            }

            fn name(self) -> &'static str {
                match self {
                    #(Self::#variants => #labels,)*
                }
            }
        }

        impl ::structbind::Declared for #ident {
            fn declared_type() -> ::structbind::DeclaredType {
                ::structbind::DeclaredType::Enumeration(::structbind::EnumType::of::<Self>())
            }
        }

        impl ::structbind::FromMaterialized for #ident {
            fn from_materialized(
                value: ::structbind::Materialized,
            ) -> ::core::result::Result<Self, ::structbind::Error> {
                ::structbind::enum_from_materialized::<Self>(value)
            }
        }

        impl ::structbind::Flatten for #ident {
            fn flatten(&self) -> ::structbind::Value {
                ::structbind::enum_to_value(*self)
            }
        }
    })
}

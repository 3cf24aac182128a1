use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{
    ext::IdentExt, meta::ParseNestedMeta, Data, DeriveInput, Expr, Fields, Ident, Lit, LitInt,
    LitStr, Result, Type,
};

/// Composition options from `#[record(...)]`.
#[derive(Default)]
struct RecordAttrs {
    bitwise: bool,
    depth: Option<LitInt>,
    reverse: bool,
    aligned: Option<LitInt>,
    union: Option<Option<LitStr>>,
    container: bool,
}

impl RecordAttrs {
    fn parse(input: &DeriveInput) -> Result<Self> {
        let mut attrs = Self::default();
        for attr in input.attrs.iter().filter(|a| a.path().is_ident("record")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("bitwise") {
                    attrs.bitwise = true;
                } else if meta.path.is_ident("depth") {
                    attrs.depth = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("reverse") {
                    attrs.reverse = true;
                } else if meta.path.is_ident("aligned") {
                    attrs.aligned = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("union") {
                    let from = if meta.input.peek(syn::Token![=]) {
                        Some(meta.value()?.parse()?)
                    } else {
                        None
                    };
                    attrs.union = Some(from);
                } else if meta.path.is_ident("container") {
                    attrs.container = true;
                } else {
                    return Err(meta.error(
                        "expected one of `bitwise`, `depth`, `reverse`, `aligned`, `union`, `container`",
                    ));
                }
                Ok(())
            })?;
        }
        Ok(attrs)
    }

    fn options(&self) -> TokenStream {
        let mut chain = quote!(::structbind::RecordOptions::new());
        if self.bitwise {
            chain.extend(quote!(.bitwise()));
        }
        if let Some(depth) = &self.depth {
            chain.extend(quote!(.depth(#depth)));
        }
        if self.reverse {
            chain.extend(quote!(.reverse()));
        }
        if let Some(modulus) = &self.aligned {
            chain.extend(quote!(.aligned(#modulus)));
        }
        match &self.union {
            Some(Some(from)) => chain.extend(quote!(
                .union(::structbind::UnionMode::ParseFrom(::std::string::String::from(#from)))
            )),
            Some(None) => chain.extend(quote!(.union(::structbind::UnionMode::FirstMatch))),
            None => {}
        }
        if self.container {
            chain.extend(quote!(.container()));
        }
        chain
    }
}

/// The field form chosen in `#[field(...)]`.
enum Form {
    Codec,
    Record(Option<Type>),
    Nested(Type),
    Enumeration(Type),
    Typed(Type),
}

struct FieldAttrs {
    form: Option<Form>,
    codec: Option<Expr>,
    doc: Option<LitStr>,
    parsed: Option<Expr>,
    meta: Vec<(LitStr, Lit)>,
}

impl FieldAttrs {
    fn set_form(&mut self, meta: &ParseNestedMeta<'_>, form: Form) -> Result<()> {
        if self.form.is_some() {
            return Err(
                meta.error("only one of `record`, `nested`, `enumeration`, `typed` is allowed")
            );
        }
        self.form = Some(form);
        Ok(())
    }

    fn parse(field: &syn::Field, ident: &Ident) -> Result<Self> {
        let mut attrs = Self {
            form: None,
            codec: None,
            doc: None,
            parsed: None,
            meta: Vec::new(),
        };
        let mut found = false;
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("field")) {
            found = true;
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("codec") {
                    attrs.codec = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("record") {
                    let ty = if meta.input.peek(syn::Token![=]) {
                        Some(meta.value()?.parse()?)
                    } else {
                        None
                    };
                    attrs.set_form(&meta, Form::Record(ty))?;
                } else if meta.path.is_ident("nested") {
                    let ty = meta.value()?.parse()?;
                    attrs.set_form(&meta, Form::Nested(ty))?;
                } else if meta.path.is_ident("enumeration") {
                    let ty = meta.value()?.parse()?;
                    attrs.set_form(&meta, Form::Enumeration(ty))?;
                } else if meta.path.is_ident("typed") {
                    let ty = meta.value()?.parse()?;
                    attrs.set_form(&meta, Form::Typed(ty))?;
                } else if meta.path.is_ident("doc") {
                    attrs.doc = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("parsed") {
                    attrs.parsed = Some(meta.value()?.parse()?);
                } else if meta.path.is_ident("meta") {
                    meta.parse_nested_meta(|entry| {
                        let key = entry
                            .path
                            .get_ident()
                            .ok_or_else(|| entry.error("expected a metadata key"))?;
                        let value: Lit = entry.value()?.parse()?;
                        let key = LitStr::new(&key.unraw().to_string(), key.span());
                        attrs.meta.push((key, value));
                        Ok(())
                    })?;
                } else {
                    return Err(meta.error(
                        "expected one of `codec`, `record`, `nested`, `enumeration`, `typed`, `doc`, `parsed`, `meta`",
                    ));
                }
                Ok(())
            })?;
        }
        if !found {
            return Err(syn::Error::new(
                ident.span(),
                "every record field needs a `#[field(...)]` attribute",
            ));
        }

        let record = matches!(attrs.form, Some(Form::Record(_)));
        if let (true, Some(codec)) = (record, &attrs.codec) {
            return Err(syn::Error::new_spanned(
                codec,
                "`record` fields compile their own codec; remove `codec`",
            ));
        }
        if !record && attrs.codec.is_none() {
            return Err(syn::Error::new(
                ident.span(),
                "missing `codec = ...` in `#[field(...)]`",
            ));
        }
        if attrs.form.is_none() {
            attrs.form = Some(Form::Codec);
        }
        Ok(attrs)
    }

    fn spec(&self, name: &LitStr, ty: &Type) -> TokenStream {
        let codec = &self.codec;
        let mut spec = match &self.form {
            Some(Form::Record(Some(record))) => {
                quote!(::structbind::FieldSpec::record::<#record>(#name))
            }
            Some(Form::Record(None)) => quote!(::structbind::FieldSpec::record::<#ty>(#name)),
            Some(Form::Nested(record)) => quote!(::structbind::FieldSpec::nested(
                ::structbind::DeclaredType::Record(::structbind::RecordType::of::<#record>()),
                #name,
                #codec,
            )?),
            Some(Form::Enumeration(enumeration)) => {
                quote!(::structbind::FieldSpec::enumeration::<#enumeration>(#name, #codec))
            }
            Some(Form::Typed(declared)) => {
                quote!(::structbind::FieldSpec::declared::<#declared>(#name, #codec))
            }
            Some(Form::Codec) | None => {
                quote!(::structbind::FieldSpec::declared::<#ty>(#name, #codec))
            }
        };
        if let Some(doc) = &self.doc {
            spec.extend(quote!(.doc(#doc)));
        }
        if let Some(parsed) = &self.parsed {
            spec.extend(quote!(.parsed(#parsed)));
        }
        for (key, value) in &self.meta {
            spec.extend(quote!(.meta(#key, #value)));
        }
        spec
    }
}

pub(crate) fn expand(input: DeriveInput) -> Result<TokenStream> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "records cannot be generic",
        ));
    }
    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    &input.ident,
                    "records need named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "`Record` can only be derived for structs",
            ))
        }
    };

    let options = RecordAttrs::parse(&input)?;
    let ident = &input.ident;
    let record_name = LitStr::new(&ident.unraw().to_string(), Span::call_site());

    let mut idents = Vec::with_capacity(named.len());
    let mut names = Vec::with_capacity(named.len());
    let mut specs = Vec::with_capacity(named.len());
    for field in named {
        let Some(field_ident) = &field.ident else {
            continue;
        };
        let name = LitStr::new(&field_ident.unraw().to_string(), field_ident.span());
        let attrs = FieldAttrs::parse(field, field_ident)?;
        specs.push(attrs.spec(&name, &field.ty));
        idents.push(field_ident);
        names.push(name);
    }

    let chain = options.options();
    let lookup = options.container.then(|| {
        quote! {
            impl ::structbind::Lookup for #ident {
                fn lookup(&self, key: &str) -> ::core::option::Option<::structbind::Value> {
                    match key {
                        #(#names => ::core::option::Option::Some(
                            ::structbind::Flatten::flatten(&self.#idents)
                        ),)*
                        _ => ::core::option::Option::None,
                    }
                }
            }
        }
    });

    Ok(quote! {
        impl ::structbind::Record for #ident {
            const NAME: &'static str = #record_name;

            fn fields() -> ::core::result::Result<
                ::std::vec::Vec<::structbind::FieldSpec>,
                ::structbind::Error,
            > {
                ::core::result::Result::Ok(::std::vec![#(#specs),*])
            }

            fn options() -> ::structbind::RecordOptions {
                #chain
            }

            fn construct(
                fields: &mut ::structbind::Fields,
            ) -> ::core::result::Result<Self, ::structbind::Error> {
                ::core::result::Result::Ok(Self {
                    #(#idents: fields.take(#names)?,)*
                })
            }

            fn assign(
                &mut self,
                field: &str,
                value: ::structbind::Materialized,
            ) -> ::core::result::Result<(), ::structbind::Error> {
                match field {
                    #(#names => {
                        self.#idents = ::structbind::FromMaterialized::from_materialized(value)?;
                    })*
                    _ => {
                        return ::core::result::Result::Err(::structbind::Error::MissingField {
                            record: #record_name,
                            field: ::std::string::ToString::to_string(field),
                        });
                    }
                }
                ::core::result::Result::Ok(())
            }

            fn to_container(&self) -> ::structbind::Container {
                let mut container = ::structbind::Container::new();
                #(container.insert(#names, ::structbind::Flatten::flatten(&self.#idents));)*
                container
            }
        }

        impl ::structbind::Declared for #ident {
            fn declared_type() -> ::structbind::DeclaredType {
                ::structbind::DeclaredType::Record(::structbind::RecordType::of::<Self>())
            }
        }

        impl ::structbind::FromMaterialized for #ident {
            fn from_materialized(
                value: ::structbind::Materialized,
            ) -> ::core::result::Result<Self, ::structbind::Error> {
                ::structbind::record_from_materialized::<Self>(value)
            }
        }

        impl ::structbind::Flatten for #ident {
            fn flatten(&self) -> ::structbind::Value {
                ::structbind::Value::Map(::structbind::Record::to_container(self))
            }
        }

        #lookup
    })
}

//! `#[derive(Bind)]` for booter configuration types.
//!
//! Named structs bind from objects, field by field, keyed by the field name
//! (or `#[bind(rename = "...")]`, or the container's `rename_all` rule).
//! Fieldless enums bind from strings naming a variant.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DataEnum, DataStruct, DeriveInput, Fields, LitStr};

mod attrs;

use attrs::{ContainerAttrs, MemberAttrs};

#[proc_macro_derive(Bind, attributes(bind))]
pub fn derive_bind(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let container = ContainerAttrs::parse(&input.attrs)?;
    let body = match &input.data {
        Data::Struct(data) => struct_body(input, data, &container)?,
        Data::Enum(data) => enum_body(input, data, &container)?,
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Bind cannot be derived for unions",
            ))
        }
    };

    let ident = &input.ident;
    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(syn::parse_quote!(::booter::bind::Bind));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::booter::bind::Bind for #ident #ty_generics #where_clause {
            fn bind(
                &mut self,
                path: &str,
                value: &::booter::value::Value,
            ) -> ::core::result::Result<(), ::booter::bind::BindError> {
                #body
            }
        }
    })
}

fn struct_body(
    input: &DeriveInput,
    data: &DataStruct,
    container: &ContainerAttrs,
) -> syn::Result<proc_macro2::TokenStream> {
    let fields = match &data.fields {
        Fields::Named(named) => &named.named,
        Fields::Unit => return Ok(empty_struct_body()),
        Fields::Unnamed(_) => {
            return Err(syn::Error::new_spanned(
                &input.ident,
                "Bind can only be derived for structs with named fields",
            ))
        }
    };

    let mut arms = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for field in fields {
        let attrs = MemberAttrs::parse(&field.attrs)?;
        if attrs.skip {
            continue;
        }
        let Some(ident) = &field.ident else { continue };
        let key = attrs.key(&ident.to_string(), container.rename_all);
        if !seen.insert(key.clone()) {
            return Err(syn::Error::new_spanned(
                ident,
                format!("duplicate configuration key '{key}'"),
            ));
        }
        let key = LitStr::new(&key, ident.span());
        arms.push(quote! {
            #key => ::booter::bind::Bind::bind(
                &mut self.#ident,
                &::booter::bind::field_path(path, key),
                item,
            )?,
        });
    }

    if arms.is_empty() {
        return Ok(empty_struct_body());
    }

    Ok(quote! {
        let entries = ::booter::bind::expect_object(
            path,
            value,
            ::booter::bind::short_type_name::<Self>(),
        )?;
        for (key, item) in entries {
            match key.as_str() {
                #(#arms)*
                _ => return Err(::booter::bind::BindError::unknown_field(path, key)),
            }
        }
        Ok(())
    })
}

/// Accepts only an empty object.
fn empty_struct_body() -> proc_macro2::TokenStream {
    quote! {
        let entries = ::booter::bind::expect_object(
            path,
            value,
            ::booter::bind::short_type_name::<Self>(),
        )?;
        match entries.keys().next() {
            Some(key) => Err(::booter::bind::BindError::unknown_field(path, key)),
            None => Ok(()),
        }
    }
}

fn enum_body(
    input: &DeriveInput,
    data: &DataEnum,
    container: &ContainerAttrs,
) -> syn::Result<proc_macro2::TokenStream> {
    let mut arms = Vec::new();
    let mut names = Vec::new();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new_spanned(
                variant,
                "Bind can only be derived for enums without variant data",
            ));
        }
        let attrs = MemberAttrs::parse(&variant.attrs)?;
        if attrs.skip {
            continue;
        }
        let ident = &variant.ident;
        let key = attrs.key(&ident.to_string(), container.rename_all);
        names.push(key.clone());
        let key = LitStr::new(&key, ident.span());
        arms.push(quote! { #key => Self::#ident, });
    }
    if arms.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.ident,
            "Bind needs at least one bindable variant",
        ));
    }
    let expected = names.join(", ");

    Ok(quote! {
        let text = ::booter::bind::expect_variant(
            path,
            value,
            ::booter::bind::short_type_name::<Self>(),
        )?;
        *self = match text {
            #(#arms)*
            other => {
                return Err(::booter::bind::BindError::invalid_value(
                    path,
                    ::std::format!("unknown variant {:?}, expected one of: {}", other, #expected),
                ))
            }
        };
        Ok(())
    })
}

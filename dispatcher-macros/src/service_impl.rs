use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use std::collections::HashSet;
use syn::{
    parse_macro_input, FnArg, GenericArgument, ImplItem, ImplItemFn, ItemImpl, LitStr, Meta, PathArguments,
    ReturnType, Type, Visibility,
};

use crate::service_method::ServiceMethodArgs;

const MAX_ARGS: usize = 8;

/// A method picked up from the impl block
struct ExposedMethod {
    name: LitStr,
    ident: syn::Ident,
    arg_types: Vec<Type>,
}

/// Implementation of #[service_impl] macro that processes entire impl blocks
pub fn impl_service_impl(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut input = parse_macro_input!(input as ItemImpl);

    match expand(TokenStream2::from(args), &mut input) {
        Ok(service) => TokenStream::from(quote! {
            #input
            #service
        }),
        Err(err) => {
            let err = err.to_compile_error();
            TokenStream::from(quote! {
                #input
                #err
            })
        }
    }
}

fn expand(args: TokenStream2, input: &mut ItemImpl) -> syn::Result<TokenStream2> {
    if !args.is_empty() {
        return Err(syn::Error::new_spanned(args, "#[service_impl] takes no arguments"));
    }
    if let Some((_, path, _)) = &input.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[service_impl] can only be applied to inherent impl blocks",
        ));
    }

    let mut errors: Option<syn::Error> = None;
    let mut push_error = |err: syn::Error| match errors.as_mut() {
        Some(errors) => errors.combine(err),
        None => errors = Some(err),
    };

    let mut methods = Vec::new();
    let mut seen = HashSet::new();

    for item in &mut input.items {
        let ImplItem::Fn(method) = item else {
            continue;
        };

        let rename = match take_rename(method) {
            Ok(rename) => rename,
            Err(err) => {
                push_error(err);
                continue;
            }
        };

        if !matches!(method.vis, Visibility::Public(_)) {
            if let Some(rename) = rename {
                push_error(syn::Error::new(
                    rename.span(),
                    "#[service_method] can only rename a `pub fn`",
                ));
            }
            continue;
        }

        match exposed_method(method, rename) {
            Ok(Some(exposed)) => {
                let name = exposed.name.value();
                if !seen.insert(name.clone()) {
                    push_error(syn::Error::new(
                        exposed.name.span(),
                        format!("method name `{}` is exposed more than once", name),
                    ));
                    continue;
                }
                methods.push(exposed);
            }
            Ok(None) => {}
            Err(err) => push_error(err),
        }
    }

    if let Some(errors) = errors {
        return Err(errors);
    }

    let registrations = methods.iter().map(|method| {
        let name = &method.name;
        let ident = &method.ident;
        let arg_idents: Vec<_> = (0..method.arg_types.len())
            .map(|i| format_ident!("arg{}", i))
            .collect();
        let arg_types = &method.arg_types;

        quote! {
            .method(#name, |this: &Self, #(#arg_idents: #arg_types),*| Self::#ident(this, #(#arg_idents),*))
        }
    });

    let body = if methods.is_empty() {
        quote! { let _ = methods; }
    } else {
        quote! { methods #(#registrations)*; }
    };

    let (impl_generics, _, where_clause) = input.generics.split_for_impl();
    let self_ty = &input.self_ty;

    Ok(quote! {
        impl #impl_generics ::dispatcher::Service for #self_ty #where_clause {
            fn describe(methods: &mut ::dispatcher::MethodTable<Self>) {
                #body
            }
        }
    })
}

/// Remove `#[service_method]` from the method, returning its name argument
fn take_rename(method: &mut ImplItemFn) -> syn::Result<Option<LitStr>> {
    let mut rename = None;
    let mut result = Ok(());

    method.attrs.retain(|attr| {
        if !attr.path().is_ident("service_method") {
            return true;
        }
        if rename.is_some() {
            result = Err(syn::Error::new_spanned(attr, "duplicate #[service_method] attribute"));
            return false;
        }
        match &attr.meta {
            Meta::Path(_) => {}
            _ => match attr.parse_args::<ServiceMethodArgs>() {
                Ok(args) => rename = args.name,
                Err(err) => result = Err(err),
            },
        }
        false
    });

    result.map(|_| rename)
}

/// Check a `pub fn` can be exposed; associated functions are skipped
fn exposed_method(method: &ImplItemFn, rename: Option<LitStr>) -> syn::Result<Option<ExposedMethod>> {
    let sig = &method.sig;

    let Some(receiver) = sig.receiver() else {
        return match rename {
            Some(rename) => Err(syn::Error::new(
                rename.span(),
                "#[service_method] requires a method taking `&self`",
            )),
            None => Ok(None),
        };
    };

    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(asyncness, "service methods cannot be async"));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(&sig.generics, "service methods cannot be generic"));
    }
    if receiver.colon_token.is_some() {
        return Err(syn::Error::new_spanned(receiver, "service methods must take `&self`"));
    }
    match &receiver.reference {
        None => {
            return Err(syn::Error::new_spanned(
                receiver,
                "service methods cannot take `self` by value; take `&self`",
            ))
        }
        Some(_) if receiver.mutability.is_some() => {
            return Err(syn::Error::new_spanned(
                receiver,
                "service methods cannot take `&mut self`; use interior mutability",
            ))
        }
        Some(_) => {}
    }

    let mut arg_types = Vec::new();
    for input in &sig.inputs {
        let FnArg::Typed(pat_type) = input else {
            continue;
        };
        if let Type::ImplTrait(_) = &*pat_type.ty {
            return Err(syn::Error::new_spanned(&pat_type.ty, "service methods cannot be generic"));
        }
        if let Some(reference) = find_reference(&pat_type.ty) {
            return Err(syn::Error::new_spanned(
                reference,
                "service method arguments must be owned; take `String`, `Vec<T>` or `Arc<T>` instead of a reference",
            ));
        }
        arg_types.push((*pat_type.ty).clone());
    }

    if let ReturnType::Type(_, ty) = &sig.output {
        if let Some(reference) = find_reference(ty) {
            return Err(syn::Error::new_spanned(
                reference,
                "service methods must return owned values, not references",
            ));
        }
    }

    if arg_types.len() > MAX_ARGS {
        return Err(syn::Error::new_spanned(
            &sig.inputs,
            format!("service methods take at most {} arguments", MAX_ARGS),
        ));
    }

    let name = rename.unwrap_or_else(|| LitStr::new(&sig.ident.to_string(), sig.ident.span()));

    Ok(Some(ExposedMethod {
        name,
        ident: sig.ident.clone(),
        arg_types,
    }))
}

/// First reference type nested anywhere in `ty`
fn find_reference(ty: &Type) -> Option<&Type> {
    match ty {
        Type::Reference(_) => Some(ty),
        Type::Paren(inner) => find_reference(&inner.elem),
        Type::Group(inner) => find_reference(&inner.elem),
        Type::Array(inner) => find_reference(&inner.elem),
        Type::Slice(inner) => find_reference(&inner.elem),
        Type::Tuple(tuple) => tuple.elems.iter().find_map(find_reference),
        Type::Path(path) => path.path.segments.iter().find_map(|segment| match &segment.arguments {
            PathArguments::AngleBracketed(args) => args.args.iter().find_map(|arg| match arg {
                GenericArgument::Type(ty) => find_reference(ty),
                _ => None,
            }),
            _ => None,
        }),
        _ => None,
    }
}

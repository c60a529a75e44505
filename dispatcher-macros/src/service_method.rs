use proc_macro::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{parse_macro_input, ImplItemFn, LitStr};

/// Arguments for #[service_method] attribute
pub(crate) struct ServiceMethodArgs {
    pub(crate) name: Option<LitStr>,
}

impl Parse for ServiceMethodArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.is_empty() {
            return Ok(ServiceMethodArgs { name: None });
        }

        let name: LitStr = input.parse()?;
        if name.value().is_empty() {
            return Err(syn::Error::new(name.span(), "method name must not be empty"));
        }
        Ok(ServiceMethodArgs { name: Some(name) })
    }
}

/// Implementation of #[service_method] macro.
///
/// Inside `#[service_impl]` the attribute is consumed before it expands, so
/// reaching this point means it was used on its own: check the arguments and
/// pass the function through unchanged.
pub fn impl_service_method(args: TokenStream, input: TokenStream) -> TokenStream {
    let _args = parse_macro_input!(args as ServiceMethodArgs);
    let method = parse_macro_input!(input as ImplItemFn);

    let expanded = quote! {
        #method
    };

    TokenStream::from(expanded)
}

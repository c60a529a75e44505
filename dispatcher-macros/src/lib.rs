//! # Dispatcher Macros
//!
//! Procedural macros that turn an inherent impl block into a dispatcher
//! service, so method tables never have to be written by hand.
//!
//! - `#[service_impl]` - generates `dispatcher::Service` for the impl's type
//! - `#[service_method]` - renames one exposed method
//!
//! ## Example
//!
//! ```rust,ignore
//! use dispatcher::{service_impl, Variadic};
//!
//! pub struct Calculator;
//!
//! #[service_impl]
//! impl Calculator {
//!     // exposed as "add"
//!     pub fn add(&self, a: i64, b: i64) -> i64 {
//!         a + b
//!     }
//!
//!     // exposed as "Sum"
//!     #[service_method("Sum")]
//!     pub fn sum(&self, first: i64, rest: Variadic<i64>) -> i64 {
//!         first + rest.iter().sum::<i64>()
//!     }
//!
//!     // never exposed
//!     fn helper(&self) {}
//! }
//! ```
//!
//! ## Captured methods
//!
//! Every `pub fn` taking `&self` is captured; private and `pub(crate)` methods
//! and associated functions without a receiver are left alone. Public methods
//! that cannot be called through a shared receiver are rejected at compile
//! time:
//!
//! ```rust,ignore
//! #[service_impl]
//! impl Counter {
//!     pub fn bump(&mut self) {}             // error: takes `&mut self`
//!     pub async fn load(&self) {}           // error: async
//!     pub fn get<T: Default>(&self) -> T {} // error: generic
//! }
//! ```

extern crate proc_macro;

mod service_impl;
mod service_method;

use proc_macro::TokenStream;

/// Renames the method it is attached to.
///
/// Only meaningful inside a `#[service_impl]` block, which consumes the
/// attribute; the method is exposed under the given name instead of its
/// Rust identifier.
///
/// ## Examples
///
/// ```rust,ignore
/// #[service_method("GetUser")]
/// pub fn get_user(&self, id: i64) -> String { ... }
/// ```
#[proc_macro_attribute]
pub fn service_method(args: TokenStream, input: TokenStream) -> TokenStream {
    service_method::impl_service_method(args, input)
}

/// Processes an impl block and generates its `dispatcher::Service` impl.
///
/// ## Example
///
/// ```rust,ignore
/// #[service_impl]
/// impl UserService {
///     pub fn get_user(&self, id: i64) -> String { ... }
/// }
///
/// dispatcher.register_service("users", Arc::new(UserService::new()))?;
/// dispatcher.run("users", "get_user", vec![42.into()])?;
/// ```
#[proc_macro_attribute]
pub fn service_impl(args: TokenStream, input: TokenStream) -> TokenStream {
    service_impl::impl_service_impl(args, input)
}

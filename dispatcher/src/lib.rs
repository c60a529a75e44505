//! # Dispatcher - Name-Addressed Method Invocation
//!
//! Register objects under a service name, then call their methods by
//! `(service, method)` with a list of dynamically-typed [`Value`]s. Every
//! method's signature is captured at registration, so each call is checked
//! for arity and exact argument types before the body runs.
//!
//! Loosely-typed input (JSON from a transport, strings from a CLI) goes
//! through [`Dispatcher::validate`] first, which coerces it into the
//! argument list the method expects.
//!
//! ## Quick Start
//!
//! ```rust
//! use dispatcher::{service_impl, Dispatcher, Value, Variadic};
//! use std::sync::Arc;
//!
//! struct Calculator;
//!
//! #[service_impl]
//! impl Calculator {
//!     pub fn add(&self, a: i64, b: i64) -> i64 {
//!         a + b
//!     }
//!
//!     #[service_method("Sum")]
//!     pub fn sum(&self, first: i64, rest: Variadic<i64>) -> i64 {
//!         first + rest.iter().sum::<i64>()
//!     }
//! }
//!
//! let dispatcher = Dispatcher::new();
//! dispatcher.register_service("calc", Arc::new(Calculator)).unwrap();
//!
//! let out = dispatcher.run("calc", "add", vec![3.into(), 4.into()]).unwrap();
//! assert_eq!(out, vec![Value::Int(7)]);
//!
//! let args = dispatcher.validate("calc", "Sum", &["1", "2", "3"]).unwrap();
//! assert_eq!(dispatcher.run("calc", "Sum", args).unwrap(), vec![Value::Int(6)]);
//! ```

pub mod config;
pub mod convert;
pub mod error;
pub mod message;
pub mod registry;
mod run;
pub mod service;
pub mod signature;
pub mod validate;
pub mod value;

pub use crate::config::{CoercionMode, DispatcherConfig, VariadicPolicy};
pub use convert::{FromValue, IntoValue, IntoValues, Variadic};
pub use error::{Arity, DispatchError, Result};
pub use message::{RpcRequest, RpcResponse};
pub use registry::{Dispatcher, ServiceInfo};
pub use service::{Method, MethodFn, MethodTable, Service};
pub use signature::{MethodSignature, Param, ParamType};
pub use validate::coerce;
pub use value::{Object, TypeDesc, Value};

#[cfg(feature = "macros")]
pub use dispatcher_macros::{service_impl, service_method};

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::trace;

use crate::convert::{param_of, FromValue, IntoValues};
use crate::error::{Arity, DispatchError, Result};
use crate::signature::{MethodSignature, Param, ParamType};
use crate::value::{TypeDesc, Value};

/// Type-erased method body: receiver first, then one value per declared argument
pub(crate) type HandlerFn =
    Arc<dyn Fn(&(dyn Any + Send + Sync), Vec<Value>) -> Result<Vec<Value>> + Send + Sync>;

/// An object whose callable methods can be registered in a dispatcher.
///
/// Implementations list their public operations explicitly:
///
/// ```rust
/// use dispatcher::{MethodTable, Service, Variadic};
///
/// struct Calculator;
///
/// impl Service for Calculator {
///     fn describe(methods: &mut MethodTable<Self>) {
///         methods
///             .method("Add", |_: &Self, a: i64, b: i64| a + b)
///             .method("Sum", |_: &Self, a: i64, rest: Variadic<String>| a + rest.len() as i64);
///     }
/// }
/// ```
///
/// `#[service_impl]` generates this impl from an inherent impl block.
pub trait Service: Send + Sync + 'static {
    fn describe(methods: &mut MethodTable<Self>)
    where
        Self: Sized;
}

/// A callable that can be registered as a method of `S`.
///
/// Implemented for `Fn(&S, A1, .., An) -> R` closures with up to eight
/// arguments, where every `Ai: FromValue` and `R: IntoValues`.
pub trait MethodFn<S, Args>: Send + Sync + 'static {
    fn params() -> Vec<Param>;

    fn returns() -> Vec<ParamType>;

    /// Call with exactly one value per declared parameter
    fn call(&self, receiver: &S, args: Vec<Value>) -> Result<Vec<Value>>;
}

fn next_arg<T: FromValue>(args: &mut impl Iterator<Item = (usize, Value)>, expected: usize) -> Result<T> {
    let (index, value) = args.next().ok_or(DispatchError::InvalidArgumentsCount {
        expected: Arity::Exactly(expected),
        found: 0,
    })?;
    T::from_arg(value, index + 1)
}

macro_rules! impl_method_fn {
    ($count:expr; $($arg:ident),*) => {
        impl<S, F, R, $($arg,)*> MethodFn<S, ($($arg,)*)> for F
        where
            F: Fn(&S, $($arg),*) -> R + Send + Sync + 'static,
            R: IntoValues,
            $($arg: FromValue,)*
        {
            fn params() -> Vec<Param> {
                vec![$(param_of::<$arg>()),*]
            }

            fn returns() -> Vec<ParamType> {
                R::types()
            }

            #[allow(non_snake_case, unused_mut, unused_variables)]
            fn call(&self, receiver: &S, args: Vec<Value>) -> Result<Vec<Value>> {
                if args.len() != $count {
                    return Err(DispatchError::InvalidArgumentsCount {
                        expected: Arity::Exactly($count),
                        found: args.len(),
                    });
                }
                let mut args = args.into_iter().enumerate();
                $(
                    let $arg = next_arg::<$arg>(&mut args, $count)?;
                )*
                (self)(receiver, $($arg),*).into_values()
            }
        }
    };
}

impl_method_fn!(0;);
impl_method_fn!(1; A1);
impl_method_fn!(2; A1, A2);
impl_method_fn!(3; A1, A2, A3);
impl_method_fn!(4; A1, A2, A3, A4);
impl_method_fn!(5; A1, A2, A3, A4, A5);
impl_method_fn!(6; A1, A2, A3, A4, A5, A6);
impl_method_fn!(7; A1, A2, A3, A4, A5, A6, A7);
impl_method_fn!(8; A1, A2, A3, A4, A5, A6, A7, A8);

/// A captured method: its signature and its erased body
#[derive(Clone)]
pub struct Method {
    signature: MethodSignature,
    handler: HandlerFn,
}

impl Method {
    pub fn signature(&self) -> &MethodSignature {
        &self.signature
    }

    pub(crate) fn call(&self, receiver: &(dyn Any + Send + Sync), args: Vec<Value>) -> Result<Vec<Value>> {
        (self.handler)(receiver, args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("signature", &self.signature)
            .finish()
    }
}

/// Builder collecting the methods a [`Service`] exposes
pub struct MethodTable<S> {
    methods: Vec<Method>,
    errors: Vec<DispatchError>,
    _service: PhantomData<fn(&S)>,
}

impl<S: Service> MethodTable<S> {
    fn new() -> Self {
        Self {
            methods: Vec::new(),
            errors: Vec::new(),
            _service: PhantomData,
        }
    }

    /// Expose `f` under `name`. The signature is captured from the closure's
    /// argument types; a trailing `Variadic<T>` makes the method variadic.
    pub fn method<F, Args>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: MethodFn<S, Args>,
    {
        let name = name.into();
        if self.methods.iter().any(|method| method.signature.name() == name) {
            self.errors.push(DispatchError::InvalidSignature {
                method: name,
                reason: "duplicate method name".to_string(),
            });
            return self;
        }

        let signature = match MethodSignature::new(name, TypeDesc::of::<S>(), F::params(), F::returns()) {
            Ok(signature) => signature,
            Err(err) => {
                self.errors.push(err);
                return self;
            }
        };

        trace!("Captured method {}", signature);

        let handler: HandlerFn = Arc::new(move |receiver: &(dyn Any + Send + Sync), args: Vec<Value>| {
            let receiver = receiver.downcast_ref::<S>().ok_or_else(|| DispatchError::InvalidServiceType {
                found: "receiver of a different type".to_string(),
            })?;
            f.call(receiver, args)
        });

        self.methods.push(Method { signature, handler });
        self
    }
}

/// Method table of one service type, erased
pub struct CapturedMethods {
    pub(crate) methods: Vec<Method>,
    pub(crate) errors: Vec<DispatchError>,
}

pub(crate) fn capture<S: Service>() -> CapturedMethods {
    let mut table = MethodTable::<S>::new();
    S::describe(&mut table);
    CapturedMethods {
        methods: table.methods,
        errors: table.errors,
    }
}

//! Conversions between typed Rust parameters/results and [`Value`].

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::ops::Deref;
use std::sync::Arc;

use crate::error::{DispatchError, Result};
use crate::signature::{Param, ParamType};
use crate::value::{Object, TypeDesc, Value};

/// A type that can be a method parameter
pub trait FromValue: Sized {
    /// Marks the trailing zero-or-more parameter
    const VARIADIC: bool = false;

    fn param_type() -> ParamType;

    /// `None` when the value does not have the declared type
    fn from_value(value: Value) -> Option<Self>;

    /// Convert the argument at 1-based `position`, reporting a mismatch there
    fn from_arg(value: Value, position: usize) -> Result<Self> {
        let found = value.kind();
        Self::from_value(value).ok_or_else(|| DispatchError::invalid_type(position, Self::param_type(), found))
    }
}

/// A type that can be a single method result
pub trait IntoValue {
    fn param_type() -> ParamType;

    fn into_value(self) -> Value;
}

/// The full return of a method: zero, one or several values, or an error
pub trait IntoValues {
    fn types() -> Vec<ParamType>;

    fn into_values(self) -> Result<Vec<Value>>;
}

pub(crate) fn param_of<T: FromValue>() -> Param {
    Param {
        ty: T::param_type(),
        variadic: T::VARIADIC,
    }
}

/// Trailing parameter receiving zero or more values of `T`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Variadic<T>(pub Vec<T>);

impl<T> Variadic<T> {
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<T> Deref for Variadic<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T> IntoIterator for Variadic<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<T: FromValue> FromValue for Variadic<T> {
    const VARIADIC: bool = true;

    fn param_type() -> ParamType {
        ParamType::list(T::param_type())
    }

    fn from_value(value: Value) -> Option<Self> {
        Vec::<T>::from_value(value).map(Variadic)
    }

    /// Trailing values arrive packed; each one keeps its own call position
    fn from_arg(value: Value, position: usize) -> Result<Self> {
        match value {
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(offset, item)| T::from_arg(item, position + offset))
                .collect::<Result<Vec<T>>>()
                .map(Variadic),
            other => Err(DispatchError::invalid_type(position, Self::param_type(), other.kind())),
        }
    }
}

impl FromValue for Value {
    fn param_type() -> ParamType {
        ParamType::Any
    }

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

impl FromValue for bool {
    fn param_type() -> ParamType {
        ParamType::Bool
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_bool()
    }
}

macro_rules! int_from_value {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn param_type() -> ParamType {
                    ParamType::Int
                }

                fn from_value(value: Value) -> Option<Self> {
                    value.as_i64().and_then(|i| <$ty>::try_from(i).ok())
                }
            }
        )*
    };
}

int_from_value!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl FromValue for f64 {
    fn param_type() -> ParamType {
        ParamType::Float
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_f64()
    }
}

impl FromValue for f32 {
    fn param_type() -> ParamType {
        ParamType::Float
    }

    fn from_value(value: Value) -> Option<Self> {
        value.as_f64().map(|f| f as f32)
    }
}

impl FromValue for String {
    fn param_type() -> ParamType {
        ParamType::Str
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn param_type() -> ParamType {
        ParamType::list(T::param_type())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn param_type() -> ParamType {
        ParamType::map(T::param_type())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Map(entries) => entries
                .into_iter()
                .map(|(key, item)| T::from_value(item).map(|item| (key, item)))
                .collect(),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for HashMap<String, T> {
    fn param_type() -> ParamType {
        ParamType::map(T::param_type())
    }

    fn from_value(value: Value) -> Option<Self> {
        BTreeMap::<String, T>::from_value(value).map(|entries| entries.into_iter().collect())
    }
}

impl<T: Any + Send + Sync> FromValue for Arc<T> {
    fn param_type() -> ParamType {
        ParamType::Object(TypeDesc::of::<T>())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(object) => object.downcast::<T>(),
            _ => None,
        }
    }
}

impl IntoValue for Value {
    fn param_type() -> ParamType {
        ParamType::Any
    }

    fn into_value(self) -> Value {
        self
    }
}

macro_rules! primitive_into_value {
    ($($ty:ty => $param:ident),* $(,)?) => {
        $(
            impl IntoValue for $ty {
                fn param_type() -> ParamType {
                    ParamType::$param
                }

                fn into_value(self) -> Value {
                    Value::from(self)
                }
            }
        )*
    };
}

primitive_into_value! {
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    String => Str,
    &'static str => Str,
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn param_type() -> ParamType {
        ParamType::list(T::param_type())
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(IntoValue::into_value).collect())
    }
}

impl<T: IntoValue> IntoValue for BTreeMap<String, T> {
    fn param_type() -> ParamType {
        ParamType::map(T::param_type())
    }

    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(key, item)| (key, item.into_value())).collect())
    }
}

impl<T: IntoValue> IntoValue for HashMap<String, T> {
    fn param_type() -> ParamType {
        ParamType::map(T::param_type())
    }

    fn into_value(self) -> Value {
        Value::Map(self.into_iter().map(|(key, item)| (key, item.into_value())).collect())
    }
}

impl<T: Any + Send + Sync> IntoValue for Arc<T> {
    fn param_type() -> ParamType {
        ParamType::Object(TypeDesc::of::<T>())
    }

    fn into_value(self) -> Value {
        Value::Object(Object::new(self))
    }
}

impl<T: IntoValue> IntoValues for T {
    fn types() -> Vec<ParamType> {
        vec![T::param_type()]
    }

    fn into_values(self) -> Result<Vec<Value>> {
        Ok(vec![self.into_value()])
    }
}

impl IntoValues for () {
    fn types() -> Vec<ParamType> {
        Vec::new()
    }

    fn into_values(self) -> Result<Vec<Value>> {
        Ok(Vec::new())
    }
}

/// Unsigned results wider than `i64` are checked when the method returns
macro_rules! wide_into_values {
    ($($ty:ty),*) => {
        $(
            impl IntoValues for $ty {
                fn types() -> Vec<ParamType> {
                    vec![ParamType::Int]
                }

                fn into_values(self) -> Result<Vec<Value>> {
                    let value = i64::try_from(self).map_err(|_| {
                        DispatchError::Method(anyhow::anyhow!("result {} does not fit in an int", self))
                    })?;
                    Ok(vec![Value::Int(value)])
                }
            }
        )*
    };
}

wide_into_values!(u64, usize);

impl<T, E> IntoValues for std::result::Result<T, E>
where
    T: IntoValues,
    E: Into<anyhow::Error>,
{
    fn types() -> Vec<ParamType> {
        T::types()
    }

    fn into_values(self) -> Result<Vec<Value>> {
        match self {
            Ok(values) => values.into_values(),
            Err(err) => Err(DispatchError::Method(err.into())),
        }
    }
}

macro_rules! tuple_into_values {
    ($($name:ident),+) => {
        impl<$($name: IntoValue),+> IntoValues for ($($name,)+) {
            fn types() -> Vec<ParamType> {
                vec![$($name::param_type()),+]
            }

            #[allow(non_snake_case)]
            fn into_values(self) -> Result<Vec<Value>> {
                let ($($name,)+) = self;
                Ok(vec![$($name.into_value()),+])
            }
        }
    };
}

tuple_into_values!(A, B);
tuple_into_values!(A, B, C);
tuple_into_values!(A, B, C, D);

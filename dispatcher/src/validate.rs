//! Coercion of loosely-typed input into invocation-ready arguments.
//!
//! Input is encoded to a `serde_json::Value` and decoded again with a typed
//! [`DeserializeSeed`] per declared parameter, so generic numbers, numeric
//! strings and nested sequences come out as the exact types `run` checks for.

use serde::de::{self, DeserializeSeed, Deserializer, MapAccess, SeqAccess, Unexpected, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use crate::config::CoercionMode;
use crate::error::{Arity, DispatchError, Result};
use crate::registry::Dispatcher;
use crate::signature::{MethodSignature, ParamType};
use crate::value::Value;

impl Dispatcher {
    /// Convert `param` into the argument list `method` expects.
    ///
    /// - no declared parameters: always an empty list;
    /// - one parameter: `param` is that argument;
    /// - several: `param` must be a sequence, coerced positionally.
    ///
    /// The variadic slot of a variadic method is flattened into trailing
    /// arguments, so the output can be passed to [`Dispatcher::run`] as is.
    pub fn validate<P>(&self, service: &str, method: &str, param: &P) -> Result<Vec<Value>>
    where
        P: Serialize + ?Sized,
    {
        let (_, found) = self.lookup(service, method)?;
        let signature = found.signature();
        let mode = self.config().coercion;

        let args = match signature.args().len() {
            0 => Vec::new(),
            1 => coerce_single(signature, mode, encode(signature, param)?)?,
            _ => coerce_many(signature, mode, encode(signature, param)?)?,
        };

        debug!("Validated {} arguments for {}.{}", args.len(), service, method);
        Ok(args)
    }
}

fn encode<P: Serialize + ?Sized>(signature: &MethodSignature, param: &P) -> Result<Json> {
    serde_json::to_value(param).map_err(|source| DispatchError::CoercionFailure {
        position: 1,
        expected: signature.args()[0].to_string(),
        source,
    })
}

fn coerce_single(signature: &MethodSignature, mode: CoercionMode, param: Json) -> Result<Vec<Value>> {
    let declared = &signature.args()[0];

    if signature.is_variadic() {
        let param = match param {
            items @ Json::Array(_) => items,
            Json::Null => Json::Array(Vec::new()),
            scalar => Json::Array(vec![scalar]),
        };
        return match coerce(declared, mode, 1, param)? {
            Value::List(items) => Ok(items),
            other => Ok(vec![other]),
        };
    }
    Ok(vec![coerce(declared, mode, 1, param)?])
}

fn coerce_many(signature: &MethodSignature, mode: CoercionMode, param: Json) -> Result<Vec<Value>> {
    let Json::Array(items) = param else {
        return Err(DispatchError::InvalidArgExpectedSlice);
    };

    let fixed = signature.fixed_args();
    let arity_ok = match signature.variadic_elem() {
        Some(_) => items.len() >= fixed.len(),
        None => items.len() == fixed.len(),
    };
    if !arity_ok {
        let expected = if signature.is_variadic() {
            Arity::AtLeast(fixed.len())
        } else {
            Arity::Exactly(fixed.len())
        };
        return Err(DispatchError::InvalidArgumentsCount {
            expected,
            found: items.len(),
        });
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let declared = fixed
                .get(index)
                .or(signature.variadic_elem())
                .ok_or(DispatchError::InvalidArgExpectedSlice)?;
            coerce(declared, mode, index + 1, item)
        })
        .collect()
}

/// Decode one encoded value as exactly `declared`
pub fn coerce(declared: &ParamType, mode: CoercionMode, position: usize, encoded: Json) -> Result<Value> {
    Typed { ty: declared, mode }
        .deserialize(encoded)
        .map_err(|source| DispatchError::CoercionFailure {
            position,
            expected: declared.to_string(),
            source,
        })
}

/// Typed decoder for one [`ParamType`]
#[derive(Clone, Copy)]
struct Typed<'a> {
    ty: &'a ParamType,
    mode: CoercionMode,
}

impl<'a> Typed<'a> {
    fn with(self, ty: &'a ParamType) -> Self {
        Self { ty, mode: self.mode }
    }

    fn lenient(&self) -> bool {
        self.mode == CoercionMode::Lenient
    }
}

impl<'de> DeserializeSeed<'de> for Typed<'_> {
    type Value = Value;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<Value, D::Error> {
        match self.ty {
            ParamType::Any => Value::deserialize(deserializer),
            ParamType::Object(desc) => Err(de::Error::custom(format_args!(
                "values of type `{}` cannot be decoded from structured input",
                desc
            ))),
            _ => deserializer.deserialize_any(self),
        }
    }
}

impl<'de> Visitor<'de> for Typed<'_> {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a value of type {}", self.ty)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Value, E> {
        match self.ty {
            ParamType::Bool => Ok(Value::Bool(v)),
            _ => Err(E::invalid_type(Unexpected::Bool(v), &self)),
        }
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Value, E> {
        match self.ty {
            ParamType::Int => Ok(Value::Int(v)),
            ParamType::Float => Ok(Value::Float(v as f64)),
            _ => Err(E::invalid_type(Unexpected::Signed(v), &self)),
        }
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Value, E> {
        match self.ty {
            ParamType::Int => i64::try_from(v)
                .map(Value::Int)
                .map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self)),
            ParamType::Float => Ok(Value::Float(v as f64)),
            _ => Err(E::invalid_type(Unexpected::Unsigned(v), &self)),
        }
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Value, E> {
        match self.ty {
            ParamType::Float => Ok(Value::Float(v)),
            ParamType::Int if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 => {
                Ok(Value::Int(v as i64))
            }
            ParamType::Int => Err(E::invalid_value(Unexpected::Float(v), &self)),
            _ => Err(E::invalid_type(Unexpected::Float(v), &self)),
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Value, E> {
        let parsed = match self.ty {
            ParamType::Str => return Ok(Value::Str(v.to_string())),
            ParamType::Int if self.lenient() => v.trim().parse().ok().map(Value::Int),
            ParamType::Float if self.lenient() => v.trim().parse().ok().map(Value::Float),
            ParamType::Bool if self.lenient() => v.trim().parse().ok().map(Value::Bool),
            _ => return Err(E::invalid_type(Unexpected::Str(v), &self)),
        };
        parsed.ok_or_else(|| E::invalid_value(Unexpected::Str(v), &self))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Value, E> {
        Err(E::invalid_type(Unexpected::Unit, &self))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Value, A::Error> {
        let ParamType::List(elem) = self.ty else {
            return Err(de::Error::invalid_type(Unexpected::Seq, &self));
        };
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element_seed(self.with(elem))? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Value, A::Error> {
        let ParamType::Map(elem) = self.ty else {
            return Err(de::Error::invalid_type(Unexpected::Map, &self));
        };
        let mut entries = BTreeMap::new();
        while let Some(key) = map.next_key::<String>()? {
            let item = map.next_value_seed(self.with(elem))?;
            entries.insert(key, item);
        }
        Ok(Value::Map(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DispatcherConfig;
    use crate::convert::Variadic;
    use crate::service::{MethodTable, Service};
    use serde_json::json;
    use std::sync::Arc;

    struct Mock;

    impl Service for Mock {
        fn describe(methods: &mut MethodTable<Self>) {
            methods
                .method("Exported", |_: &Self| ())
                .method("Add", |_: &Self, a: i64, b: i64| a + b)
                .method("OneString", |_: &Self, s: String| s)
                .method("OneInteger", |_: &Self, i: i64| i)
                .method("OneBoolean", |_: &Self, b: bool| b)
                .method("OneFloat", |_: &Self, f: f64| f)
                .method("OneObject", |_: &Self, m: BTreeMap<String, String>| m)
                .method("OneArray", |_: &Self, items: Vec<String>| items)
                .method("OneAny", |_: &Self, v: Value| v)
                .method("WithArguments", |_: &Self, s: String, i: i64| (s, i))
                .method("Ptr", |_: &Self, other: Arc<Mock>| other)
                .method("Sum", |_: &Self, a: i64, rest: Variadic<String>| a + rest.len() as i64)
                .method("Tags", |_: &Self, rest: Variadic<i64>| rest.iter().sum::<i64>());
        }
    }

    fn dispatcher_with(config: DispatcherConfig) -> Dispatcher {
        let d = Dispatcher::with_config(config);
        d.register_service("mock", Arc::new(Mock)).unwrap();
        d
    }

    fn dispatcher() -> Dispatcher {
        dispatcher_with(DispatcherConfig::default())
    }

    #[test]
    fn test_no_arguments_ignores_param() {
        let d = dispatcher();
        assert!(d.validate("mock", "Exported", &json!(null)).unwrap().is_empty());
        assert!(d.validate("mock", "Exported", &json!([1, 2, 3])).unwrap().is_empty());
    }

    #[test]
    fn test_single_argument() {
        let d = dispatcher();
        assert_eq!(d.validate("mock", "OneString", "foo").unwrap(), vec![Value::from("foo")]);
        assert_eq!(d.validate("mock", "OneInteger", &4).unwrap(), vec![Value::Int(4)]);
        assert_eq!(d.validate("mock", "OneBoolean", &false).unwrap(), vec![Value::Bool(false)]);
        assert_eq!(d.validate("mock", "OneFloat", &2.0_f64).unwrap(), vec![Value::Float(2.0)]);
        assert_eq!(d.validate("mock", "OneFloat", &2).unwrap(), vec![Value::Float(2.0)]);
        assert_eq!(
            d.validate("mock", "OneArray", &["foo", "bar", "baz"]).unwrap(),
            vec![Value::List(vec!["foo".into(), "bar".into(), "baz".into()])]
        );
    }

    #[test]
    fn test_single_object_argument() {
        #[derive(Serialize)]
        struct Payload {
            foo: String,
        }

        let d = dispatcher();
        let out = d
            .validate("mock", "OneObject", &Payload { foo: "foo".to_string() })
            .unwrap();
        assert_eq!(
            out,
            vec![Value::Map(BTreeMap::from([("foo".to_string(), Value::from("foo"))]))]
        );
    }

    #[test]
    fn test_single_argument_mismatch() {
        let d = dispatcher();
        let err = d.validate("mock", "OneInteger", &json!(["test"])).unwrap_err();
        assert!(matches!(err, DispatchError::CoercionFailure { position: 1, .. }));

        let err = d.validate("mock", "OneString", &4).unwrap_err();
        assert!(matches!(err, DispatchError::CoercionFailure { .. }));

        let err = d.validate("mock", "OneInteger", &2.5).unwrap_err();
        assert!(matches!(err, DispatchError::CoercionFailure { .. }));
    }

    #[test]
    fn test_any_parameter_keeps_input_shape() {
        let d = dispatcher();
        let out = d.validate("mock", "OneAny", &json!({"a": [1, "b"]})).unwrap();
        let Value::Map(entries) = &out[0] else {
            panic!("expected map");
        };
        assert_eq!(entries["a"], Value::List(vec![Value::Int(1), Value::from("b")]));
    }

    #[test]
    fn test_multiple_arguments() {
        let d = dispatcher();
        assert_eq!(
            d.validate("mock", "WithArguments", &json!(["foo", 5])).unwrap(),
            vec![Value::from("foo"), Value::Int(5)]
        );
    }

    #[test]
    fn test_string_to_int_coercion() {
        let d = dispatcher();
        let args = d.validate("mock", "Add", &json!(["3", "4"])).unwrap();
        assert_eq!(args, vec![Value::Int(3), Value::Int(4)]);
        assert_eq!(d.run("mock", "Add", args).unwrap(), vec![Value::Int(7)]);
    }

    #[test]
    fn test_strict_mode_rejects_strings() {
        let d = dispatcher_with(DispatcherConfig {
            coercion: CoercionMode::Strict,
            ..Default::default()
        });
        let err = d.validate("mock", "Add", &json!(["3", "4"])).unwrap_err();
        assert!(matches!(err, DispatchError::CoercionFailure { position: 1, .. }));
        assert_eq!(d.validate("mock", "Add", &json!([3, 4])).unwrap(), vec![Value::Int(3), Value::Int(4)]);
    }

    #[test]
    fn test_multiple_arguments_mismatch() {
        let d = dispatcher();

        let err = d.validate("mock", "WithArguments", &json!([true, 4])).unwrap_err();
        assert!(matches!(err, DispatchError::CoercionFailure { position: 1, .. }));

        let err = d.validate("mock", "Add", &json!(["x", 4])).unwrap_err();
        assert!(matches!(err, DispatchError::CoercionFailure { position: 1, .. }));
    }

    #[test]
    fn test_multiple_arguments_expect_slice() {
        let d = dispatcher();
        let err = d.validate("mock", "WithArguments", &json!({"s": "foo"})).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArgExpectedSlice));

        let err = d.validate("mock", "Add", &3).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArgExpectedSlice));
    }

    #[test]
    fn test_multiple_arguments_count() {
        let d = dispatcher();
        let err = d.validate("mock", "Add", &json!([1, 2, 3])).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::InvalidArgumentsCount { expected: Arity::Exactly(2), found: 3 }
        ));
    }

    #[test]
    fn test_variadic_is_flattened() {
        let d = dispatcher();

        let args = d.validate("mock", "Sum", &json!(["1", "x", "y"])).unwrap();
        assert_eq!(args, vec![Value::Int(1), Value::from("x"), Value::from("y")]);
        assert_eq!(d.run("mock", "Sum", args).unwrap(), vec![Value::Int(3)]);

        let args = d.validate("mock", "Sum", &json!([1])).unwrap();
        assert_eq!(d.run("mock", "Sum", args).unwrap(), vec![Value::Int(1)]);

        let err = d.validate("mock", "Sum", &json!([])).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArgumentsCount { .. }));

        let err = d.validate("mock", "Sum", &json!([1, 2])).unwrap_err();
        assert!(matches!(err, DispatchError::CoercionFailure { position: 2, .. }));
    }

    #[test]
    fn test_variadic_only_takes_sequence() {
        let d = dispatcher();
        let args = d.validate("mock", "Tags", &json!([1, "2", 3])).unwrap();
        assert_eq!(args, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        assert_eq!(d.run("mock", "Tags", args).unwrap(), vec![Value::Int(6)]);

        assert!(d.validate("mock", "Tags", &json!([])).unwrap().is_empty());
        assert!(d.validate("mock", "Tags", &json!(null)).unwrap().is_empty());
        assert_eq!(d.validate("mock", "Tags", &"7").unwrap(), vec![Value::Int(7)]);
    }

    #[test]
    fn test_objects_cannot_be_coerced() {
        let d = dispatcher();
        let err = d
            .validate("mock", "Ptr", &Value::object(Arc::new(Mock)))
            .unwrap_err();
        assert!(matches!(err, DispatchError::CoercionFailure { .. }));

        let err = d.validate("mock", "Ptr", &json!({})).unwrap_err();
        assert!(matches!(err, DispatchError::CoercionFailure { .. }));
    }

    #[test]
    fn test_validate_lookup_errors() {
        let d = dispatcher();
        assert!(matches!(
            d.validate("nope", "Add", &json!([])).unwrap_err(),
            DispatchError::NonExistentService { .. }
        ));
        assert!(matches!(
            d.validate("mock", "Nope", &json!([])).unwrap_err(),
            DispatchError::NonExistentMethod { .. }
        ));
    }

    #[test]
    fn test_coerce_nested() {
        let ty = ParamType::map(ParamType::list(ParamType::Float));
        let value = coerce(&ty, CoercionMode::Lenient, 1, json!({"a": [1, "2.5"], "b": []})).unwrap();
        assert_eq!(
            value,
            Value::Map(BTreeMap::from([
                ("a".to_string(), Value::List(vec![Value::Float(1.0), Value::Float(2.5)])),
                ("b".to_string(), Value::List(vec![])),
            ]))
        );
    }
}

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, Serialize, SerializeMap, SerializeSeq, Serializer};
use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::service::{capture, CapturedMethods, Service};

/// Runtime identity of a Rust type carried by an [`Object`]
#[derive(Debug, Clone, Copy)]
pub struct TypeDesc {
    id: TypeId,
    name: &'static str,
}

impl TypeDesc {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeDesc {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDesc {}

impl Hash for TypeDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Shared reference to an arbitrary object.
///
/// The dispatcher never copies the pointee: cloning an `Object` clones the
/// `Arc`, and equality is pointer identity.
#[derive(Clone)]
pub struct Object {
    inner: Arc<dyn Any + Send + Sync>,
    ty: TypeDesc,
    capture: Option<fn() -> CapturedMethods>,
}

impl Object {
    /// Wrap a plain reference. Such an object can be passed as an argument
    /// but cannot be registered as a service.
    pub fn new<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            ty: TypeDesc::of::<T>(),
            capture: None,
        }
    }

    /// Wrap a service so its method table can be captured at registration
    pub fn service<S: Service>(service: Arc<S>) -> Self {
        Self {
            inner: service,
            ty: TypeDesc::of::<S>(),
            capture: Some(capture::<S>),
        }
    }

    pub fn type_desc(&self) -> TypeDesc {
        self.ty
    }

    pub fn type_name(&self) -> &'static str {
        self.ty.name
    }

    pub fn is_service(&self) -> bool {
        self.capture.is_some()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast::<T>().ok()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn as_any(&self) -> &(dyn Any + Send + Sync) {
        &*self.inner
    }

    pub(crate) fn capture(&self) -> Option<fn() -> CapturedMethods> {
        self.capture
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("type", &self.ty.name)
            .field("ptr", &Arc::as_ptr(&self.inner))
            .finish()
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// Dynamically typed argument or result value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Object(Object),
}

impl Value {
    /// Reference to a plain object
    pub fn object<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self::Object(Object::new(value))
    }

    /// Reference to a registrable service
    pub fn service<S: Service>(service: Arc<S>) -> Self {
        Self::Object(Object::service(service))
    }

    /// Short label of the runtime type
    pub fn kind(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(_) => "bool".to_string(),
            Self::Int(_) => "int".to_string(),
            Self::Float(_) => "float".to_string(),
            Self::Str(_) => "string".to_string(),
            Self::List(_) => "list".to_string(),
            Self::Map(_) => "map".to_string(),
            Self::Object(object) => object.type_name().to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident as $target:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant(<$target>::from(value))
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool as bool,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => Int as i64,
    u16 => Int as i64,
    u32 => Int as i64,
    f32 => Float as f64,
    f64 => Float as f64,
    String => Str as String,
    &str => Str as String,
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Self::Map(entries)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(entries: HashMap<String, Value>) -> Self {
        Self::Map(entries.into_iter().collect())
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Str(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Self::Object(object) => Err(ser::Error::custom(format_args!(
                "object of type `{}` has no structured encoding",
                object.type_name()
            ))),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any structured value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(i64::try_from(v).map(Value::Int).unwrap_or(Value::Float(v as f64)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Str(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Str(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut entries = BTreeMap::new();
        while let Some((key, value)) = map.next_entry::<String, Value>()? {
            entries.insert(key, value);
        }
        Ok(Value::Map(entries))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Counter;

    #[test]
    fn test_object_identity() {
        let shared = Arc::new(Counter);
        let a = Value::object(shared.clone());
        let b = Value::object(shared);
        let c = Value::object(Arc::new(Counter));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.kind().ends_with("Counter"));
        assert!(!a.as_object().unwrap().is_service());
    }

    #[test]
    fn test_object_downcast() {
        let object = Object::new(Arc::new(42_u8));
        assert_eq!(object.downcast_ref::<u8>(), Some(&42));
        assert!(object.downcast::<u16>().is_none());
        assert_eq!(object.type_desc(), TypeDesc::of::<u8>());
    }

    #[test]
    fn test_value_from_json() {
        let value: Value = serde_json::from_value(json!({
            "name": "foo",
            "tags": ["a", "b"],
            "count": 3,
            "ratio": 0.5,
            "enabled": true,
            "missing": null,
        }))
        .unwrap();

        let Value::Map(entries) = value else {
            panic!("expected map");
        };
        assert_eq!(entries["name"], Value::from("foo"));
        assert_eq!(entries["tags"], Value::List(vec!["a".into(), "b".into()]));
        assert_eq!(entries["count"], Value::Int(3));
        assert_eq!(entries["ratio"], Value::Float(0.5));
        assert_eq!(entries["enabled"], Value::Bool(true));
        assert!(entries["missing"].is_null());
    }

    #[test]
    fn test_large_unsigned_becomes_float() {
        let value: Value = serde_json::from_value(json!(u64::MAX)).unwrap();
        assert_eq!(value.kind(), "float");
    }

    #[test]
    fn test_object_has_no_encoding() {
        let value = Value::List(vec![Value::Int(1), Value::object(Arc::new(Counter))]);
        let err = serde_json::to_value(&value).unwrap_err();
        assert!(err.to_string().contains("has no structured encoding"));
    }
}

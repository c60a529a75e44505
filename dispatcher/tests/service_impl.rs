use dispatcher::{service_impl, DispatchError, Dispatcher, Object, Value, Variadic};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Default)]
pub struct Mock {
    fields: Mutex<(String, i64)>,
}

#[service_impl]
impl Mock {
    pub fn new() -> Self {
        Self::default()
    }

    #[service_method("Exported")]
    pub fn exported(&self) {}

    fn unexported(&self) {}

    #[service_method("Add")]
    pub fn add(&self, a: i64, b: i64) -> i64 {
        a + b
    }

    #[service_method("MethodWithReturnValue")]
    pub fn with_return_value(&self, s: String, i: i64) -> (String, i64) {
        (s, i)
    }

    #[service_method("MethodWithPtrArguments")]
    pub fn with_ptr(&self, other: Arc<Mock>) -> Arc<Mock> {
        other
    }

    #[service_method("MethodWithMap")]
    pub fn with_map(&self, m: BTreeMap<String, i64>) -> i64 {
        m.values().sum()
    }

    #[service_method("Sum")]
    pub fn sum(&self, a: i64, rest: Variadic<String>) -> i64 {
        a + rest.len() as i64
    }

    #[service_method("SetFields")]
    pub fn set_fields(&self, s: String, i: i64) {
        *self.fields.lock() = (s, i);
    }

    #[service_method("GetFields")]
    pub fn get_fields(&self) -> (String, i64) {
        self.fields.lock().clone()
    }

    #[service_method("Div")]
    pub fn div(&self, a: i64, b: i64) -> anyhow::Result<i64> {
        anyhow::ensure!(b != 0, "division by zero");
        Ok(a / b)
    }

    pub(crate) fn crate_only(&self) -> i64 {
        1
    }

    fn private_helper(&self) -> i64 {
        self.unexported();
        self.crate_only() + 1
    }
}

fn dispatcher() -> Dispatcher {
    let dispatcher = Dispatcher::new();
    dispatcher.register_service("svc", Arc::new(Mock::new())).unwrap();
    dispatcher
}

#[test]
fn test_only_public_methods_are_captured() {
    let d = dispatcher();
    let info = d.describe("svc").unwrap();
    let names: Vec<&str> = info.methods.iter().map(|m| m.name()).collect();

    assert_eq!(
        names,
        vec![
            "Add",
            "Div",
            "Exported",
            "GetFields",
            "MethodWithMap",
            "MethodWithPtrArguments",
            "MethodWithReturnValue",
            "SetFields",
            "Sum",
        ]
    );

    for hidden in ["new", "unexported", "crate_only", "private_helper", "exported", "add"] {
        assert!(matches!(
            d.get_method("svc", hidden).unwrap_err(),
            DispatchError::NonExistentMethod { .. }
        ));
    }
    assert_eq!(Mock::new().private_helper(), 2);
}

#[test]
fn test_captured_signatures() {
    let d = dispatcher();

    let add = d.get_method("svc", "Add").unwrap();
    assert_eq!(add.param_count(), 3);
    assert!(!add.is_variadic());
    assert_eq!(add.to_string(), "Add(int, int) -> int");

    let sum = d.get_method("svc", "Sum").unwrap();
    assert!(sum.is_variadic());
    assert_eq!(sum.fixed_args().len(), 1);

    assert_eq!(d.get_method("svc", "GetFields").unwrap().returns().len(), 2);
    assert!(d.get_method("svc", "Exported").unwrap().returns().is_empty());
}

#[test]
fn test_run_generated_methods() {
    let d = dispatcher();

    assert_eq!(d.run("svc", "Add", vec![3.into(), 4.into()]).unwrap(), vec![Value::Int(7)]);
    assert!(d.run("svc", "Exported", vec![]).unwrap().is_empty());
    assert_eq!(
        d.run("svc", "MethodWithReturnValue", vec!["Hello".into(), 42.into()])
            .unwrap(),
        vec![Value::from("Hello"), Value::Int(42)]
    );

    d.run("svc", "SetFields", vec!["Hello".into(), 42.into()]).unwrap();
    assert_eq!(
        d.run("svc", "GetFields", vec![]).unwrap(),
        vec![Value::from("Hello"), Value::Int(42)]
    );
}

#[test]
fn test_run_variadic_scenarios() {
    let d = dispatcher();

    assert!(matches!(
        d.run("svc", "Sum", vec![]).unwrap_err(),
        DispatchError::InvalidArgumentsCount { .. }
    ));
    assert_eq!(d.run("svc", "Sum", vec![1.into()]).unwrap(), vec![Value::Int(1)]);
    assert_eq!(
        d.run("svc", "Sum", vec![1.into(), "Hello".into(), "World".into()])
            .unwrap(),
        vec![Value::Int(3)]
    );
    assert!(matches!(
        d.run("svc", "Sum", vec![42.into(), 43.into()]).unwrap_err(),
        DispatchError::InvalidArgumentType { position: 2, .. }
    ));
}

#[test]
fn test_object_arguments_keep_identity() {
    let d = dispatcher();
    let other = Arc::new(Mock::new());

    let out = d
        .run("svc", "MethodWithPtrArguments", vec![Value::object(other.clone())])
        .unwrap();
    let returned = out[0].as_object().and_then(Object::downcast::<Mock>).unwrap();
    assert!(Arc::ptr_eq(&returned, &other));
}

#[test]
fn test_method_errors_pass_through() {
    let d = dispatcher();
    assert_eq!(d.run("svc", "Div", vec![9.into(), 3.into()]).unwrap(), vec![Value::Int(3)]);

    let err = d.run("svc", "Div", vec![9.into(), 0.into()]).unwrap_err();
    assert!(matches!(err, DispatchError::Method(_)));
    assert_eq!(err.to_string(), "division by zero");
}

#[test]
fn test_validate_feeds_run() {
    let d = dispatcher();

    let args = d.validate("svc", "Add", &["3", "4"]).unwrap();
    assert_eq!(args, vec![Value::Int(3), Value::Int(4)]);
    assert_eq!(d.run("svc", "Add", args).unwrap(), vec![Value::Int(7)]);

    let args = d
        .validate("svc", "Sum", &serde_json::json!([1, "Hello", "World"]))
        .unwrap();
    assert_eq!(d.run("svc", "Sum", args).unwrap(), vec![Value::Int(3)]);

    let mut map = BTreeMap::new();
    map.insert("a", 1.0);
    map.insert("b", 2.0);
    let args = d.validate("svc", "MethodWithMap", &map).unwrap();
    assert_eq!(d.run("svc", "MethodWithMap", args).unwrap(), vec![Value::Int(3)]);

    assert!(matches!(
        d.validate("svc", "Add", &3).unwrap_err(),
        DispatchError::InvalidArgExpectedSlice
    ));
}

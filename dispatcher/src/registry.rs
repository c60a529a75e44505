use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{DispatcherConfig, VariadicPolicy};
use crate::error::{DispatchError, Result};
use crate::service::{Method, Service};
use crate::signature::MethodSignature;
use crate::value::{Object, Value};

/// A registered service: the object and the methods captured from it
#[derive(Debug)]
pub(crate) struct ServiceEntry {
    pub(crate) instance: Object,
    pub(crate) methods: HashMap<String, Method>,
}

/// Introspection view of a registered service
#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub receiver: String,
    pub methods: Vec<MethodSignature>,
}

/// Registry mapping service names to objects and their method signatures.
///
/// Registration takes the write lock; lookups clone the entry out under the
/// read lock so invoked methods may call back into the dispatcher.
#[derive(Debug, Default)]
pub struct Dispatcher {
    config: DispatcherConfig,
    services: RwLock<HashMap<String, Arc<ServiceEntry>>>,
}

impl Dispatcher {
    /// Create a dispatcher with the default configuration
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    pub fn with_config(config: DispatcherConfig) -> Self {
        Self {
            config,
            services: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Register `instance` under `name`, replacing any previous entry.
    ///
    /// `instance` must be a [`Value::Object`] built from a [`Service`]; every
    /// method its `describe` lists is captured now and never changes.
    pub fn register(&self, name: impl Into<String>, instance: Value) -> Result<()> {
        let name = name.into();

        let object = match instance {
            Value::Object(object) => object,
            other => return Err(DispatchError::InvalidServiceType { found: other.kind() }),
        };
        let capture = object.capture().ok_or_else(|| DispatchError::InvalidServiceType {
            found: object.type_name().to_string(),
        })?;

        let captured = capture();
        if let Some(err) = captured.errors.into_iter().next() {
            return Err(err);
        }

        let mut methods = HashMap::with_capacity(captured.methods.len());
        for method in captured.methods {
            if method.signature().is_variadic() && self.config.variadic == VariadicPolicy::Reject {
                return Err(DispatchError::VariadicNotSupported {
                    method: method.signature().name().to_string(),
                });
            }
            methods.insert(method.signature().name().to_string(), method);
        }

        info!(
            "Registered service '{}' ({}) with {} methods",
            name,
            object.type_name(),
            methods.len()
        );

        let entry = Arc::new(ServiceEntry {
            instance: object,
            methods,
        });
        self.services.write().insert(name, entry);
        Ok(())
    }

    /// Typed shortcut for [`Dispatcher::register`]
    pub fn register_service<S: Service>(&self, name: impl Into<String>, service: Arc<S>) -> Result<()> {
        self.register(name, Value::service(service))
    }

    /// Remove a service; returns whether it was registered
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.services.write().remove(name).is_some();
        if removed {
            info!("Unregistered service '{}'", name);
        }
        removed
    }

    pub fn contains(&self, name: &str) -> bool {
        self.services.read().contains_key(name)
    }

    /// Registered service names, sorted
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Look up the signature of `method` on `service`
    pub fn get_method(&self, service: &str, method: &str) -> Result<MethodSignature> {
        let (_, method) = self.lookup(service, method)?;
        Ok(method.signature().clone())
    }

    /// Describe every method of a registered service
    pub fn describe(&self, service: &str) -> Result<ServiceInfo> {
        let entry = self.get_service(service)?;
        let mut methods: Vec<MethodSignature> = entry
            .methods
            .values()
            .map(|method| method.signature().clone())
            .collect();
        methods.sort_by(|a, b| a.name().cmp(b.name()));

        Ok(ServiceInfo {
            name: service.to_string(),
            receiver: entry.instance.type_name().to_string(),
            methods,
        })
    }

    fn get_service(&self, service: &str) -> Result<Arc<ServiceEntry>> {
        self.services
            .read()
            .get(service)
            .cloned()
            .ok_or_else(|| DispatchError::NonExistentService {
                service: service.to_string(),
            })
    }

    pub(crate) fn lookup(&self, service: &str, method: &str) -> Result<(Arc<ServiceEntry>, Method)> {
        let entry = self.get_service(service)?;
        let found = entry
            .methods
            .get(method)
            .cloned()
            .ok_or_else(|| DispatchError::NonExistentMethod {
                service: service.to_string(),
                method: method.to_string(),
            })?;

        debug!("Resolved {}.{} as {}", service, method, found.signature());
        Ok((entry, found))
    }
}

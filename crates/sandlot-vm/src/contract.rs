//! Contract entities: one `init`, a table of exported methods, and the
//! storage properties the contract declared when it was constructed.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::env::ContractEnv;
use crate::error::VmError;
use crate::storage::{PropertySerde, StorageAccessorTable};

/// Name of the deploy-time entry point.
pub const INIT_METHOD: &str = "init";

pub type Method = Rc<dyn Fn(&mut ContractEnv<'_>, &[Value]) -> Result<Value, VmError>>;

pub struct ContractDefinition {
    name: String,
    storage: StorageAccessorTable,
    init: Method,
    methods: BTreeMap<String, Method>,
}

impl ContractDefinition {
    pub fn builder(name: &str) -> ContractBuilder {
        ContractBuilder {
            name: name.to_string(),
            storage: StorageAccessorTable::new(),
            init: None,
            methods: BTreeMap::new(),
            error: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage(&self) -> &StorageAccessorTable {
        &self.storage
    }

    pub(crate) fn init(&self) -> Method {
        Rc::clone(&self.init)
    }

    /// An exported method. `init` is not callable through this path.
    pub(crate) fn method(&self, name: &str) -> Result<Method, VmError> {
        self.methods
            .get(name)
            .cloned()
            .ok_or_else(|| VmError::MethodNotFound(format!("{}.{}", self.name, name)))
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

impl fmt::Debug for ContractDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractDefinition")
            .field("name", &self.name)
            .field("storage", &self.storage)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Collects declarations; the first error wins and is returned by `build`.
pub struct ContractBuilder {
    name: String,
    storage: StorageAccessorTable,
    init: Option<Method>,
    methods: BTreeMap<String, Method>,
    error: Option<VmError>,
}

impl ContractBuilder {
    fn record(&mut self, result: Result<(), VmError>) {
        if let Err(err) = result {
            self.error.get_or_insert(err);
        }
    }

    /// Declare a scalar property persisted with the default JSON serde.
    pub fn scalar(mut self, name: &str) -> Self {
        let result = self.storage.declare_scalar(name, None);
        self.record(result);
        self
    }

    pub fn scalar_with(mut self, name: &str, serde: Rc<dyn PropertySerde>) -> Self {
        let result = self.storage.declare_scalar(name, Some(serde));
        self.record(result);
        self
    }

    /// Declare a map property persisted with the default JSON serde.
    pub fn map(mut self, name: &str) -> Self {
        let result = self.storage.declare_map(name, None);
        self.record(result);
        self
    }

    pub fn map_with(mut self, name: &str, serde: Rc<dyn PropertySerde>) -> Self {
        let result = self.storage.declare_map(name, Some(serde));
        self.record(result);
        self
    }

    pub fn init<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ContractEnv<'_>, &[Value]) -> Result<Value, VmError> + 'static,
    {
        if self.init.is_some() {
            self.record(Err(VmError::DuplicateMethod(INIT_METHOD.to_string())));
        } else {
            self.init = Some(Rc::new(f));
        }
        self
    }

    pub fn method<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&mut ContractEnv<'_>, &[Value]) -> Result<Value, VmError> + 'static,
    {
        if name == INIT_METHOD || self.methods.contains_key(name) {
            self.record(Err(VmError::DuplicateMethod(name.to_string())));
        } else {
            self.methods.insert(name.to_string(), Rc::new(f));
        }
        self
    }

    pub fn build(self) -> Result<ContractDefinition, VmError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let init = self.init.ok_or_else(|| VmError::MissingInit(self.name.clone()))?;
        Ok(ContractDefinition {
            name: self.name,
            storage: self.storage,
            init,
            methods: self.methods,
        })
    }
}

//! Script engine seam.
//!
//! Parsing and running module source is the engine's job, not the runtime's.
//! [`NativeEngine`] is the engine for contracts written in Rust: module
//! source of the form `native:<name>` selects a registered factory.

use std::collections::HashMap;
use std::rc::Rc;

use crate::error::VmError;
use crate::loader::{Export, ModuleScope};

pub trait ScriptEngine {
    /// Run a module's top-level code and return what it exports.
    fn evaluate(&self, id: &str, source: &str, scope: &mut ModuleScope<'_>) -> Result<Export, VmError>;
}

pub type ModuleFactory = Rc<dyn Fn(&mut ModuleScope<'_>) -> Result<Export, VmError>>;

/// Source prefix that selects a native factory.
pub const NATIVE_SOURCE_PREFIX: &str = "native:";

#[derive(Default)]
pub struct NativeEngine {
    factories: HashMap<String, ModuleFactory>,
}

impl NativeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module factory under `name` (source text `native:<name>`).
    pub fn register<F>(&mut self, name: &str, factory: F) -> &mut Self
    where
        F: Fn(&mut ModuleScope<'_>) -> Result<Export, VmError> + 'static,
    {
        self.factories.insert(name.to_string(), Rc::new(factory));
        self
    }

    pub fn source_for(name: &str) -> String {
        format!("{}{}", NATIVE_SOURCE_PREFIX, name)
    }
}

impl ScriptEngine for NativeEngine {
    fn evaluate(&self, id: &str, source: &str, scope: &mut ModuleScope<'_>) -> Result<Export, VmError> {
        let name = source
            .trim()
            .strip_prefix(NATIVE_SOURCE_PREFIX)
            .ok_or_else(|| VmError::execution(format!("module {} is not a native module", id)))?;

        let factory = self
            .factories
            .get(name)
            .cloned()
            .ok_or_else(|| VmError::execution(format!("no native factory named {}", name)))?;

        factory(scope)
    }
}

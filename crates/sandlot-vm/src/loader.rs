//! Module loading and the per-context require cache.
//!
//! Ids are canonicalised before they reach the host resolver, and ids that
//! try to leave the module root never reach it at all. Each loaded module is
//! evaluated once per execution context; later requires hand back the same
//! [`Exports`] handle.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::contract::ContractDefinition;
use crate::engine::ScriptEngine;
use crate::error::VmError;
use crate::host::ModuleResolver;
use crate::metering::MeterHook;

/// What a module's top-level code produced.
pub enum Export {
    /// A contract entity: `init` plus exported methods
    Contract(Rc<ContractDefinition>),
    /// Plain data
    Value(Value),
    /// Host-native object (a shared console, a helper library)
    Object(Box<dyn Any>),
}

/// Shared handle to a module's exports.
#[derive(Clone)]
pub struct Exports(Rc<Export>);

impl Exports {
    pub fn new(export: Export) -> Self {
        Self(Rc::new(export))
    }

    /// Whether both handles refer to the same evaluated module.
    pub fn ptr_eq(&self, other: &Exports) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn export(&self) -> &Export {
        &self.0
    }

    pub fn contract(&self) -> Option<Rc<ContractDefinition>> {
        match &*self.0 {
            Export::Contract(def) => Some(Rc::clone(def)),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match &*self.0 {
            Export::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match &*self.0 {
            Export::Object(obj) => obj.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for Exports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &*self.0 {
            Export::Contract(def) => format!("Contract({})", def.name()),
            Export::Value(_) => "Value".to_string(),
            Export::Object(_) => "Object".to_string(),
        };
        write!(f, "Exports({} @ {:p})", kind, Rc::as_ptr(&self.0))
    }
}

enum ModuleSlot {
    /// Top-level code is still running
    Loading,
    Loaded(Exports),
}

/// Require cache owned by one execution context.
pub struct ModuleLoader {
    cache: HashMap<String, ModuleSlot>,
    max_id_len: usize,
    surcharge: u64,
}

impl ModuleLoader {
    pub fn new(max_id_len: usize) -> Self {
        Self {
            cache: HashMap::new(),
            max_id_len,
            surcharge: 0,
        }
    }

    /// Units charged on every require, cache hits and nested requires included.
    pub fn with_surcharge(mut self, units: u64) -> Self {
        self.surcharge = units;
        self
    }

    /// Load `id`, evaluating it through `engine` on first use.
    ///
    /// Fatal errors are latched through `meter` before they are returned, so
    /// module code that drops the `Err` still fails the transaction.
    ///
    /// # Errors
    /// - `OutOfGas` when the surcharge exhausts the counter
    /// - `ForbiddenModulePath` for ids that try to escape the module root
    /// - `ModuleNotFound` when the resolver has no source for the id
    /// - `CircularRequire` when the id is still being evaluated
    pub fn require(
        &mut self,
        id: &str,
        resolver: &dyn ModuleResolver,
        engine: &dyn ScriptEngine,
        meter: &mut MeterHook<'_>,
    ) -> Result<Exports, VmError> {
        self.load(id, resolver, engine, meter)
            .map_err(|err| meter.latch(err))
    }

    fn load(
        &mut self,
        id: &str,
        resolver: &dyn ModuleResolver,
        engine: &dyn ScriptEngine,
        meter: &mut MeterHook<'_>,
    ) -> Result<Exports, VmError> {
        meter.incr(self.surcharge)?;
        let canonical = canonicalize(id, self.max_id_len)?;

        match self.cache.get(&canonical) {
            Some(ModuleSlot::Loaded(exports)) => return Ok(exports.clone()),
            Some(ModuleSlot::Loading) => return Err(VmError::CircularRequire(canonical)),
            None => {}
        }

        let source = resolver
            .resolve_module(&canonical)
            .ok_or_else(|| VmError::ModuleNotFound(canonical.clone()))?;

        self.cache.insert(canonical.clone(), ModuleSlot::Loading);
        tracing::debug!("Evaluating module {} ({} bytes)", canonical, source.len());

        let result = {
            let mut scope = ModuleScope {
                loader: self,
                resolver,
                engine,
                meter: meter.reborrow(),
                id: &canonical,
            };
            engine.evaluate(&canonical, &source, &mut scope)
        };

        match result {
            Ok(export) => {
                let exports = Exports::new(export);
                self.cache
                    .insert(canonical, ModuleSlot::Loaded(exports.clone()));
                Ok(exports)
            }
            Err(err) => {
                self.cache.remove(&canonical);
                Err(err)
            }
        }
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        canonicalize(id, self.max_id_len)
            .map(|c| matches!(self.cache.get(&c), Some(ModuleSlot::Loaded(_))))
            .unwrap_or(false)
    }

    pub fn loaded_count(&self) -> usize {
        self.cache
            .values()
            .filter(|slot| matches!(slot, ModuleSlot::Loaded(_)))
            .count()
    }
}

/// Handle given to a module's top-level code while it evaluates.
pub struct ModuleScope<'a> {
    loader: &'a mut ModuleLoader,
    resolver: &'a dyn ModuleResolver,
    engine: &'a dyn ScriptEngine,
    meter: MeterHook<'a>,
    id: &'a str,
}

impl<'a> ModuleScope<'a> {
    /// Canonical id of the module being evaluated.
    pub fn module_id(&self) -> &str {
        self.id
    }

    /// Require from the module's top-level code; metered like any other.
    pub fn require(&mut self, id: &str) -> Result<Exports, VmError> {
        self.loader
            .require(id, self.resolver, self.engine, &mut self.meter)
    }

    /// Metering hook for the module's own top-level code.
    pub fn meter(&mut self) -> MeterHook<'_> {
        self.meter.reborrow()
    }
}

/// Normalise a module id relative to the module root.
///
/// Leading `./` and interior `.` segments are dropped. Anything that could
/// address a file outside the root is refused.
pub fn canonicalize(id: &str, max_len: usize) -> Result<String, VmError> {
    let forbidden = |reason| VmError::ForbiddenModulePath {
        id: id.to_string(),
        reason,
    };

    if id.is_empty() || id.len() > max_len {
        return Err(VmError::InvalidModuleId(id.to_string()));
    }
    if id.starts_with('/') {
        return Err(forbidden("absolute path"));
    }
    if id.contains('\\') {
        return Err(forbidden("backslash separator"));
    }
    if id.contains(':') {
        return Err(forbidden("scheme or drive prefix"));
    }
    if id.contains('\0') {
        return Err(forbidden("NUL byte"));
    }

    let mut segments = Vec::new();
    for segment in id.split('/') {
        match segment {
            "." => continue,
            ".." => return Err(forbidden("parent directory segment")),
            "" => return Err(forbidden("empty path segment")),
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(VmError::InvalidModuleId(id.to_string()));
    }
    Ok(segments.join("/"))
}

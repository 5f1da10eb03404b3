//! Global bindings visible to contract code.
//!
//! The engine routes every global read, assignment and delete through this
//! table. Host bindings are installed at bootstrap and frozen before any
//! contract code runs.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::VmError;

/// Host objects a global name can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Console,
    LocalContractStorage,
    Blockchain,
    BigNumber,
    Require,
    InstructionCounter,
}

impl Builtin {
    pub const ALL: [Builtin; 6] = [
        Builtin::Console,
        Builtin::LocalContractStorage,
        Builtin::Blockchain,
        Builtin::BigNumber,
        Builtin::Require,
        Builtin::InstructionCounter,
    ];

    pub fn global_name(self) -> &'static str {
        match self {
            Builtin::Console => "console",
            Builtin::LocalContractStorage => "LocalContractStorage",
            Builtin::Blockchain => "Blockchain",
            Builtin::BigNumber => "BigNumber",
            Builtin::Require => "require",
            Builtin::InstructionCounter => "_instruction_counter",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlobalValue {
    Builtin(Builtin),
    Value(Value),
}

#[derive(Debug, Clone)]
struct Binding {
    value: GlobalValue,
    frozen: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GlobalScope {
    bindings: BTreeMap<String, Binding>,
}

impl GlobalScope {
    /// Install the host bindings and freeze them.
    pub fn bootstrap() -> Self {
        let mut scope = Self::default();
        for builtin in Builtin::ALL {
            scope.bindings.insert(
                builtin.global_name().to_string(),
                Binding {
                    value: GlobalValue::Builtin(builtin),
                    frozen: true,
                },
            );
        }
        scope
    }

    pub fn get(&self, name: &str) -> Option<&GlobalValue> {
        self.bindings.get(name).map(|b| &b.value)
    }

    pub fn is_frozen(&self, name: &str) -> bool {
        self.bindings.get(name).map(|b| b.frozen).unwrap_or(false)
    }

    /// Assign or redefine a contract global.
    pub fn define(&mut self, name: &str, value: Value) -> Result<(), VmError> {
        if self.is_frozen(name) {
            return Err(VmError::FrozenBinding(name.to_string()));
        }
        self.bindings.insert(
            name.to_string(),
            Binding {
                value: GlobalValue::Value(value),
                frozen: false,
            },
        );
        Ok(())
    }

    /// Remove a contract global. Returns whether it existed.
    pub fn delete(&mut self, name: &str) -> Result<bool, VmError> {
        if self.is_frozen(name) {
            return Err(VmError::FrozenBinding(name.to_string()));
        }
        Ok(self.bindings.remove(name).is_some())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_freezes_host_bindings() {
        let scope = GlobalScope::bootstrap();
        for builtin in Builtin::ALL {
            assert!(scope.is_frozen(builtin.global_name()));
            assert_eq!(
                scope.get(builtin.global_name()),
                Some(&GlobalValue::Builtin(builtin))
            );
        }
    }

    #[test]
    fn test_frozen_binding_cannot_change() {
        let mut scope = GlobalScope::bootstrap();
        let err = scope.define("_instruction_counter", Value::from(0)).unwrap_err();
        assert_eq!(err, VmError::FrozenBinding("_instruction_counter".into()));
        assert!(scope.delete("console").is_err());
        assert_eq!(
            scope.get("_instruction_counter"),
            Some(&GlobalValue::Builtin(Builtin::InstructionCounter))
        );
    }

    #[test]
    fn test_contract_globals_are_mutable() {
        let mut scope = GlobalScope::bootstrap();
        scope.define("limit", Value::from(5)).unwrap();
        scope.define("limit", Value::from(6)).unwrap();
        assert_eq!(scope.get("limit"), Some(&GlobalValue::Value(Value::from(6))));
        assert!(scope.delete("limit").unwrap());
        assert!(!scope.delete("limit").unwrap());
    }
}

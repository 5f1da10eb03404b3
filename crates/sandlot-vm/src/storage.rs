//! Contract storage bridge.
//!
//! A contract declares its persistent properties once, at construction,
//! into a [`StorageAccessorTable`]. Reads and writes then go straight through
//! to the host store; nothing is cached or buffered here, so rollback of a
//! failed transaction is entirely the host's business.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use sandlot_types::Address;
use serde_json::Value;

use crate::bignum::BigNumber;
use crate::context::ExecutionContext;
use crate::contract::ContractDefinition;
use crate::error::VmError;
use crate::host::StorageKey;

/// Conversion between persisted text and in-memory property values.
///
/// Implementations must round-trip: `parse(stringify(v))` is equivalent to
/// `v`, and `stringify(parse(t))` is equivalent to `t` for every text the
/// property will ever hold.
pub trait PropertySerde {
    fn parse(&self, text: &str) -> Result<Value, VmError>;
    fn stringify(&self, value: &Value) -> Result<String, VmError>;
}

/// Default serde: plain JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerde;

impl PropertySerde for JsonSerde {
    fn parse(&self, text: &str) -> Result<Value, VmError> {
        Ok(serde_json::from_str(text)?)
    }

    fn stringify(&self, value: &Value) -> Result<String, VmError> {
        Ok(serde_json::to_string(value)?)
    }
}

/// Persists big numbers as their canonical decimal text.
///
/// In memory the value is the decimal string, as produced by
/// [`BigNumber::to_value`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BigNumberSerde;

impl PropertySerde for BigNumberSerde {
    fn parse(&self, text: &str) -> Result<Value, VmError> {
        let number: BigNumber = text
            .parse()
            .map_err(|_| VmError::Serde(format!("stored value is not a number: {:?}", text)))?;
        Ok(number.to_value())
    }

    fn stringify(&self, value: &Value) -> Result<String, VmError> {
        let number = BigNumber::from_value(value)
            .map_err(|_| VmError::Serde(format!("cannot store {} as a number", value)))?;
        Ok(number.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Scalar,
    Map,
}

impl PropertyKind {
    fn label(self) -> &'static str {
        match self {
            PropertyKind::Scalar => "scalar",
            PropertyKind::Map => "map",
        }
    }
}

#[derive(Clone)]
pub struct PropertyAccessor {
    pub kind: PropertyKind,
    pub serde: Rc<dyn PropertySerde>,
}

impl fmt::Debug for PropertyAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind.label())
    }
}

/// Declared properties of one contract, keyed by name.
///
/// Only the contract builder can add entries, so the table is fixed once
/// the contract exists. Scalar and map names share one namespace.
#[derive(Debug, Clone, Default)]
pub struct StorageAccessorTable {
    entries: BTreeMap<String, PropertyAccessor>,
}

impl StorageAccessorTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn declare(
        &mut self,
        name: &str,
        kind: PropertyKind,
        serde: Option<Rc<dyn PropertySerde>>,
    ) -> Result<(), VmError> {
        if name.is_empty() {
            return Err(VmError::InvalidValue("storage property name is empty".to_string()));
        }
        if self.entries.contains_key(name) {
            return Err(VmError::DuplicateProperty(name.to_string()));
        }
        let serde = serde.unwrap_or_else(|| Rc::new(JsonSerde));
        self.entries
            .insert(name.to_string(), PropertyAccessor { kind, serde });
        Ok(())
    }

    pub(crate) fn declare_scalar(
        &mut self,
        name: &str,
        serde: Option<Rc<dyn PropertySerde>>,
    ) -> Result<(), VmError> {
        self.declare(name, PropertyKind::Scalar, serde)
    }

    pub(crate) fn declare_map(
        &mut self,
        name: &str,
        serde: Option<Rc<dyn PropertySerde>>,
    ) -> Result<(), VmError> {
        self.declare(name, PropertyKind::Map, serde)
    }

    pub fn get(&self, name: &str) -> Option<&PropertyAccessor> {
        self.entries.get(name)
    }

    pub fn kind(&self, name: &str) -> Option<PropertyKind> {
        self.entries.get(name).map(|a| a.kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, name: &str, kind: PropertyKind) -> Result<PropertyAccessor, VmError> {
        let accessor = self
            .entries
            .get(name)
            .ok_or_else(|| VmError::UndeclaredProperty(name.to_string()))?;
        if accessor.kind != kind {
            return Err(VmError::PropertyKindMismatch {
                name: name.to_string(),
                expected: kind.label(),
            });
        }
        Ok(accessor.clone())
    }
}

/// Storage of the contract running in the current frame.
pub struct ContractStorage<'e> {
    ctx: &'e mut ExecutionContext,
    contract: Address,
    definition: Rc<ContractDefinition>,
}

impl<'e> ContractStorage<'e> {
    pub(crate) fn new(
        ctx: &'e mut ExecutionContext,
        contract: Address,
        definition: Rc<ContractDefinition>,
    ) -> Self {
        Self {
            ctx,
            contract,
            definition,
        }
    }

    /// Read a scalar property. An absent value is `None`, not an error.
    pub fn get(&mut self, name: &str) -> Result<Option<Value>, VmError> {
        let accessor = self.definition.storage().lookup(name, PropertyKind::Scalar)?;
        self.read(&accessor, &StorageKey::scalar(name))
    }

    /// Overwrite a scalar property.
    pub fn set(&mut self, name: &str, value: &Value) -> Result<(), VmError> {
        let accessor = self.definition.storage().lookup(name, PropertyKind::Scalar)?;
        self.write(&accessor, &StorageKey::scalar(name), value)
    }

    /// Accessor for a map property.
    pub fn map(&mut self, name: &str) -> Result<StorageMap<'_, 'e>, VmError> {
        let accessor = self.definition.storage().lookup(name, PropertyKind::Map)?;
        Ok(StorageMap {
            storage: self,
            name: name.to_string(),
            accessor,
        })
    }

    fn read(&mut self, accessor: &PropertyAccessor, key: &StorageKey) -> Result<Option<Value>, VmError> {
        let cost = self.ctx.config().gas.storage_read;
        self.ctx.charge(cost)?;

        let Some(bytes) = self.ctx.host().storage_get(&self.contract, key) else {
            return Ok(None);
        };
        let text = String::from_utf8(bytes).map_err(|e| {
            self.ctx.latch(VmError::MalformedHostResponse(format!(
                "storage value for {:?} is not UTF-8: {}",
                key, e
            )))
        })?;
        accessor.serde.parse(&text).map(Some)
    }

    fn write(&mut self, accessor: &PropertyAccessor, key: &StorageKey, value: &Value) -> Result<(), VmError> {
        let cost = self.ctx.config().gas.storage_write;
        self.ctx.charge(cost)?;

        let text = accessor.serde.stringify(value)?;
        self.ctx
            .host()
            .storage_set(&self.contract, key, text.as_bytes());
        Ok(())
    }

    fn delete(&mut self, key: &StorageKey) -> Result<(), VmError> {
        let cost = self.ctx.config().gas.storage_delete;
        self.ctx.charge(cost)?;
        self.ctx.host().storage_del(&self.contract, key);
        Ok(())
    }
}

/// One map property of the current contract.
pub struct StorageMap<'s, 'e> {
    storage: &'s mut ContractStorage<'e>,
    name: String,
    accessor: PropertyAccessor,
}

impl<'s, 'e> StorageMap<'s, 'e> {
    pub fn get(&mut self, key: &str) -> Result<Option<Value>, VmError> {
        let slot = StorageKey::field(&self.name, key);
        self.storage.read(&self.accessor, &slot)
    }

    pub fn set(&mut self, key: &str, value: &Value) -> Result<(), VmError> {
        let slot = StorageKey::field(&self.name, key);
        self.storage.write(&self.accessor, &slot, value)
    }

    /// Remove `key`. Deleting an absent key is a no-op.
    pub fn del(&mut self, key: &str) -> Result<(), VmError> {
        let slot = StorageKey::field(&self.name, key);
        self.storage.delete(&slot)
    }
}

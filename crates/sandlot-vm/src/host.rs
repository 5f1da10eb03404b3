//! Native bridge surface consumed by the runtime.
//!
//! Everything behind these traits belongs to the embedding process: the
//! persistent store, the chain index, the module root and the log sink.
//! Every method is a synchronous foreign call.

use num_bigint::BigUint;
use sandlot_types::{Address, Hash};

/// Log levels understood by the host `log` primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Persistent location of one storage value.
///
/// Scalar properties have no `field`; map properties carry the user key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    pub property: String,
    pub field: Option<String>,
}

impl StorageKey {
    pub fn scalar(property: &str) -> Self {
        Self {
            property: property.to_string(),
            field: None,
        }
    }

    pub fn field(property: &str, field: &str) -> Self {
        Self {
            property: property.to_string(),
            field: Some(field.to_string()),
        }
    }

    /// Flat slot id for hosts that key storage by a single digest.
    ///
    /// Components are length-framed and scalar slots use a different arity
    /// from map slots, so no two distinct keys share a slot.
    pub fn slot(&self, contract: &Address) -> Hash {
        match &self.field {
            None => Hash::compute_framed(&[contract.as_bytes(), b"scalar", self.property.as_bytes()]),
            Some(field) => Hash::compute_framed(&[
                contract.as_bytes(),
                b"map",
                self.property.as_bytes(),
                field.as_bytes(),
            ]),
        }
    }
}

/// Read queries answered by the chain index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainQuery {
    AccountState(Address),
    TransactionByHash(Hash),
    BlockByHash(Hash),
    LatestRank(Address),
    LatestRankSummary,
}

impl ChainQuery {
    pub fn name(&self) -> &'static str {
        match self {
            ChainQuery::AccountState(_) => "getAccountState",
            ChainQuery::TransactionByHash(_) => "getTransactionByHash",
            ChainQuery::BlockByHash(_) => "getBlockByHash",
            ChainQuery::LatestRank(_) => "getLatestRank",
            ChainQuery::LatestRankSummary => "getLatestRankSummary",
        }
    }
}

/// Source of module text.
pub trait ModuleResolver {
    /// Source for a canonical module id, or `None` when no such module exists.
    fn resolve_module(&self, id: &str) -> Option<String>;
}

/// Full native surface.
pub trait NativeHost: ModuleResolver {
    fn log(&self, level: LogLevel, message: &str);

    /// Module id holding the code deployed at `address`.
    fn contract_module(&self, address: &Address) -> Option<String>;

    /// JSON-encoded record, or `None` when the chain has no such record.
    fn query(&self, query: &ChainQuery) -> Option<String>;

    /// Move `amount` from `from` to `to`. `false` when the host refuses.
    fn transfer(&self, from: &Address, to: &Address, amount: &BigUint) -> bool;

    fn storage_get(&self, contract: &Address, key: &StorageKey) -> Option<Vec<u8>>;

    fn storage_set(&self, contract: &Address, key: &StorageKey, value: &[u8]);

    fn storage_del(&self, contract: &Address, key: &StorageKey);
}

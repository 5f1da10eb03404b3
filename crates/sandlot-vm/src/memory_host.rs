//! In-memory host for embedders and tests.
//!
//! [`MemoryStore`] is the committed state, safe to share between worker
//! threads. Each transaction runs against its own [`TransactionHost`], which
//! buffers writes and balance changes until [`TransactionHost::commit`];
//! dropping it discards them.

use std::collections::HashMap;
use std::sync::Arc;

use num_bigint::BigUint;
use parking_lot::{Mutex, RwLock};
use sandlot_types::{Address, Hash};
use serde::Serialize;

use crate::host::{ChainQuery, LogLevel, ModuleResolver, NativeHost, StorageKey};

type RecordKey = (&'static str, String);

fn record_key(query: &ChainQuery) -> RecordKey {
    let key = match query {
        ChainQuery::AccountState(a) | ChainQuery::LatestRank(a) => a.to_hex(),
        ChainQuery::TransactionByHash(h) | ChainQuery::BlockByHash(h) => h.to_hex(),
        ChainQuery::LatestRankSummary => String::new(),
    };
    (query.name(), key)
}

/// Committed chain state.
#[derive(Debug, Default)]
pub struct MemoryStore {
    storage: RwLock<HashMap<Hash, Vec<u8>>>,
    balances: RwLock<HashMap<Address, BigUint>>,
    modules: RwLock<HashMap<String, String>>,
    contracts: RwLock<HashMap<Address, String>>,
    records: RwLock<HashMap<RecordKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&self, id: &str, source: &str) {
        self.modules.write().insert(id.to_string(), source.to_string());
    }

    /// Bind `address` to the module holding its code.
    pub fn deploy_contract(&self, address: Address, module_id: &str) {
        self.contracts.write().insert(address, module_id.to_string());
    }

    pub fn set_balance(&self, address: Address, amount: BigUint) {
        self.balances.write().insert(address, amount);
    }

    pub fn balance(&self, address: &Address) -> BigUint {
        self.balances.read().get(address).cloned().unwrap_or_default()
    }

    pub fn put_record<T: Serialize>(&self, query: &ChainQuery, record: &T) -> Result<(), serde_json::Error> {
        let text = serde_json::to_string(record)?;
        self.put_raw_record(query, &text);
        Ok(())
    }

    /// Store a query answer verbatim, malformed or not.
    pub fn put_raw_record(&self, query: &ChainQuery, text: &str) {
        self.records.write().insert(record_key(query), text.to_string());
    }

    pub fn storage_value(&self, contract: &Address, key: &StorageKey) -> Option<Vec<u8>> {
        self.storage.read().get(&key.slot(contract)).cloned()
    }

    /// Number of occupied storage slots.
    pub fn storage_len(&self) -> usize {
        self.storage.read().len()
    }
}

/// A value transfer the runtime asked the host for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    pub from: Address,
    pub to: Address,
    pub amount: BigUint,
    pub accepted: bool,
}

/// Per-transaction view over a [`MemoryStore`].
#[derive(Debug)]
pub struct TransactionHost {
    store: Arc<MemoryStore>,
    /// `None` marks a delete
    writes: Mutex<HashMap<Hash, Option<Vec<u8>>>>,
    balances: Mutex<HashMap<Address, BigUint>>,
    transfers: Mutex<Vec<TransferRecord>>,
    logs: Mutex<Vec<(LogLevel, String)>>,
}

impl TransactionHost {
    pub fn begin(store: Arc<MemoryStore>) -> Self {
        Self {
            store,
            writes: Mutex::new(HashMap::new()),
            balances: Mutex::new(HashMap::new()),
            transfers: Mutex::new(Vec::new()),
            logs: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Apply buffered writes and balance changes to the store.
    pub fn commit(&self) {
        let writes: Vec<_> = self.writes.lock().drain().collect();
        let balances: Vec<_> = self.balances.lock().drain().collect();
        tracing::debug!("Committing {} storage writes", writes.len());

        let mut storage = self.store.storage.write();
        for (slot, value) in writes {
            match value {
                Some(bytes) => storage.insert(slot, bytes),
                None => storage.remove(&slot),
            };
        }
        drop(storage);

        let mut committed = self.store.balances.write();
        committed.extend(balances);
    }

    pub fn pending_writes(&self) -> usize {
        self.writes.lock().len()
    }

    pub fn balance(&self, address: &Address) -> BigUint {
        self.balances
            .lock()
            .get(address)
            .cloned()
            .unwrap_or_else(|| self.store.balance(address))
    }

    /// Every transfer the runtime asked for, refused ones included.
    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.transfers.lock().clone()
    }

    pub fn logs(&self) -> Vec<(LogLevel, String)> {
        self.logs.lock().clone()
    }
}

impl ModuleResolver for TransactionHost {
    fn resolve_module(&self, id: &str) -> Option<String> {
        self.store.modules.read().get(id).cloned()
    }
}

impl NativeHost for TransactionHost {
    fn log(&self, level: LogLevel, message: &str) {
        self.logs.lock().push((level, message.to_string()));
    }

    fn contract_module(&self, address: &Address) -> Option<String> {
        self.store.contracts.read().get(address).cloned()
    }

    fn query(&self, query: &ChainQuery) -> Option<String> {
        self.store.records.read().get(&record_key(query)).cloned()
    }

    fn transfer(&self, from: &Address, to: &Address, amount: &BigUint) -> bool {
        let from_balance = self.balance(from);
        let accepted = from_balance >= *amount;
        if accepted && from != to {
            let to_balance = self.balance(to);
            let mut balances = self.balances.lock();
            balances.insert(*from, from_balance - amount);
            balances.insert(*to, to_balance + amount);
        }
        self.transfers.lock().push(TransferRecord {
            from: *from,
            to: *to,
            amount: amount.clone(),
            accepted,
        });
        accepted
    }

    fn storage_get(&self, contract: &Address, key: &StorageKey) -> Option<Vec<u8>> {
        let slot = key.slot(contract);
        if let Some(pending) = self.writes.lock().get(&slot) {
            return pending.clone();
        }
        self.store.storage.read().get(&slot).cloned()
    }

    fn storage_set(&self, contract: &Address, key: &StorageKey, value: &[u8]) {
        self.writes.lock().insert(key.slot(contract), Some(value.to_vec()));
    }

    fn storage_del(&self, contract: &Address, key: &StorageKey) {
        self.writes.lock().insert(key.slot(contract), None);
    }
}

//! Per-transaction execution state.
//!
//! An [`ExecutionContext`] owns everything one transaction's execution may
//! touch: the require cache, the instruction counter, the call stack and the
//! global scope. Nothing in it is shared with other contexts; the only shared
//! resource is the host behind [`NativeHost`].

use std::rc::Rc;
use std::sync::Arc;

use num_bigint::BigUint;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sandlot_types::{Address, Hash};
use serde_json::Value;

use crate::bignum::BigNumber;
use crate::blockchain::validate_amount;
use crate::call_stack::{CallStack, CapabilityFlags};
use crate::config::VmConfig;
use crate::contract::{ContractDefinition, Method, INIT_METHOD};
use crate::engine::ScriptEngine;
use crate::env::ContractEnv;
use crate::error::VmError;
use crate::globals::GlobalScope;
use crate::host::{ModuleResolver, NativeHost};
use crate::loader::{Exports, ModuleLoader};
use crate::metering::{InstructionCounter, MeterHook};

/// The transaction being executed.
#[derive(Debug, Clone, PartialEq)]
pub struct TxEnv {
    pub hash: Hash,
    pub from: Address,
    /// Contract the transaction targets
    pub to: Address,
    /// Value attached by the sender
    pub value: BigNumber,
    pub nonce: u64,
    /// Per-transaction cap; never raises the configured limit
    pub instruction_limit: Option<u64>,
}

impl TxEnv {
    pub fn new(from: Address, to: Address) -> Self {
        Self {
            hash: Hash::ZERO,
            from,
            to,
            value: BigNumber::zero(),
            nonce: 0,
            instruction_limit: None,
        }
    }

    pub fn with_hash(mut self, hash: Hash) -> Self {
        self.hash = hash;
        self
    }

    pub fn with_value(mut self, value: BigNumber) -> Self {
        self.value = value;
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_instruction_limit(mut self, limit: u64) -> Self {
        self.instruction_limit = Some(limit);
        self
    }
}

/// The block the transaction is included in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockEnv {
    pub height: u64,
    /// Seconds since the Unix epoch
    pub timestamp: u64,
    pub hash: Hash,
}

/// Which entry point a top-level run targets.
enum Entry<'m> {
    Init,
    Method(&'m str),
}

/// Adapts the host for the loader, which only needs module resolution.
struct HostResolver<'h>(&'h dyn NativeHost);

impl ModuleResolver for HostResolver<'_> {
    fn resolve_module(&self, id: &str) -> Option<String> {
        self.0.resolve_module(id)
    }
}

pub struct ExecutionContext {
    host: Arc<dyn NativeHost>,
    engine: Rc<dyn ScriptEngine>,
    config: Arc<VmConfig>,
    tx: TxEnv,
    block: BlockEnv,
    modules: ModuleLoader,
    counter: InstructionCounter,
    stack: CallStack,
    globals: GlobalScope,
    rng: Option<ChaCha20Rng>,
    fatal: Option<VmError>,
}

impl ExecutionContext {
    pub fn new(
        host: Arc<dyn NativeHost>,
        engine: Rc<dyn ScriptEngine>,
        config: Arc<VmConfig>,
        tx: TxEnv,
        block: BlockEnv,
    ) -> Self {
        let limit = tx
            .instruction_limit
            .map(|l| l.min(config.instruction_limit))
            .unwrap_or(config.instruction_limit);
        let stack = CallStack::with_max_depth(config.max_call_depth)
            .allow_reentrancy(config.allow_reentrancy);

        Self {
            modules: ModuleLoader::new(config.max_module_id_len)
                .with_surcharge(config.gas.require),
            counter: InstructionCounter::new(limit),
            stack,
            globals: GlobalScope::bootstrap(),
            rng: None,
            fatal: None,
            host,
            engine,
            config,
            tx,
            block,
        }
    }

    pub fn tx(&self) -> &TxEnv {
        &self.tx
    }

    pub fn block(&self) -> &BlockEnv {
        &self.block
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn counter(&self) -> &InstructionCounter {
        &self.counter
    }

    pub fn instruction_count(&self) -> u64 {
        self.counter.count()
    }

    pub fn call_stack(&self) -> &CallStack {
        &self.stack
    }

    pub fn globals(&self) -> &GlobalScope {
        &self.globals
    }

    pub(crate) fn globals_mut(&mut self) -> &mut GlobalScope {
        &mut self.globals
    }

    pub fn modules(&self) -> &ModuleLoader {
        &self.modules
    }

    /// The first fatal error raised in this context, if any.
    pub fn fatal_error(&self) -> Option<&VmError> {
        self.fatal.as_ref()
    }

    pub(crate) fn host(&self) -> &dyn NativeHost {
        &*self.host
    }

    /// Hook handed to the instrumentation pass.
    pub fn meter(&mut self) -> MeterHook<'_> {
        MeterHook::new(&mut self.counter, &mut self.fatal)
    }

    /// Add a bridge surcharge.
    pub(crate) fn charge(&mut self, units: u64) -> Result<(), VmError> {
        self.counter.charge(units).map_err(|e| self.latch(e))
    }

    /// Record `err` if it is fatal and hand it back for propagation.
    pub(crate) fn latch(&mut self, err: VmError) -> VmError {
        if err.is_fatal() && self.fatal.is_none() {
            tracing::warn!("Fatal error latched: {}", err);
            self.fatal = Some(err.clone());
        }
        err
    }

    /// Load a module into this context's cache.
    pub fn require(&mut self, id: &str) -> Result<Exports, VmError> {
        let resolver = HostResolver(&*self.host);
        let mut meter = MeterHook::new(&mut self.counter, &mut self.fatal);
        self.modules
            .require(id, &resolver, &*self.engine, &mut meter)
    }

    /// Next value from the frame's seeded generator, in `[0, 1)`.
    ///
    /// The generator is seeded lazily from the block and transaction hashes,
    /// so every replay of a transaction draws the same sequence.
    pub(crate) fn next_random(&mut self) -> f64 {
        let rng = self.rng.get_or_insert_with(|| {
            let seed = Hash::compute_framed(&[
                &self.block.hash.as_bytes()[..],
                &self.tx.hash.as_bytes()[..],
            ]);
            ChaCha20Rng::from_seed(*seed.as_bytes())
        });
        rng.gen::<f64>()
    }

    pub(crate) fn current_capabilities(&self) -> CapabilityFlags {
        self.stack
            .current_frame()
            .map(|f| f.capabilities)
            .unwrap_or_default()
    }

    /// Run the target contract's `init`.
    pub fn deploy(&mut self, args: &[Value]) -> Result<Value, VmError> {
        self.run_top_level(Entry::Init, args)
    }

    /// Run one exported method of the target contract.
    pub fn invoke(&mut self, method: &str, args: &[Value]) -> Result<Value, VmError> {
        self.run_top_level(Entry::Method(method), args)
    }

    fn run_top_level(&mut self, entry: Entry<'_>, args: &[Value]) -> Result<Value, VmError> {
        let to = self.tx.to;
        let from = self.tx.from;
        let value = validate_amount(&self.tx.value)?;

        let definition = self.load_contract(&to)?;
        let method = match entry {
            Entry::Init => definition.init(),
            Entry::Method(name) => Self::exported(&definition, name)?,
        };

        let capabilities = CapabilityFlags::top_level(self.config.enable_random);
        self.stack.enter(from, to, value, capabilities)?;
        let result = self.run_frame(to, definition, method, args);
        self.stack.exit()?;

        match &self.fatal {
            Some(err) => Err(err.clone()),
            None => result,
        }
    }

    /// Call `method` on `callee` from the contract in the current frame.
    pub(crate) fn call_contract(
        &mut self,
        callee: &Address,
        method: &str,
        args: &[Value],
        value: &BigNumber,
    ) -> Result<Value, VmError> {
        self.charge(self.config.gas.inner_call)?;
        let amount = validate_amount(value)?;
        let caller = self
            .stack
            .current_frame()
            .map(|f| f.callee)
            .ok_or_else(|| VmError::execution("inner call outside a contract frame"))?;

        self.stack
            .enter(caller, *callee, amount.clone(), CapabilityFlags::inner())?;
        let result = self.enter_callee(caller, callee, method, args, &amount);
        self.stack.exit()?;
        result
    }

    fn enter_callee(
        &mut self,
        caller: Address,
        callee: &Address,
        method: &str,
        args: &[Value],
        amount: &BigUint,
    ) -> Result<Value, VmError> {
        let definition = self.load_contract(callee)?;
        let method_fn = Self::exported(&definition, method)?;

        if *amount > BigUint::default() && !self.host.transfer(&caller, callee, amount) {
            tracing::warn!("Value transfer {} -> {} of {} refused", caller, callee, amount);
            return Err(VmError::execution(format!(
                "transfer of {} to {} refused by host",
                amount, callee
            )));
        }

        tracing::debug!("Inner call {}.{} from {}", definition.name(), method, caller);
        self.run_frame(*callee, definition, method_fn, args)
    }

    fn run_frame(
        &mut self,
        address: Address,
        definition: Rc<ContractDefinition>,
        method: Method,
        args: &[Value],
    ) -> Result<Value, VmError> {
        let mut env = ContractEnv::new(self, address, definition);
        method(&mut env, args)
    }

    fn exported(definition: &ContractDefinition, name: &str) -> Result<Method, VmError> {
        if name == INIT_METHOD {
            return Err(VmError::MethodNotFound(format!(
                "{}.{} is only callable at deploy",
                definition.name(),
                name
            )));
        }
        definition.method(name)
    }

    fn load_contract(&mut self, address: &Address) -> Result<Rc<ContractDefinition>, VmError> {
        if !address.is_contract() {
            return Err(VmError::ContractNotFound(address.to_string()));
        }
        let module_id = self
            .host
            .contract_module(address)
            .ok_or_else(|| VmError::ContractNotFound(address.to_string()))?;
        let exports = self.require(&module_id)?;
        exports.contract().ok_or_else(|| {
            VmError::execution(format!("module {} does not export a contract", module_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NativeEngine;
    use crate::loader::Export;
    use crate::memory_host::{MemoryStore, TransactionHost};
    use sandlot_types::AddressKind;

    fn addr(kind: AddressKind, byte: u8) -> Address {
        Address::new(kind, [byte; 20])
    }

    fn context_with(engine: NativeEngine, store: Arc<MemoryStore>, tx: TxEnv) -> ExecutionContext {
        ExecutionContext::new(
            Arc::new(TransactionHost::begin(store)),
            Rc::new(engine),
            Arc::new(VmConfig::default()),
            tx,
            BlockEnv::default(),
        )
    }

    #[test]
    fn test_per_tx_limit_never_raises_config() {
        let store = Arc::new(MemoryStore::new());
        let tx = TxEnv::new(addr(AddressKind::Account, 1), addr(AddressKind::Contract, 2))
            .with_instruction_limit(u64::MAX);
        let ctx = context_with(NativeEngine::new(), store, tx);
        assert_eq!(ctx.counter().limit(), VmConfig::default().instruction_limit);
    }

    #[test]
    fn test_require_charges_and_memoizes() {
        let mut engine = NativeEngine::new();
        engine.register("util", |_scope| Ok(Export::Value(Value::from(7))));
        let store = Arc::new(MemoryStore::new());
        store.add_module("util", &NativeEngine::source_for("util"));
        let tx = TxEnv::new(addr(AddressKind::Account, 1), addr(AddressKind::Contract, 2));
        let mut ctx = context_with(engine, store, tx);

        let a = ctx.require("util").unwrap();
        let b = ctx.require("./util").unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(ctx.instruction_count(), 2 * ctx.config().gas.require);
    }

    #[test]
    fn test_forbidden_require_is_latched() {
        let store = Arc::new(MemoryStore::new());
        let tx = TxEnv::new(addr(AddressKind::Account, 1), addr(AddressKind::Contract, 2));
        let mut ctx = context_with(NativeEngine::new(), store, tx);

        let err = ctx.require("../escape").unwrap_err();
        assert!(matches!(err, VmError::ForbiddenModulePath { .. }));
        assert_eq!(ctx.fatal_error(), Some(&err));
    }

    #[test]
    fn test_missing_contract() {
        let store = Arc::new(MemoryStore::new());
        let tx = TxEnv::new(addr(AddressKind::Account, 1), addr(AddressKind::Contract, 2));
        let mut ctx = context_with(NativeEngine::new(), store, tx);
        assert!(matches!(ctx.invoke("run", &[]), Err(VmError::ContractNotFound(_))));
    }

    #[test]
    fn test_random_is_deterministic() {
        let store = Arc::new(MemoryStore::new());
        let tx = TxEnv::new(addr(AddressKind::Account, 1), addr(AddressKind::Contract, 2))
            .with_hash(Hash::compute(b"tx"));
        let mut a = context_with(NativeEngine::new(), Arc::clone(&store), tx.clone());
        let mut b = context_with(NativeEngine::new(), store, tx);
        let first: Vec<f64> = (0..4).map(|_| a.next_random()).collect();
        let second: Vec<f64> = (0..4).map(|_| b.next_random()).collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|x| (0.0..1.0).contains(x)));
    }
}

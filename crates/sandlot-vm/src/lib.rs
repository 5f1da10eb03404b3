//! Sandlot VM - the runtime shim between a sandboxed script engine and the
//! chain host.
//!
//! This crate provides:
//! - Module loading with a per-transaction require cache
//! - Contract storage and blockchain bridges
//! - Tamper-proof instruction metering
//! - Nested contract calls with per-frame capabilities
//! - An in-memory host for embedders and tests

pub mod bignum;
pub mod blockchain;
pub mod call_stack;
pub mod config;
pub mod console;
pub mod context;
pub mod contract;
pub mod engine;
pub mod env;
pub mod error;
pub mod globals;
pub mod host;
pub mod loader;
pub mod memory_host;
pub mod metering;
pub mod runtime;
pub mod storage;
pub mod telemetry;

pub use bignum::BigNumber;
pub use blockchain::{verify_address, AddressClass, Blockchain};
pub use call_stack::{CallFrame, CallStack, CapabilityFlags};
pub use config::VmConfig;
pub use console::Console;
pub use context::{BlockEnv, ExecutionContext, TxEnv};
pub use contract::{ContractBuilder, ContractDefinition, INIT_METHOD};
pub use engine::{NativeEngine, ScriptEngine};
pub use env::ContractEnv;
pub use error::{ErrorKind, FailureReason, VmError};
pub use globals::{Builtin, GlobalScope, GlobalValue};
pub use host::{ChainQuery, LogLevel, ModuleResolver, NativeHost, StorageKey};
pub use loader::{Export, Exports, ModuleLoader, ModuleScope};
pub use memory_host::{MemoryStore, TransactionHost, TransferRecord};
pub use metering::{GasSchedule, InstructionCounter, MeterHook};
pub use runtime::{ContractVm, ExecutionResult};
pub use storage::{BigNumberSerde, ContractStorage, JsonSerde, PropertySerde, StorageMap};

/// Maximum call depth, top-level frame included
pub const MAX_CALL_DEPTH: usize = 64;

/// Default per-transaction instruction ceiling
pub const DEFAULT_INSTRUCTION_LIMIT: u64 = 10_000_000_000;

/// Longest module id accepted by the loader
pub const MAX_MODULE_ID_LEN: usize = 256;

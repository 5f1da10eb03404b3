//! What a running contract method can reach.
//!
//! A [`ContractEnv`] is built for every frame. It exposes the bridges bound to
//! the frame's contract, inner calls, `require`, the metering hook and the
//! global scope; it never exposes the counter or the call stack mutably.

use std::rc::Rc;

use sandlot_types::Address;
use serde_json::Value;

use crate::bignum::BigNumber;
use crate::blockchain::Blockchain;
use crate::call_stack::{CallFrame, CapabilityFlags};
use crate::console::Console;
use crate::context::ExecutionContext;
use crate::contract::ContractDefinition;
use crate::error::VmError;
use crate::globals::{Builtin, GlobalValue};
use crate::loader::Exports;
use crate::metering::MeterHook;
use crate::storage::ContractStorage;

pub struct ContractEnv<'a> {
    ctx: &'a mut ExecutionContext,
    address: Address,
    definition: Rc<ContractDefinition>,
}

impl<'a> ContractEnv<'a> {
    pub(crate) fn new(
        ctx: &'a mut ExecutionContext,
        address: Address,
        definition: Rc<ContractDefinition>,
    ) -> Self {
        Self {
            ctx,
            address,
            definition,
        }
    }

    /// Address of the contract running in this frame.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn contract_name(&self) -> &str {
        self.definition.name()
    }

    pub fn frame(&self) -> Option<&CallFrame> {
        self.ctx.call_stack().current_frame()
    }

    /// Immediate caller: the sender at top level, the calling contract otherwise.
    pub fn caller(&self) -> Option<Address> {
        self.frame().map(|f| f.caller)
    }

    /// Value attached to this frame.
    pub fn attached_value(&self) -> BigNumber {
        self.frame()
            .map(|f| BigNumber::from(f.value.clone()))
            .unwrap_or_else(BigNumber::zero)
    }

    pub fn depth(&self) -> usize {
        self.frame().map(|f| f.depth).unwrap_or(0)
    }

    pub fn capabilities(&self) -> CapabilityFlags {
        self.ctx.current_capabilities()
    }

    pub fn storage(&mut self) -> ContractStorage<'_> {
        ContractStorage::new(&mut *self.ctx, self.address, Rc::clone(&self.definition))
    }

    pub fn blockchain(&mut self) -> Blockchain<'_> {
        Blockchain::new(&mut *self.ctx, self.address)
    }

    pub fn console(&mut self) -> Console<'_> {
        Console::new(&mut *self.ctx, self.address)
    }

    pub fn require(&mut self, id: &str) -> Result<Exports, VmError> {
        self.ctx.require(id)
    }

    /// Synchronously call `method` on another contract.
    ///
    /// The callee shares this transaction's instruction budget but gets none
    /// of this frame's capabilities. Its error comes back unchanged.
    pub fn call(
        &mut self,
        callee: &Address,
        method: &str,
        args: &[Value],
        value: &BigNumber,
    ) -> Result<Value, VmError> {
        self.ctx.call_contract(callee, method, args, value)
    }

    /// Seeded random number in `[0, 1)`.
    pub fn random(&mut self) -> Result<f64, VmError> {
        if !self.capabilities().random {
            return Err(VmError::CapabilityUnavailable("random"));
        }
        Ok(self.ctx.next_random())
    }

    /// Block timestamp, standing in for the wall clock.
    pub fn now(&self) -> Result<u64, VmError> {
        if !self.capabilities().date {
            return Err(VmError::CapabilityUnavailable("date"));
        }
        Ok(self.ctx.block().timestamp)
    }

    /// Metering hook for instrumented code in this frame.
    pub fn meter(&mut self) -> MeterHook<'_> {
        self.ctx.meter()
    }

    pub fn instruction_count(&self) -> u64 {
        self.ctx.instruction_count()
    }

    /// Read a global. `_instruction_counter` yields the live count.
    pub fn global(&self, name: &str) -> Option<GlobalValue> {
        match self.ctx.globals().get(name)? {
            GlobalValue::Builtin(Builtin::InstructionCounter) => {
                Some(GlobalValue::Value(Value::from(self.ctx.instruction_count())))
            }
            other => Some(other.clone()),
        }
    }

    /// Assign a global. Host bindings are frozen; touching one is fatal.
    pub fn set_global(&mut self, name: &str, value: Value) -> Result<(), VmError> {
        let result = self.ctx.globals_mut().define(name, value);
        result.map_err(|e| self.ctx.latch(e))
    }

    pub fn delete_global(&mut self, name: &str) -> Result<bool, VmError> {
        let result = self.ctx.globals_mut().delete(name);
        result.map_err(|e| self.ctx.latch(e))
    }
}

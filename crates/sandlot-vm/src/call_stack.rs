//! Call stack for nested contract invocation.
//!
//! Tracks one frame per active contract invocation, bounds the depth, and
//! optionally rejects re-entry into a contract that is already executing.

use std::collections::HashMap;

use num_bigint::BigUint;
use sandlot_types::Address;

use crate::error::VmError;
use crate::MAX_CALL_DEPTH;

/// Host capabilities visible to a single frame. Never inherited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilityFlags {
    /// Seeded randomness
    pub random: bool,
    /// Block timestamp as wall clock
    pub date: bool,
}

impl CapabilityFlags {
    /// Flags for the frame that the transaction itself targets.
    pub fn top_level(random_enabled: bool) -> Self {
        Self {
            random: random_enabled,
            date: true,
        }
    }

    /// Flags for a frame reached through an inner call.
    pub fn inner() -> Self {
        Self::default()
    }
}

/// A single frame in the call stack.
#[derive(Debug, Clone, PartialEq)]
pub struct CallFrame {
    pub caller: Address,
    pub callee: Address,
    /// Value attached to this call
    pub value: BigUint,
    /// 0 for the top-level frame
    pub depth: usize,
    pub capabilities: CapabilityFlags,
}

#[derive(Debug, Clone)]
pub struct CallStack {
    frames: Vec<CallFrame>,
    /// How many frames each callee currently occupies
    active: HashMap<Address, usize>,
    max_depth: usize,
    allow_reentrancy: bool,
}

impl CallStack {
    pub fn new() -> Self {
        Self::with_max_depth(MAX_CALL_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            active: HashMap::new(),
            max_depth,
            allow_reentrancy: false,
        }
    }

    pub fn allow_reentrancy(mut self, allow: bool) -> Self {
        self.allow_reentrancy = allow;
        self
    }

    /// Push a frame for `callee`.
    ///
    /// # Errors
    /// - `CallDepthExceeded` when the stack is already `max_depth` deep
    /// - `ReentrancyViolation` when `callee` is already executing and
    ///   re-entry is disabled
    pub fn enter(
        &mut self,
        caller: Address,
        callee: Address,
        value: BigUint,
        capabilities: CapabilityFlags,
    ) -> Result<usize, VmError> {
        let depth = self.frames.len();

        if depth >= self.max_depth {
            return Err(VmError::CallDepthExceeded {
                depth,
                max: self.max_depth,
            });
        }

        if !self.allow_reentrancy && self.contains(&callee) {
            return Err(VmError::ReentrancyViolation(format!(
                "Contract {} is already in call stack",
                callee
            )));
        }

        *self.active.entry(callee).or_insert(0) += 1;
        self.frames.push(CallFrame {
            caller,
            callee,
            value,
            depth,
            capabilities,
        });
        tracing::debug!("Entered frame {} for {}", depth, callee);

        Ok(depth)
    }

    /// Pop the innermost frame.
    pub fn exit(&mut self) -> Result<CallFrame, VmError> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| VmError::ReentrancyViolation("Call stack is empty".to_string()))?;

        if let Some(count) = self.active.get_mut(&frame.callee) {
            *count -= 1;
            if *count == 0 {
                self.active.remove(&frame.callee);
            }
        }
        tracing::debug!("Left frame {} for {}", frame.depth, frame.callee);
        Ok(frame)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.active.contains_key(address)
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}

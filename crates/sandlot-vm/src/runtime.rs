//! Transaction dispatcher.
//!
//! [`ContractVm`] turns one transaction into one fresh [`ExecutionContext`],
//! runs it, and reports an [`ExecutionResult`]. It never applies or discards
//! state itself; the host decides what to do with the writes it buffered.

use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::VmConfig;
use crate::context::{BlockEnv, ExecutionContext, TxEnv};
use crate::engine::ScriptEngine;
use crate::error::{FailureReason, VmError};
use crate::host::NativeHost;

/// Result of one transaction's execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether execution succeeded
    pub success: bool,
    /// Return value of the entry point
    pub value: Option<Value>,
    /// Instructions charged, surcharges included
    pub instructions_used: u64,
    pub failure: Option<FailureReason>,
}

impl ExecutionResult {
    pub fn success(value: Value, instructions_used: u64) -> Self {
        Self {
            success: true,
            value: Some(value),
            instructions_used,
            failure: None,
        }
    }

    pub fn failure(error: &VmError, instructions_used: u64) -> Self {
        Self {
            success: false,
            value: None,
            instructions_used,
            failure: Some(FailureReason::from(error)),
        }
    }

    fn from_outcome(outcome: Result<Value, VmError>, instructions_used: u64) -> Self {
        match outcome {
            Ok(value) => Self::success(value, instructions_used),
            Err(err) => Self::failure(&err, instructions_used),
        }
    }
}

/// Runs transactions against contracts loaded through a script engine.
///
/// Contexts hold the engine by `Rc`, so a `ContractVm` stays on the worker
/// thread that built it; run one per worker.
pub struct ContractVm {
    config: Arc<VmConfig>,
    engine: Rc<dyn ScriptEngine>,
}

impl ContractVm {
    pub fn new(config: VmConfig, engine: Rc<dyn ScriptEngine>) -> anyhow::Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            engine,
        })
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Fresh context for one transaction.
    pub fn context(&self, host: Arc<dyn NativeHost>, tx: TxEnv, block: BlockEnv) -> ExecutionContext {
        ExecutionContext::new(
            host,
            Rc::clone(&self.engine),
            Arc::clone(&self.config),
            tx,
            block,
        )
    }

    /// Run `init` of the contract at `tx.to`.
    ///
    /// Each call runs `init` again. Deploying a contract only once is up to
    /// the orchestrator, which owns the contract table the host reads.
    pub fn deploy(
        &self,
        host: Arc<dyn NativeHost>,
        tx: TxEnv,
        block: BlockEnv,
        args: &[Value],
    ) -> ExecutionResult {
        let mut ctx = self.context(host, tx, block);
        let outcome = ctx.deploy(args);
        self.finish(&ctx, "init", outcome)
    }

    /// Run `method` of the contract at `tx.to`.
    pub fn execute(
        &self,
        host: Arc<dyn NativeHost>,
        tx: TxEnv,
        block: BlockEnv,
        method: &str,
        args: &[Value],
    ) -> ExecutionResult {
        let mut ctx = self.context(host, tx, block);
        let outcome = ctx.invoke(method, args);
        self.finish(&ctx, method, outcome)
    }

    fn finish(
        &self,
        ctx: &ExecutionContext,
        method: &str,
        outcome: Result<Value, VmError>,
    ) -> ExecutionResult {
        let used = ctx.instruction_count();
        match &outcome {
            Ok(_) => tracing::info!(
                "Transaction {} -> {}.{} succeeded, {} instructions",
                ctx.tx().hash,
                ctx.tx().to,
                method,
                used
            ),
            Err(err) => tracing::info!(
                "Transaction {} -> {}.{} failed ({:?}): {}",
                ctx.tx().hash,
                ctx.tx().to,
                method,
                err.kind(),
                err
            ),
        }
        ExecutionResult::from_outcome(outcome, used)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_result_constructors() {
        let ok = ExecutionResult::success(Value::from(1), 10);
        assert!(ok.success);
        assert!(ok.failure.is_none());

        let failed = ExecutionResult::failure(&VmError::OutOfGas { used: 11, limit: 10 }, 10);
        assert!(!failed.success);
        assert_eq!(failed.value, None);
        assert_eq!(failed.failure.map(|f| f.kind), Some(ErrorKind::OutOfGas));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = VmConfig {
            max_call_depth: 0,
            ..VmConfig::default()
        };
        let engine: Rc<dyn ScriptEngine> = Rc::new(crate::engine::NativeEngine::new());
        assert!(ContractVm::new(config, engine).is_err());
    }
}

//! Contract-visible console.

use sandlot_types::Address;

use crate::context::ExecutionContext;
use crate::error::VmError;
use crate::host::LogLevel;

pub struct Console<'e> {
    ctx: &'e mut ExecutionContext,
    contract: Address,
}

impl<'e> Console<'e> {
    pub(crate) fn new(ctx: &'e mut ExecutionContext, contract: Address) -> Self {
        Self { ctx, contract }
    }

    /// Same as `info`.
    pub fn log(&mut self, message: &str) -> Result<(), VmError> {
        self.emit(LogLevel::Info, message)
    }

    pub fn debug(&mut self, message: &str) -> Result<(), VmError> {
        self.emit(LogLevel::Debug, message)
    }

    pub fn info(&mut self, message: &str) -> Result<(), VmError> {
        self.emit(LogLevel::Info, message)
    }

    pub fn warn(&mut self, message: &str) -> Result<(), VmError> {
        self.emit(LogLevel::Warn, message)
    }

    pub fn error(&mut self, message: &str) -> Result<(), VmError> {
        self.emit(LogLevel::Error, message)
    }

    fn emit(&mut self, level: LogLevel, message: &str) -> Result<(), VmError> {
        let cost = self.ctx.config().gas.log;
        self.ctx.charge(cost)?;
        self.ctx.host().log(level, message);

        let contract = &self.contract;
        match level {
            LogLevel::Debug => tracing::debug!(%contract, "{}", message),
            LogLevel::Info => tracing::info!(%contract, "{}", message),
            LogLevel::Warn => tracing::warn!(%contract, "{}", message),
            LogLevel::Error => tracing::error!(%contract, "{}", message),
        }
        Ok(())
    }
}

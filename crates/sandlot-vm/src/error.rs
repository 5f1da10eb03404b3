use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classes reported to the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Module or contract code could not be found
    Resolution,
    /// Forbidden module path or an attempt to rebind a frozen global
    Security,
    /// Malformed numeric or address argument
    InvalidValue,
    /// Instruction limit exceeded
    OutOfGas,
    /// Call depth exceeded or forbidden re-entry
    ReentrancyLimit,
    /// Contract-level fault
    Execution,
    /// Host answered with something the runtime cannot decode
    Internal,
}

/// Errors that can occur during contract execution.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VmError {
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Invalid module id: {0:?}")]
    InvalidModuleId(String),

    #[error("Circular require of module {0}")]
    CircularRequire(String),

    #[error("Contract not found: {0}")]
    ContractNotFound(String),

    #[error("Forbidden module path {id:?}: {reason}")]
    ForbiddenModulePath { id: String, reason: &'static str },

    #[error("Global binding {0} is frozen")]
    FrozenBinding(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Out of gas: used {used}, limit {limit}")]
    OutOfGas { used: u64, limit: u64 },

    #[error("Call depth exceeded: {depth} >= {max}")]
    CallDepthExceeded { depth: usize, max: usize },

    #[error("Reentrancy violation: {0}")]
    ReentrancyViolation(String),

    #[error("Contract execution error: {0}")]
    ExecutionError(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Storage property {0} is already declared")]
    DuplicateProperty(String),

    #[error("Method {0} is already exported")]
    DuplicateMethod(String),

    #[error("Contract {0} does not export an init method")]
    MissingInit(String),

    #[error("Storage property {0} is not declared")]
    UndeclaredProperty(String),

    #[error("Storage property {name} is not a {expected} property")]
    PropertyKindMismatch { name: String, expected: &'static str },

    #[error("Serialization error: {0}")]
    Serde(String),

    #[error("Capability unavailable in this call frame: {0}")]
    CapabilityUnavailable(&'static str),

    #[error("Malformed host response: {0}")]
    MalformedHostResponse(String),
}

impl VmError {
    /// Convenience for contract code raising its own fault.
    pub fn execution(message: impl Into<String>) -> Self {
        VmError::ExecutionError(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            VmError::ModuleNotFound(_)
            | VmError::InvalidModuleId(_)
            | VmError::CircularRequire(_)
            | VmError::ContractNotFound(_) => ErrorKind::Resolution,
            VmError::ForbiddenModulePath { .. } | VmError::FrozenBinding(_) => ErrorKind::Security,
            VmError::InvalidValue(_) | VmError::InvalidAddress(_) => ErrorKind::InvalidValue,
            VmError::OutOfGas { .. } => ErrorKind::OutOfGas,
            VmError::CallDepthExceeded { .. } | VmError::ReentrancyViolation(_) => {
                ErrorKind::ReentrancyLimit
            }
            VmError::MalformedHostResponse(_) => ErrorKind::Internal,
            VmError::ExecutionError(_)
            | VmError::MethodNotFound(_)
            | VmError::DuplicateProperty(_)
            | VmError::DuplicateMethod(_)
            | VmError::MissingInit(_)
            | VmError::UndeclaredProperty(_)
            | VmError::PropertyKindMismatch { .. }
            | VmError::Serde(_)
            | VmError::CapabilityUnavailable(_) => ErrorKind::Execution,
        }
    }

    /// Fatal errors end the transaction even if contract code catches them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::OutOfGas | ErrorKind::Security | ErrorKind::Internal
        )
    }
}

impl From<serde_json::Error> for VmError {
    fn from(e: serde_json::Error) -> Self {
        VmError::Serde(e.to_string())
    }
}

/// Structured failure reason handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&VmError> for FailureReason {
    fn from(err: &VmError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

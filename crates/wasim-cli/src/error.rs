use crate::plan::Operator;
use thiserror::Error;

/// Errors surfaced by the simulation driver and the CLI commands.
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("invalid config format")]
    InvalidConfigFormat,

    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    #[error("invalid step: {0}")]
    InvalidStep(String),

    #[error("invalid endpoint")]
    InvalidEndpoint,

    #[error("invalid param type: {0}")]
    InvalidParamType(String),

    #[error("failed to cast param type: {0}")]
    FailedParamTypeCast(String),

    #[error("named key not found: {0}")]
    NamedKeyNotFound(String),

    #[error("duplicate key name: {0}")]
    DuplicateKeyName(String),

    #[error("program not found: {0}")]
    ProgramNotFound(String),

    #[error("program path required for this step")]
    ProgramPathRequired,

    #[error("key name required for this step")]
    KeyNameRequired,

    #[error("assertion failed expected result: {actual} {operator} {operand}")]
    ResultAssertionFailed {
        actual: u64,
        operator: Operator,
        operand: u64,
    },

    #[error("assertion failed expected balance: {actual} {operator} {operand}")]
    BalanceAssertionFailed {
        actual: u64,
        operator: Operator,
        operand: u64,
    },

    #[error("runtime error: {0}")]
    Runtime(#[from] wasim_runtime::RuntimeError),

    #[error("storage error: {0}")]
    Storage(#[from] wasim_state::StorageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

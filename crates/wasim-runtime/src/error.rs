use thiserror::Error;
use wasmtime::Trap;

/// Errors that can occur during runtime construction and calls.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Invalid runtime configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to compile module: {0}")]
    Compile(String),

    #[error("Missing import: {module}::{name}")]
    MissingImport { module: String, name: String },

    #[error("Failed to instantiate module: {0}")]
    Instantiate(String),

    #[error("Export not found: {0}")]
    ExportNotFound(String),

    #[error("failed to grow memory by {0}")]
    MemoryGrow(u64),

    #[error("Memory access out of range: offset {offset}, length {length}")]
    MemoryOutOfRange { offset: u64, length: u64 },

    #[error("Program not found in state")]
    ProgramNotFound,

    #[error("Call depth exceeded: {0}")]
    CallDepthExceeded(usize),

    #[error("Runtime not initialized")]
    NotInitialized,

    #[error("Runtime already initialized")]
    AlreadyInitialized,

    #[error("Runtime stopped")]
    Stopped,

    #[error("Call cancelled")]
    Cancelled,

    #[error("Unexpected result type from: {0}")]
    UnexpectedResultType(String),

    #[error("wasm trap: {code}")]
    Trap { code: Trap },

    #[error("Storage error: {0}")]
    Storage(#[from] wasim_state::StorageError),

    #[error("Invalid id: {0}")]
    Types(#[from] wasim_types::TypesError),

    #[error("{0}")]
    Wasm(String),
}

impl RuntimeError {
    /// The preserved wasmtime trap code, if this error wraps a guest trap.
    pub fn trap_code(&self) -> Option<Trap> {
        match self {
            RuntimeError::Trap { code } => Some(*code),
            _ => None,
        }
    }
}

impl From<wasmtime::Error> for RuntimeError {
    fn from(e: wasmtime::Error) -> Self {
        match e.downcast_ref::<Trap>() {
            Some(code) => RuntimeError::Trap { code: *code },
            None => RuntimeError::Wasm(format!("{:#}", e)),
        }
    }
}

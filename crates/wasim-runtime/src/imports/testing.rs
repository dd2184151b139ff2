//! Debug imports available only in testing-only mode.

use super::Import;
use crate::error::RuntimeError;
use crate::runtime::StoreData;
use wasmtime::Linker;

pub const MODULE: &str = "testing";

/// Registered by the runtime itself when `enable_testing_only_mode` is set.
pub struct TestingImport;

impl Import for TestingImport {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn register(&self, linker: &mut Linker<StoreData>) -> Result<(), RuntimeError> {
        linker
            .func_wrap(MODULE, "log_i64", |value: i64| {
                tracing::debug!(target: "wasim::guest", value, "guest log");
            })
            .map_err(|e| RuntimeError::Wasm(e.to_string()))?;

        Ok(())
    }
}

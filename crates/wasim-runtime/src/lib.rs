//! Wasim Runtime - Metered WebAssembly execution for the WASIM program
//! simulator.
//!
//! This crate provides:
//! - Engine configuration from a validated `RuntimeConfig`
//! - Module instantiation under fuel metering and fixed store limits
//! - A memory accessor and fuel meter over the live store
//! - The host-import registry with the built-in `state` and `program`
//!   capability modules
//! - Program-to-program re-entry with an inherited fuel budget

pub mod config;
pub mod error;
pub mod imports;
pub mod memory;
pub mod meter;
pub mod runtime;

pub use config::{CompileStrategy, RuntimeConfig, MEMORY_PAGE_SIZE};
pub use error::RuntimeError;
pub use imports::{default_imports, Import, ImportRegistry};
pub use memory::MemoryView;
pub use meter::Meter;
pub use runtime::{CancelHandle, Runtime, StoreData};

//! Host-capability modules callable from guest wasm.
//!
//! An `Imports` table maps a wasm module name to a nullary factory; each
//! runtime instantiation draws a fresh `Import` which binds itself to the
//! store's capability surface (state view, runtime config, cancellation).

pub mod program;
pub mod state;
pub mod testing;

use crate::error::RuntimeError;
use crate::runtime::StoreData;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use wasmtime::{Caller, Extern, Linker};

/// A named host-capability module.
pub trait Import: Send + Sync {
    /// The wasm module name the capability is linked under.
    fn module(&self) -> &'static str;

    /// Define the module's functions on the linker.
    fn register(&self, linker: &mut Linker<StoreData>) -> Result<(), RuntimeError>;
}

type ImportFactory = Arc<dyn Fn() -> Box<dyn Import> + Send + Sync>;

/// Registry of import factories consulted at instantiation.
/// Registration replaces on duplicate module names. Handles are cheap
/// clones sharing one table, so child runtimes re-resolve the same
/// capability set.
#[derive(Clone, Default)]
pub struct ImportRegistry {
    factories: Arc<RwLock<BTreeMap<String, ImportFactory>>>,
}

impl ImportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for the given module name, replacing any existing
    /// registration.
    pub fn register<F>(&self, module: &str, factory: F)
    where
        F: Fn() -> Box<dyn Import> + Send + Sync + 'static,
    {
        if self
            .factories
            .write()
            .insert(module.to_string(), Arc::new(factory))
            .is_some()
        {
            tracing::debug!(module, "import registration replaced");
        }
    }

    /// Whether a module name is registered.
    pub fn contains(&self, module: &str) -> bool {
        self.factories.read().contains_key(module)
    }

    /// Build each registered import and define it on the linker.
    pub(crate) fn register_into(&self, linker: &mut Linker<StoreData>) -> Result<(), RuntimeError> {
        for factory in self.factories.read().values() {
            factory().register(linker)?;
        }
        Ok(())
    }
}

/// The built-in capability set: `state` and `program`.
pub fn default_imports() -> ImportRegistry {
    let registry = ImportRegistry::new();
    registry.register(state::MODULE, || Box::new(state::StateImport));
    registry.register(program::MODULE, || Box::new(program::ProgramImport));
    registry
}

/// The guest's exported linear memory, looked up from inside a host call.
fn guest_memory(caller: &mut Caller<'_, StoreData>) -> anyhow::Result<wasmtime::Memory> {
    match caller.get_export("memory") {
        Some(Extern::Memory(memory)) => Ok(memory),
        _ => anyhow::bail!("guest does not export memory"),
    }
}

/// Bounds-checked copy out of guest memory.
fn read_guest_bytes(
    caller: &mut Caller<'_, StoreData>,
    ptr: i64,
    len: i64,
) -> anyhow::Result<Vec<u8>> {
    let memory = guest_memory(caller)?;
    let offset = u64::try_from(ptr).map_err(|_| anyhow::anyhow!("negative guest pointer {ptr}"))?;
    let length = u64::try_from(len).map_err(|_| anyhow::anyhow!("negative guest length {len}"))?;

    let data = memory.data(&*caller);
    let end = offset
        .checked_add(length)
        .filter(|end| *end <= data.len() as u64)
        .ok_or_else(|| {
            anyhow::anyhow!("out of bounds guest read: offset {offset}, length {length}")
        })?;
    Ok(data[offset as usize..end as usize].to_vec())
}

/// Allocate inside the guest via its `alloc` export and copy `bytes` in.
/// Returns the guest pointer.
fn alloc_guest_bytes(caller: &mut Caller<'_, StoreData>, bytes: &[u8]) -> anyhow::Result<i64> {
    let alloc = match caller.get_export("alloc") {
        Some(Extern::Func(func)) => func.typed::<i32, i32>(&*caller)?,
        _ => anyhow::bail!("guest does not export alloc"),
    };
    let length = i32::try_from(bytes.len())?;
    let ptr = alloc.call(&mut *caller, length)?;

    let memory = guest_memory(caller)?;
    let offset = u64::try_from(ptr).map_err(|_| anyhow::anyhow!("guest alloc returned {ptr}"))?;
    let data = memory.data_mut(&mut *caller);
    let end = offset
        .checked_add(bytes.len() as u64)
        .filter(|end| *end <= data.len() as u64)
        .ok_or_else(|| anyhow::anyhow!("guest alloc returned out of bounds pointer {offset}"))?;
    data[offset as usize..end as usize].copy_from_slice(bytes);
    Ok(offset as i64)
}

/// Abort the call when the driver has cancelled it; surfaces to the guest
/// as a trap.
fn check_cancelled(caller: &Caller<'_, StoreData>) -> anyhow::Result<()> {
    if caller.data().is_cancelled() {
        return Err(RuntimeError::Cancelled.into());
    }
    Ok(())
}

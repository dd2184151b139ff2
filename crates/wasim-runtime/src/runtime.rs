use crate::config::{CompileStrategy, RuntimeConfig, StoreLimitsSpec};
use crate::error::RuntimeError;
use crate::imports::{testing::TestingImport, Import, ImportRegistry};
use crate::memory::MemoryView;
use crate::meter::Meter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wasim_state::StateView;
use wasmtime::{
    Engine, Instance, Linker, Module, Store, StoreLimits, StoreLimitsBuilder, TypedFunc, Val,
};

/// Custom section carrying the guest ABI version. Modules at version 2 or
/// later receive no implicit self-id parameter slot; absent or version 1
/// keeps the slot for backward compatibility.
const ABI_VERSION_SECTION: &str = "abi_version";

/// Data carried by every wasmtime store: the capability surface that host
/// imports dispatch against.
pub struct StoreData {
    state: StateView,
    registry: ImportRegistry,
    cfg: RuntimeConfig,
    cancelled: Arc<AtomicBool>,
    depth: usize,
    limits: StoreLimits,
}

impl StoreData {
    pub fn state(&self) -> &StateView {
        &self.state
    }

    pub fn registry(&self) -> &ImportRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.cfg
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub(crate) fn cancelled_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth
    }
}

/// Handle for aborting a call from outside the guest. Imports check the
/// flag between host operations and trap the guest when it is set.
#[derive(Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

struct Initialized {
    store: Store<StoreData>,
    instance: Instance,
    memory: Option<wasmtime::Memory>,
    alloc: Option<TypedFunc<i32, i32>>,
    emits_self_id: bool,
}

/// A metered, sandboxed execution environment for one program call.
///
/// Owns an engine, a store, a compiled module and an instance. `stop`
/// releases them and is idempotent; `Drop` stops, so every exit path
/// (success, trap, panic in host code) releases the store.
pub struct Runtime {
    engine: Engine,
    cfg: RuntimeConfig,
    limits: StoreLimitsSpec,
    state: StateView,
    registry: ImportRegistry,
    cancelled: Arc<AtomicBool>,
    depth: usize,
    inner: Option<Initialized>,
    stopped: bool,
}

impl Runtime {
    /// Create a runtime from a validated configuration, a state view and the
    /// import table. Configuration errors deferred by the builder surface
    /// here.
    pub fn new(
        cfg: RuntimeConfig,
        state: StateView,
        registry: ImportRegistry,
    ) -> Result<Self, RuntimeError> {
        Self::new_nested(cfg, state, registry, Arc::new(AtomicBool::new(false)), 0)
    }

    /// Create a child runtime for a program-to-program call. The child
    /// shares the parent's state view, import table and cancellation flag.
    pub(crate) fn new_nested(
        cfg: RuntimeConfig,
        state: StateView,
        registry: ImportRegistry,
        cancelled: Arc<AtomicBool>,
        depth: usize,
    ) -> Result<Self, RuntimeError> {
        let built = cfg.build()?;
        if depth >= built.limits.max_instances {
            return Err(RuntimeError::CallDepthExceeded(depth));
        }
        let engine =
            Engine::new(&built.engine).map_err(|e| RuntimeError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            engine,
            cfg,
            limits: built.limits,
            state,
            registry,
            cancelled,
            depth,
            inner: None,
            stopped: false,
        })
    }

    /// Compile and instantiate the given module bytes.
    ///
    /// Resolves the module's declared imports against the registry, applies
    /// the fixed store limits, seeds the fuel budget and captures the
    /// exported `memory` and `alloc`. A module whose declared minimum memory
    /// exceeds the memory limit fails here without instantiating.
    pub fn initialize(&mut self, bytes: &[u8]) -> Result<(), RuntimeError> {
        if self.stopped {
            return Err(RuntimeError::Stopped);
        }
        if self.inner.is_some() {
            return Err(RuntimeError::AlreadyInitialized);
        }

        let module = match self.cfg.compile_strategy() {
            CompileStrategy::CompileOnLoad => Module::new(&self.engine, bytes),
            CompileStrategy::Precompile => self
                .engine
                .precompile_module(bytes)
                .and_then(|artifact| unsafe { Module::deserialize(&self.engine, &artifact) }),
        }
        .map_err(|e| RuntimeError::Compile(e.to_string()))?;

        let mut linker: Linker<StoreData> = Linker::new(&self.engine);
        self.registry.register_into(&mut linker)?;
        if self.cfg.testing_only_mode() {
            TestingImport.register(&mut linker)?;
        }

        // every declared import must resolve against the merged table
        for import in module.imports() {
            let known = self.registry.contains(import.module())
                || (self.cfg.testing_only_mode() && import.module() == TestingImport.module());
            if !known {
                return Err(RuntimeError::MissingImport {
                    module: import.module().to_string(),
                    name: import.name().to_string(),
                });
            }
        }

        let limits = StoreLimitsBuilder::new()
            .memory_size(self.limits.max_memory as usize)
            .table_elements(self.limits.max_table_elements)
            .tables(self.limits.max_tables)
            .instances(self.limits.max_instances)
            .memories(self.limits.max_memories)
            .build();

        let mut store = Store::new(
            &self.engine,
            StoreData {
                state: self.state.clone(),
                registry: self.registry.clone(),
                cfg: self.cfg.clone(),
                cancelled: self.cancelled.clone(),
                depth: self.depth,
                limits,
            },
        );
        store.limiter(|data| &mut data.limits);
        store.set_fuel(self.limits.meter_max_units)?;

        let instance = linker.instantiate(&mut store, &module).map_err(|e| {
            match e.downcast_ref::<wasmtime::Trap>() {
                Some(code) => RuntimeError::Trap { code: *code },
                // store-limit denials (e.g. declared memory beyond the
                // limit) surface their message through the error chain
                None => RuntimeError::Instantiate(format!("{:#}", e)),
            }
        })?;

        let memory = instance.get_memory(&mut store, "memory");
        let alloc = instance
            .get_typed_func::<i32, i32>(&mut store, "alloc")
            .ok();
        let emits_self_id = read_abi_version(bytes).map_or(true, |version| version < 2);

        self.inner = Some(Initialized {
            store,
            instance,
            memory,
            alloc,
            emits_self_id,
        });

        tracing::debug!(
            fuel = self.limits.meter_max_units,
            depth = self.depth,
            "runtime initialized"
        );
        Ok(())
    }

    /// Invoke an exported function. `u64` arguments are coerced to `i64`
    /// wire values in order; results decode back to `u64`s (zero results
    /// become an empty vector). Guest traps are preserved with their code.
    pub fn call(&mut self, function: &str, args: &[u64]) -> Result<Vec<u64>, RuntimeError> {
        if self.stopped {
            return Err(RuntimeError::Stopped);
        }
        let inner = self.inner.as_mut().ok_or(RuntimeError::NotInitialized)?;

        let func = inner
            .instance
            .get_func(&mut inner.store, function)
            .ok_or_else(|| RuntimeError::ExportNotFound(function.to_string()))?;

        let params: Vec<Val> = args.iter().map(|a| Val::I64(*a as i64)).collect();
        let mut results = vec![Val::I64(0); func.ty(&inner.store).results().len()];

        func.call(&mut inner.store, &params, &mut results)
            .map_err(RuntimeError::from)?;

        results
            .iter()
            .map(|val| match val {
                Val::I64(v) => Ok(*v as u64),
                Val::I32(v) => Ok(*v as u32 as u64),
                _ => Err(RuntimeError::UnexpectedResultType(function.to_string())),
            })
            .collect()
    }

    /// Accessor over the instance's exported linear memory.
    pub fn memory(&mut self) -> Result<MemoryView<'_>, RuntimeError> {
        if self.stopped {
            return Err(RuntimeError::Stopped);
        }
        let max_memory = self.limits.max_memory;
        let inner = self.inner.as_mut().ok_or(RuntimeError::NotInitialized)?;
        let memory = inner
            .memory
            .ok_or_else(|| RuntimeError::ExportNotFound("memory".to_string()))?;
        Ok(MemoryView::new(
            &mut inner.store,
            memory,
            inner.alloc,
            max_memory,
        ))
    }

    /// Accessor over the store's fuel meter.
    pub fn meter(&mut self) -> Result<Meter<'_>, RuntimeError> {
        if self.stopped {
            return Err(RuntimeError::Stopped);
        }
        let inner = self.inner.as_mut().ok_or(RuntimeError::NotInitialized)?;
        Ok(Meter::new(&mut inner.store))
    }

    /// Whether the program's own id is emitted as the first parameter slot.
    /// Decided by the module's `abi_version` custom section; defaults to
    /// true when the section is absent.
    pub fn emits_self_id(&self) -> bool {
        self.inner.as_ref().map_or(true, |inner| inner.emits_self_id)
    }

    /// Handle for aborting the call from outside the guest.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.cancelled.clone())
    }

    /// Release the store and instance. Idempotent; safe after a failed
    /// `initialize`. Any later call to another runtime method fails with
    /// `Stopped`.
    pub fn stop(&mut self) {
        if self.inner.take().is_some() {
            tracing::debug!(depth = self.depth, "runtime stopped");
        }
        self.stopped = true;
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Scan the raw module for the ABI-version custom section. The first byte
/// of the section payload is the version. Malformed modules simply report
/// no version; real validation happens at compile time.
fn read_abi_version(bytes: &[u8]) -> Option<u8> {
    for payload in wasmparser::Parser::new(0).parse_all(bytes) {
        match payload {
            Ok(wasmparser::Payload::CustomSection(reader))
                if reader.name() == ABI_VERSION_SECTION =>
            {
                return reader.data().first().copied();
            }
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    None
}

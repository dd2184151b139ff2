use crate::error::RuntimeError;
use wasmtime::{OptLevel, Strategy};

/// Size of a wasm linear-memory page: 64 KiB.
pub const MEMORY_PAGE_SIZE: u64 = 64 * 1024;

const DEFAULT_MAX_WASM_STACK: usize = 256 * 1024 * 1024; // 256 MiB
const DEFAULT_LIMIT_MAX_MEMORY: u64 = 18 * MEMORY_PAGE_SIZE; // 18 pages

const DEFAULT_LIMIT_MAX_TABLE_ELEMENTS: usize = 4096;
const DEFAULT_LIMIT_MAX_TABLES: usize = 1;
const DEFAULT_LIMIT_MAX_INSTANCES: usize = 32;
const DEFAULT_LIMIT_MAX_MEMORIES: usize = 1;

/// How modules are turned into executable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompileStrategy {
    /// JIT-compile the module when it is loaded.
    #[default]
    CompileOnLoad,
    /// Pre-compile to a serialized artifact, then load the artifact.
    Precompile,
}

/// Runtime configuration builder.
///
/// `meter_max_units` is the fuel budget for the entire call and is required
/// up front; everything else is optional. Validation errors are deferred and
/// surfaced by `build`, so setters stay chainable.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    meter_max_units: u64,
    limit_max_memory: u64,
    max_wasm_stack: usize,
    enable_bulk_memory: bool,
    enable_multi_value: bool,
    enable_reference_types: bool,
    enable_simd: bool,
    enable_default_cache: bool,
    enable_testing_only_mode: bool,
    compile_strategy: CompileStrategy,
    errs: Vec<String>,
}

impl RuntimeConfig {
    /// Returns a new runtime configuration with the given fuel budget.
    pub fn new(meter_max_units: u64) -> Self {
        Self {
            meter_max_units,
            limit_max_memory: DEFAULT_LIMIT_MAX_MEMORY,
            max_wasm_stack: DEFAULT_MAX_WASM_STACK,
            enable_bulk_memory: false,
            enable_multi_value: false,
            enable_reference_types: false,
            enable_simd: false,
            enable_default_cache: false,
            enable_testing_only_mode: false,
            compile_strategy: CompileStrategy::default(),
            errs: Vec::new(),
        }
    }

    /// Rebind the fuel budget. Used when deriving a child configuration for
    /// a program-to-program call.
    pub fn with_meter_max_units(mut self, units: u64) -> Self {
        self.meter_max_units = units;
        self
    }

    /// Maximum linear-memory size in bytes. Must be a multiple of the
    /// 64 KiB page size and at most `i64::MAX`.
    ///
    /// Default is 18 pages.
    pub fn with_limit_max_memory(mut self, max: u64) -> Self {
        if max > i64::MAX as u64 {
            self.errs
                .push(format!("max memory {} is greater than max int64", max));
        } else if max % MEMORY_PAGE_SIZE != 0 {
            self.errs.push(format!(
                "max memory {} is not a multiple of the 64 KiB page size",
                max
            ));
        } else {
            self.limit_max_memory = max;
        }
        self
    }

    /// Maximum amount of stack space available for executing wasm code.
    ///
    /// Default is 256 MiB.
    pub fn with_max_wasm_stack(mut self, max: usize) -> Self {
        self.max_wasm_stack = max;
        self
    }

    /// Enables `memory.copy`, tables and passive data.
    ///
    /// Default is false.
    pub fn with_bulk_memory(mut self, enable: bool) -> Self {
        self.enable_bulk_memory = enable;
        self
    }

    /// Enables modules that can return multiple values.
    ///
    /// Default is false.
    pub fn with_multi_value(mut self, enable: bool) -> Self {
        self.enable_multi_value = enable;
        self
    }

    /// Enables the `externref` and `funcref` types.
    ///
    /// Note: depends on bulk memory being enabled.
    /// Default is false.
    pub fn with_reference_types(mut self, enable: bool) -> Self {
        self.enable_reference_types = enable;
        self
    }

    /// Enables SIMD instructions including v128.
    ///
    /// Default is false.
    pub fn with_simd(mut self, enable: bool) -> Self {
        self.enable_simd = enable;
        self
    }

    /// Enables wasmtime's default compiled-code caching strategy.
    ///
    /// Default is false.
    pub fn with_default_cache(mut self, enable: bool) -> Self {
        self.enable_default_cache = enable;
        self
    }

    /// Enables testing-only mode, which registers extra debug imports.
    /// Not for live systems.
    ///
    /// Default is false.
    pub fn with_testing_only_mode(mut self, enable: bool) -> Self {
        self.enable_testing_only_mode = enable;
        self
    }

    /// Defines how modules are compiled.
    pub fn with_compile_strategy(mut self, strategy: CompileStrategy) -> Self {
        self.compile_strategy = strategy;
        self
    }

    pub fn meter_max_units(&self) -> u64 {
        self.meter_max_units
    }

    pub fn limit_max_memory(&self) -> u64 {
        self.limit_max_memory
    }

    pub fn compile_strategy(&self) -> CompileStrategy {
        self.compile_strategy
    }

    pub fn testing_only_mode(&self) -> bool {
        self.enable_testing_only_mode
    }

    /// Validate the builder and produce the engine configuration plus the
    /// fixed store limits.
    pub(crate) fn build(&self) -> Result<BuiltConfig, RuntimeError> {
        if !self.errs.is_empty() {
            return Err(RuntimeError::InvalidConfig(self.errs.join("; ")));
        }

        let mut engine = default_engine_config();

        if self.enable_default_cache {
            engine
                .cache_config_load_default()
                .map_err(|e| RuntimeError::InvalidConfig(e.to_string()))?;
        }

        engine.wasm_bulk_memory(self.enable_bulk_memory);
        engine.wasm_multi_value(self.enable_multi_value);
        engine.wasm_reference_types(self.enable_reference_types);
        engine.wasm_simd(self.enable_simd);
        engine.max_wasm_stack(self.max_wasm_stack);

        Ok(BuiltConfig {
            engine,
            limits: StoreLimitsSpec {
                max_memory: self.limit_max_memory,
                max_table_elements: DEFAULT_LIMIT_MAX_TABLE_ELEMENTS,
                max_tables: DEFAULT_LIMIT_MAX_TABLES,
                max_instances: DEFAULT_LIMIT_MAX_INSTANCES,
                max_memories: DEFAULT_LIMIT_MAX_MEMORIES,
                meter_max_units: self.meter_max_units,
            },
        })
    }
}

/// A validated configuration: the wasmtime engine config plus the store
/// limits applied to every instantiation.
pub(crate) struct BuiltConfig {
    pub engine: wasmtime::Config,
    pub limits: StoreLimitsSpec,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct StoreLimitsSpec {
    pub max_memory: u64,
    pub max_table_elements: usize,
    pub max_tables: usize,
    pub max_instances: usize,
    pub max_memories: usize,
    pub meter_max_units: u64,
}

/// Non-configurable engine defaults: fuel metering on, optimizer at speed,
/// NaN canonicalization on, threads/multi-memory/memory64 off, epoch
/// interruption on (a hook for external control; the simulator never
/// advances the epoch).
fn default_engine_config() -> wasmtime::Config {
    let mut cfg = wasmtime::Config::new();
    cfg.cranelift_opt_level(OptLevel::Speed);
    cfg.consume_fuel(true);
    cfg.wasm_threads(false);
    cfg.wasm_multi_memory(false);
    cfg.wasm_memory64(false);
    cfg.strategy(Strategy::Cranelift);
    cfg.epoch_interruption(true);
    cfg.cranelift_nan_canonicalization(true);
    cfg.debug_info(false);
    cfg
}

//! Built-in host import behavior: state access and testing-only mode.

use std::sync::Arc;
use tempfile::TempDir;
use wasim_runtime::{default_imports, ImportRegistry, Runtime, RuntimeConfig, RuntimeError};
use wasim_state::{Database, DatabaseConfig, StateRead, StateView};

fn test_state() -> (StateView, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path(), &DatabaseConfig::default()).unwrap();
    (StateView::new(Arc::new(db)), temp_dir)
}

/// Writes "hi" under key "greeting", then reads it back. `roundtrip`
/// returns the first payload byte, or the get sentinel when absent.
const STATE_USER: &str = r#"
(module
  (import "state" "put" (func $put (param i64 i64 i64 i64) (result i32)))
  (import "state" "get" (func $get (param i64 i64) (result i64)))
  (import "state" "delete" (func $delete (param i64 i64) (result i32)))
  (memory (export "memory") 1)
  (global $heap (mut i32) (i32.const 1024))
  (data (i32.const 0) "greeting")
  (data (i32.const 16) "hi")
  (func (export "alloc") (param i32) (result i32)
    (local $ptr i32)
    global.get $heap
    local.set $ptr
    global.get $heap
    local.get 0
    i32.add
    global.set $heap
    local.get $ptr)
  (func (export "roundtrip") (param i64) (result i64)
    (local $ptr i64)
    i64.const 0
    i64.const 8
    i64.const 16
    i64.const 2
    call $put
    drop
    i64.const 0
    i64.const 8
    call $get
    local.tee $ptr
    i64.const -1
    i64.eq
    if (result i64)
      i64.const -1
    else
      local.get $ptr
      i32.wrap_i64
      i32.const 4
      i32.add
      i64.load8_u
    end)
  (func (export "read_missing") (param i64) (result i64)
    i64.const 16
    i64.const 2
    call $get)
  (func (export "remove") (param i64) (result i64)
    i64.const 0
    i64.const 8
    call $delete
    i64.extend_i32_s)
)
"#;

#[test]
fn state_put_then_get_in_one_call() {
    let (state, _temp) = test_state();
    let wasm = wat::parse_str(STATE_USER).unwrap();

    let mut runtime =
        Runtime::new(RuntimeConfig::new(1_000_000), state.clone(), default_imports()).unwrap();
    runtime.initialize(&wasm).unwrap();

    // 'h' == 104: the write is observed by the read in issue order
    assert_eq!(runtime.call("roundtrip", &[0]).unwrap(), vec![104]);

    // the write landed in the pending buffer, visible to the host view
    assert_eq!(
        state.get_value(b"greeting").unwrap(),
        Some(b"hi".to_vec())
    );
    assert!(state.has_pending());
}

#[test]
fn state_get_absent_returns_sentinel() {
    let (state, _temp) = test_state();
    let wasm = wat::parse_str(STATE_USER).unwrap();

    let mut runtime = Runtime::new(RuntimeConfig::new(1_000_000), state, default_imports()).unwrap();
    runtime.initialize(&wasm).unwrap();

    let result = runtime.call("read_missing", &[0]).unwrap();
    assert_eq!(result[0] as i64, -1);
}

#[test]
fn state_delete_buffers_tombstone() {
    let (state, _temp) = test_state();
    let wasm = wat::parse_str(STATE_USER).unwrap();

    state.insert(b"greeting".to_vec(), b"stored".to_vec());
    state.commit().unwrap();

    let mut runtime =
        Runtime::new(RuntimeConfig::new(1_000_000), state.clone(), default_imports()).unwrap();
    runtime.initialize(&wasm).unwrap();
    assert_eq!(runtime.call("remove", &[0]).unwrap(), vec![0]);

    assert_eq!(state.get_value(b"greeting").unwrap(), None);
    state.discard();
    assert_eq!(state.get_value(b"greeting").unwrap(), Some(b"stored".to_vec()));
}

#[test]
fn testing_import_gated_on_mode() {
    let (state, _temp) = test_state();
    let wasm = wat::parse_str(
        r#"
        (module
          (import "testing" "log_i64" (func $log (param i64)))
          (func (export "noisy") (result i64)
            i64.const 9
            call $log
            i64.const 9)
        )
        "#,
    )
    .unwrap();

    let mut runtime = Runtime::new(
        RuntimeConfig::new(1_000_000),
        state.clone(),
        ImportRegistry::new(),
    )
    .unwrap();
    assert!(matches!(
        runtime.initialize(&wasm),
        Err(RuntimeError::MissingImport { .. })
    ));

    let cfg = RuntimeConfig::new(1_000_000).with_testing_only_mode(true);
    let mut runtime = Runtime::new(cfg, state, ImportRegistry::new()).unwrap();
    runtime.initialize(&wasm).unwrap();
    assert_eq!(runtime.call("noisy", &[]).unwrap(), vec![9]);
}

#[test]
fn cancellation_traps_guest_at_next_host_call() {
    let (state, _temp) = test_state();
    let wasm = wat::parse_str(STATE_USER).unwrap();

    let mut runtime = Runtime::new(RuntimeConfig::new(1_000_000), state, default_imports()).unwrap();
    runtime.initialize(&wasm).unwrap();

    runtime.cancel_handle().cancel();
    assert!(runtime.call("roundtrip", &[0]).is_err());
}

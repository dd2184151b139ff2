//! Program-to-program re-entry: budget transfer, shared state context,
//! and the failure sentinel.

use std::sync::Arc;
use tempfile::TempDir;
use wasim_runtime::{default_imports, Runtime, RuntimeConfig};
use wasim_state::{set_program, Database, DatabaseConfig, StateView};
use wasim_types::ProgramId;

fn test_state() -> (StateView, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path(), &DatabaseConfig::default()).unwrap();
    (StateView::new(Arc::new(db)), temp_dir)
}

/// A counter keyed under "counter": `inc(self, delta)` adds and returns the
/// new value, `value(self)` reads it.
const COUNTER: &str = r#"
(module
  (import "state" "put" (func $put (param i64 i64 i64 i64) (result i32)))
  (import "state" "get" (func $get (param i64 i64) (result i64)))
  (memory (export "memory") 2)
  (global $heap (mut i32) (i32.const 1024))
  (data (i32.const 32) "counter")
  (func (export "alloc") (param i32) (result i32)
    (local $ptr i32)
    global.get $heap
    local.set $ptr
    global.get $heap
    local.get 0
    i32.add
    global.set $heap
    local.get $ptr)
  (func $read (result i64)
    (local $ptr i64)
    i64.const 32
    i64.const 7
    call $get
    local.tee $ptr
    i64.const -1
    i64.eq
    if (result i64)
      i64.const 0
    else
      local.get $ptr
      i32.wrap_i64
      i32.const 4
      i32.add
      i64.load
    end)
  (func (export "inc") (param i64 i64) (result i64)
    (local $new i64)
    call $read
    local.get 1
    i64.add
    local.set $new
    i32.const 64
    local.get $new
    i64.store
    i64.const 32
    i64.const 7
    i64.const 64
    i64.const 8
    call $put
    drop
    local.get $new)
  (func (export "value") (param i64) (result i64)
    call $read)
)
"#;

/// Forwards an increment to another counter program:
/// `inc_external(self, target, max_units, delta)`. The host returns a
/// pointer to the encoded results; the first one is loaded back out, and
/// the failure sentinel passes through untouched.
const CALLER: &str = r#"
(module
  (import "program" "call_program"
    (func $call_program (param i64 i64 i64 i64 i64 i64) (result i64)))
  (memory (export "memory") 2)
  (global $heap (mut i32) (i32.const 1024))
  (data (i32.const 0) "inc")
  (func (export "alloc") (param i32) (result i32)
    (local $ptr i32)
    global.get $heap
    local.set $ptr
    global.get $heap
    local.get 0
    i32.add
    global.set $heap
    local.get $ptr)
  (func (export "inc_external") (param i64 i64 i64 i64) (result i64)
    (local $ptr i64)
    i32.const 16
    local.get 3
    i64.store
    local.get 1   ;; program_id_ptr
    i64.const 0   ;; function_ptr ("inc")
    i64.const 3   ;; function_len
    i64.const 16  ;; args_ptr
    i64.const 8   ;; args_len
    local.get 2   ;; max_units
    call $call_program
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
      i64.load
    end)
  (func (export "inc_external_raw") (param i64 i64 i64 i64) (result i64)
    i32.const 16
    local.get 3
    i64.store
    local.get 1
    i64.const 0
    i64.const 3
    i64.const 16
    i64.const 8
    local.get 2
    call $call_program)
)
"#;

fn deploy(state: &StateView, wat: &str) -> ProgramId {
    let id = ProgramId::random();
    set_program(state, &id, &wat::parse_str(wat).unwrap());
    state.commit().unwrap();
    id
}

fn self_ptr(runtime: &mut Runtime, id: &ProgramId) -> u64 {
    runtime.memory().unwrap().write_bytes(id.as_bytes()).unwrap()
}

#[test]
fn nested_call_shares_state_and_inherits_budget() {
    let (state, _temp) = test_state();
    let counter_id = deploy(&state, COUNTER);
    let caller_id = deploy(&state, CALLER);

    // seed the counter to 100 with a direct call
    let mut counter = Runtime::new(
        RuntimeConfig::new(1_000_000),
        state.clone(),
        default_imports(),
    )
    .unwrap();
    counter
        .initialize(&wat::parse_str(COUNTER).unwrap())
        .unwrap();
    let ptr = self_ptr(&mut counter, &counter_id);
    assert_eq!(counter.call("inc", &[ptr, 100]).unwrap(), vec![100]);
    counter.stop();

    // re-enter through the caller program with a 100_000-unit sub-budget
    let mut caller = Runtime::new(
        RuntimeConfig::new(1_000_000),
        state.clone(),
        default_imports(),
    )
    .unwrap();
    caller.initialize(&wat::parse_str(CALLER).unwrap()).unwrap();

    let self_arg = self_ptr(&mut caller, &caller_id);
    let target_arg = caller
        .memory()
        .unwrap()
        .write_bytes(counter_id.as_bytes())
        .unwrap();

    let result = caller
        .call("inc_external", &[self_arg, target_arg, 100_000, 10])
        .unwrap();
    assert_eq!(result, vec![110]);

    // the sub-budget was deducted up front and the child's leftover is
    // forfeited, so well over the child's actual spend is gone
    let balance = caller.meter().unwrap().get_balance().unwrap();
    assert!(balance < 1_000_000 - 100_000, "balance: {balance}");
    caller.stop();

    // the nested write accumulated in the same pending buffer
    assert!(state.has_pending());

    // a following reader sees the nested increment
    let mut reader = Runtime::new(RuntimeConfig::new(1_000_000), state, default_imports()).unwrap();
    reader
        .initialize(&wat::parse_str(COUNTER).unwrap())
        .unwrap();
    let ptr = self_ptr(&mut reader, &counter_id);
    assert_eq!(reader.call("value", &[ptr]).unwrap(), vec![110]);
}

#[test]
fn sub_budget_bounded_by_caller_balance() {
    let (state, _temp) = test_state();
    let counter_id = deploy(&state, COUNTER);

    let mut caller = Runtime::new(RuntimeConfig::new(50_000), state, default_imports()).unwrap();
    caller.initialize(&wat::parse_str(CALLER).unwrap()).unwrap();

    let self_arg = caller.memory().unwrap().write_bytes(&[0u8; 32]).unwrap();
    let target_arg = caller
        .memory()
        .unwrap()
        .write_bytes(counter_id.as_bytes())
        .unwrap();

    // asks for more than the caller holds; the child still runs under the
    // clamped budget
    let result = caller
        .call("inc_external", &[self_arg, target_arg, 10_000_000, 5])
        .unwrap();
    assert_eq!(result, vec![5]);
}

#[test]
fn max_value_result_distinct_from_sentinel() {
    let (state, _temp) = test_state();
    let counter_id = deploy(&state, COUNTER);

    let mut caller = Runtime::new(RuntimeConfig::new(1_000_000), state, default_imports()).unwrap();
    caller.initialize(&wat::parse_str(CALLER).unwrap()).unwrap();

    let self_arg = caller.memory().unwrap().write_bytes(&[0u8; 32]).unwrap();
    let target_arg = caller
        .memory()
        .unwrap()
        .write_bytes(counter_id.as_bytes())
        .unwrap();

    // increment by u64::MAX so the callee legitimately returns the
    // sentinel's bit pattern; the raw host return is still a pointer
    let raw = caller
        .call("inc_external_raw", &[self_arg, target_arg, 200_000, u64::MAX])
        .unwrap()[0];
    assert_ne!(raw as i64, -1);

    // the encoded payload carries the full result
    let memory = caller.memory().unwrap();
    let header: [u8; 4] = memory.read(raw, 4).unwrap().try_into().unwrap();
    assert_eq!(u32::from_le_bytes(header), 8);
    let slot: [u8; 8] = memory.read(raw + 4, 8).unwrap().try_into().unwrap();
    assert_eq!(u64::from_le_bytes(slot), u64::MAX);
}

#[test]
fn missing_callee_returns_sentinel_to_guest() {
    let (state, _temp) = test_state();

    let mut caller = Runtime::new(RuntimeConfig::new(1_000_000), state, default_imports()).unwrap();
    caller.initialize(&wat::parse_str(CALLER).unwrap()).unwrap();

    let self_arg = caller.memory().unwrap().write_bytes(&[0u8; 32]).unwrap();
    let missing = ProgramId::random();
    let target_arg = caller
        .memory()
        .unwrap()
        .write_bytes(missing.as_bytes())
        .unwrap();

    // the parent call itself succeeds; the guest observes the sentinel
    let result = caller
        .call("inc_external", &[self_arg, target_arg, 10_000, 1])
        .unwrap();
    assert_eq!(result[0] as i64, -1);
}

#[test]
fn trapping_child_surfaces_as_sentinel_not_parent_trap() {
    let (state, _temp) = test_state();
    let counter_id = deploy(&state, COUNTER);

    let mut caller = Runtime::new(RuntimeConfig::new(1_000_000), state, default_imports()).unwrap();
    caller.initialize(&wat::parse_str(CALLER).unwrap()).unwrap();

    let self_arg = caller.memory().unwrap().write_bytes(&[0u8; 32]).unwrap();
    let target_arg = caller
        .memory()
        .unwrap()
        .write_bytes(counter_id.as_bytes())
        .unwrap();

    // a 1-unit sub-budget exhausts inside the child; the parent continues
    // and sees the sentinel
    let result = caller
        .call("inc_external", &[self_arg, target_arg, 1, 1])
        .unwrap();
    assert_eq!(result[0] as i64, -1);
}

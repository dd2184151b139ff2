//! The `program` import: the program-to-program re-entry primitive.
//!
//! The guest passes a callee id, a function name, a packed argument list
//! and a sub-budget. The import builds a child runtime whose configuration
//! matches the parent's except for the fuel budget, runs the callee in the
//! same state context, and encodes the callee's results back into the
//! caller's memory. A failing child surfaces as the -1 sentinel so guest
//! code can observe inter-program failure and decide whether to continue
//! or trap itself.
//!
//! Guest ABI:
//! - `call_program(program_id_ptr, function_ptr, function_len, args_ptr,
//!   args_len, max_units) -> i64`: pointer to `len:u32 LE || packed
//!   little-endian u64 results` allocated via the caller's `alloc` export
//!   (the same shape `state::get` hands back), or -1 when the call fails.
//!   Pointers are never negative, so the sentinel cannot collide with a
//!   real result, and every result the callee returns is preserved.
//!
//! The packed argument list is consecutive little-endian u64 slots; values
//! pass through to the callee by value. The sub-budget is bounded above by
//! the caller's remaining balance, deducted up front, and never refunded:
//! whatever the child leaves unspent is forfeited.

use super::{alloc_guest_bytes, check_cancelled, read_guest_bytes, Import};
use crate::error::RuntimeError;
use crate::runtime::{Runtime, StoreData};
use wasim_state::get_program;
use wasim_types::ProgramId;
use wasmtime::{Caller, Linker};

pub const MODULE: &str = "program";

/// Failure sentinel returned to the calling guest.
const CALL_FAILED: i64 = -1;

pub struct ProgramImport;

impl Import for ProgramImport {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn register(&self, linker: &mut Linker<StoreData>) -> Result<(), RuntimeError> {
        linker
            .func_wrap(
                MODULE,
                "call_program",
                |mut caller: Caller<'_, StoreData>,
                 program_id_ptr: i64,
                 function_ptr: i64,
                 function_len: i64,
                 args_ptr: i64,
                 args_len: i64,
                 max_units: i64|
                 -> anyhow::Result<i64> {
                    check_cancelled(&caller)?;
                    match call_program(
                        &mut caller,
                        program_id_ptr,
                        function_ptr,
                        function_len,
                        args_ptr,
                        args_len,
                        max_units,
                    ) {
                        Ok(ptr) => Ok(ptr),
                        Err(e) => {
                            tracing::debug!(error = %e, "program-to-program call failed");
                            Ok(CALL_FAILED)
                        }
                    }
                },
            )
            .map_err(|e| RuntimeError::Wasm(e.to_string()))?;

        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
fn call_program(
    caller: &mut Caller<'_, StoreData>,
    program_id_ptr: i64,
    function_ptr: i64,
    function_len: i64,
    args_ptr: i64,
    args_len: i64,
    max_units: i64,
) -> Result<i64, RuntimeError> {
    let id_bytes = read_guest_bytes(caller, program_id_ptr, ProgramId::LEN as i64)
        .map_err(|e| RuntimeError::Wasm(e.to_string()))?;
    let program_id = ProgramId::from_slice(&id_bytes)?;

    let function_bytes = read_guest_bytes(caller, function_ptr, function_len)
        .map_err(|e| RuntimeError::Wasm(e.to_string()))?;
    let function = String::from_utf8(function_bytes)
        .map_err(|_| RuntimeError::Wasm("function name is not utf-8".to_string()))?;

    let raw_args = read_guest_bytes(caller, args_ptr, args_len)
        .map_err(|e| RuntimeError::Wasm(e.to_string()))?;
    if raw_args.len() % 8 != 0 {
        return Err(RuntimeError::Wasm(
            "packed argument list must be a multiple of 8 bytes".to_string(),
        ));
    }
    let mut args = Vec::with_capacity(raw_args.len() / 8);
    for chunk in raw_args.chunks_exact(8) {
        let mut slot = [0u8; 8];
        slot.copy_from_slice(chunk);
        args.push(u64::from_le_bytes(slot));
    }

    // the callee must exist before any budget moves
    let program_bytes =
        get_program(caller.data().state(), &program_id)?.ok_or(RuntimeError::ProgramNotFound)?;

    // budget transfer: bounded by the caller's remaining balance, deducted
    // up front, never refunded
    let remaining = caller.get_fuel().map_err(RuntimeError::from)?;
    let budget = u64::try_from(max_units).unwrap_or(0).min(remaining);
    caller
        .set_fuel(remaining - budget)
        .map_err(RuntimeError::from)?;

    tracing::debug!(
        callee = %program_id,
        function = %function,
        budget,
        "program-to-program call"
    );

    let data = caller.data();
    let child_cfg = data.config().clone().with_meter_max_units(budget);
    let mut child = Runtime::new_nested(
        child_cfg,
        data.state().clone(),
        data.registry().clone(),
        data.cancelled_flag(),
        data.depth() + 1,
    )?;
    child.initialize(&program_bytes)?;

    let mut wire = Vec::with_capacity(args.len() + 1);
    if child.emits_self_id() {
        wire.push(child.memory()?.write_bytes(program_id.as_bytes())?);
    }
    wire.extend(args);

    let results = child.call(&function, &wire)?;
    // whatever fuel the child left unspent is forfeited
    child.stop();

    // encode the results into the caller's memory and hand back a pointer
    let mut payload = Vec::with_capacity(4 + results.len() * 8);
    payload.extend_from_slice(&((results.len() * 8) as u32).to_le_bytes());
    for result in &results {
        payload.extend_from_slice(&result.to_le_bytes());
    }
    alloc_guest_bytes(caller, &payload).map_err(|e| RuntimeError::Wasm(e.to_string()))
}

//! Parameter marshalling between plan values and guest linear memory.

use crate::error::SimulatorError;
use crate::plan::{ParamValue, Parameter};
use std::collections::HashMap;
use wasim_runtime::Runtime;
use wasim_state::{get_public_key, StateView};
use wasim_types::ProgramId;

/// Marshal typed parameters into wire arguments for a program call.
///
/// The first emitted slot is the invoked program's own 32-byte id, copied
/// into guest memory and passed as a pointer (unless the module's ABI
/// version opts out). Byte-shaped parameters travel through the guest's
/// `alloc` export; scalars pass by value. Declared parameter types are
/// checked here, when each value is decoded.
pub fn create_params(
    runtime: &mut Runtime,
    program_id: &ProgramId,
    state: &StateView,
    program_map: &HashMap<String, ProgramId>,
    params: &[Parameter],
) -> Result<Vec<u64>, SimulatorError> {
    let mut out = Vec::with_capacity(params.len() + 1);

    if runtime.emits_self_id() {
        let ptr = runtime.memory()?.write_bytes(program_id.as_bytes())?;
        out.push(ptr);
    }

    for param in params {
        match param.decode()? {
            ParamValue::String(value) => {
                let ptr = runtime.memory()?.write_bytes(value.as_bytes())?;
                out.push(ptr);
            }
            ParamValue::Bool(value) => {
                out.push(u64::from(value));
            }
            ParamValue::Id(text) => {
                let id = resolve_id(&text, program_map)?;
                let ptr = runtime.memory()?.write_bytes(id.as_bytes())?;
                out.push(ptr);
            }
            ParamValue::Key(name) => {
                let public_key = get_public_key(state, &name)?
                    .ok_or_else(|| SimulatorError::NamedKeyNotFound(name.clone()))?;
                let ptr = runtime.memory()?.write_bytes(&public_key)?;
                out.push(ptr);
            }
            ParamValue::U64(value) => {
                out.push(value);
            }
        }
    }

    Ok(out)
}

/// Resolve an id-typed value: a synthetic `step_N` token always resolves
/// through the program map first, falling back to the canonical hex form.
fn resolve_id(
    text: &str,
    program_map: &HashMap<String, ProgramId>,
) -> Result<ProgramId, SimulatorError> {
    if let Some(id) = program_map.get(text) {
        return Ok(*id);
    }
    text.parse()
        .map_err(|_| SimulatorError::FailedParamTypeCast(format!("id: {}", text)))
}

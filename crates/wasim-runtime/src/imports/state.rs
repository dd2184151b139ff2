//! The `state` import: host functions reading and writing the mutable
//! state view at program-scoped keys.
//!
//! Keys are opaque byte spans; how a program scopes them is its own
//! business. Writes land in the pending-writes buffer and commit with the
//! driver step. Storage failures propagate as traps.
//!
//! Guest ABI (pointers and lengths are `i64` byte offsets into the guest's
//! exported memory):
//! - `put(key_ptr, key_len, val_ptr, val_len) -> i32`: 0 on success.
//! - `get(key_ptr, key_len) -> i64`: pointer to `len:u32 LE || bytes`
//!   allocated via the guest's `alloc` export, or -1 when the key is
//!   absent.
//! - `delete(key_ptr, key_len) -> i32`: 0 on success.

use super::{alloc_guest_bytes, check_cancelled, read_guest_bytes, Import};
use crate::error::RuntimeError;
use crate::runtime::StoreData;
use wasim_state::StateRead;
use wasmtime::{Caller, Linker};

pub const MODULE: &str = "state";

/// Key absent sentinel returned by `get`.
const ABSENT: i64 = -1;

pub struct StateImport;

impl Import for StateImport {
    fn module(&self) -> &'static str {
        MODULE
    }

    fn register(&self, linker: &mut Linker<StoreData>) -> Result<(), RuntimeError> {
        linker
            .func_wrap(
                MODULE,
                "put",
                |mut caller: Caller<'_, StoreData>,
                 key_ptr: i64,
                 key_len: i64,
                 val_ptr: i64,
                 val_len: i64|
                 -> anyhow::Result<i32> {
                    check_cancelled(&caller)?;
                    let key = read_guest_bytes(&mut caller, key_ptr, key_len)?;
                    let value = read_guest_bytes(&mut caller, val_ptr, val_len)?;
                    tracing::trace!(key_len = key.len(), val_len = value.len(), "state put");
                    caller.data().state().insert(key, value);
                    Ok(0)
                },
            )
            .map_err(|e| RuntimeError::Wasm(e.to_string()))?;

        linker
            .func_wrap(
                MODULE,
                "get",
                |mut caller: Caller<'_, StoreData>,
                 key_ptr: i64,
                 key_len: i64|
                 -> anyhow::Result<i64> {
                    check_cancelled(&caller)?;
                    let key = read_guest_bytes(&mut caller, key_ptr, key_len)?;
                    let value = caller
                        .data()
                        .state()
                        .get_value(&key)
                        .map_err(RuntimeError::from)?;
                    match value {
                        None => Ok(ABSENT),
                        Some(value) => {
                            let mut payload = Vec::with_capacity(4 + value.len());
                            payload.extend_from_slice(&(value.len() as u32).to_le_bytes());
                            payload.extend_from_slice(&value);
                            alloc_guest_bytes(&mut caller, &payload)
                        }
                    }
                },
            )
            .map_err(|e| RuntimeError::Wasm(e.to_string()))?;

        linker
            .func_wrap(
                MODULE,
                "delete",
                |mut caller: Caller<'_, StoreData>,
                 key_ptr: i64,
                 key_len: i64|
                 -> anyhow::Result<i32> {
                    check_cancelled(&caller)?;
                    let key = read_guest_bytes(&mut caller, key_ptr, key_len)?;
                    caller.data().state().remove(key);
                    Ok(0)
                },
            )
            .map_err(|e| RuntimeError::Wasm(e.to_string()))?;

        Ok(())
    }
}

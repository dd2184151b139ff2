//! Storage schema for the simulator.
//!
//! The state column is a flat keyspace with a single-byte entity prefix:
//! `0x00 || program_id` → raw wasm bytes, `0x01 || name` → 64-byte keypair
//! encoding.

use crate::error::StorageError;
use crate::view::{StateRead, StateView};
use wasim_crypto::{public_key_from_keypair_bytes, Keypair, PUBLIC_KEY_LEN};
use wasim_types::ProgramId;

/// Prefix for program records.
pub const PROGRAM_PREFIX: u8 = 0x00;

/// Prefix for named key records.
pub const KEY_PREFIX: u8 = 0x01;

/// `0x00 || program_id`
pub fn program_key(id: &ProgramId) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + ProgramId::LEN);
    key.push(PROGRAM_PREFIX);
    key.extend_from_slice(id.as_bytes());
    key
}

/// `0x01 || name`
pub fn named_key_key(name: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + name.len());
    key.push(KEY_PREFIX);
    key.extend_from_slice(name.as_bytes());
    key
}

/// Store raw program bytes at the program's key.
pub fn set_program(state: &StateView, id: &ProgramId, bytes: &[u8]) {
    state.insert(program_key(id), bytes.to_vec());
}

/// Fetch raw program bytes. Absent programs are `Ok(None)`.
pub fn get_program<S: StateRead>(state: &S, id: &ProgramId) -> Result<Option<Vec<u8>>, StorageError> {
    state.get_value(&program_key(id))
}

/// Store the 64-byte keypair encoding under the given name.
pub fn set_named_key(state: &StateView, name: &str, keypair: &Keypair) {
    state.insert(named_key_key(name), keypair.to_keypair_bytes().to_vec());
}

/// Get the public key mapped to the given name. Only the public half is
/// exposed; callers never read the private material back.
pub fn get_public_key<S: StateRead>(
    state: &S,
    name: &str,
) -> Result<Option<[u8; PUBLIC_KEY_LEN]>, StorageError> {
    let Some(value) = state.get_value(&named_key_key(name))? else {
        return Ok(None);
    };
    let public = public_key_from_keypair_bytes(&value)
        .map_err(|e| StorageError::Corrupt(format!("named key {}: {}", name, e)))?;
    Ok(Some(public))
}

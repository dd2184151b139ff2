//! Wasim State - Persistent, Merkle-indexed key/value state for the WASIM
//! program simulator.
//!
//! This crate provides:
//! - A rocksdb-backed database with a Merkle root over the state column
//! - A transactional view with a pending-writes buffer (`StateView`)
//! - The storage schema for programs and named keys

pub mod db;
pub mod error;
pub mod storage;
pub mod view;

pub use db::{ColumnFamily, Database, DatabaseConfig};
pub use error::StorageError;
pub use storage::{
    get_program, get_public_key, named_key_key, program_key, set_named_key, set_program,
    KEY_PREFIX, PROGRAM_PREFIX,
};
pub use view::{StateRead, StateView};

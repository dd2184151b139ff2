//! Wasim Crypto - Cryptographic primitives for the WASIM program simulator.
//!
//! This crate provides:
//! - Ed25519 keypairs for named simulation keys
//! - Blake3 hashing helpers
//! - Merkle trees for the state root index

pub mod ed25519;
pub mod error;
pub mod hash;
pub mod merkle;

pub use ed25519::{public_key_from_keypair_bytes, Keypair, KEYPAIR_LEN, PUBLIC_KEY_LEN};
pub use error::CryptoError;
pub use hash::{hash, hash_pair};
pub use merkle::MerkleTree;

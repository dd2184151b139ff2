use thiserror::Error;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CryptoError {
    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid keypair encoding: expected 64 bytes, got {0}")]
    InvalidKeypairEncoding(usize),

    #[error("Invalid seed length: expected 32, got {0}")]
    InvalidSeedLength(usize),
}

use crate::error::CryptoError;
use rand::rngs::OsRng;
use std::fmt;
use zeroize::Zeroize;

/// Length of the stored keypair encoding: 32-byte seed followed by the
/// 32-byte public key.
pub const KEYPAIR_LEN: usize = 64;

/// Length of an ed25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Ed25519 keypair backing a named simulation key.
///
/// The inner dalek signing key zeroizes its own secret on drop; transient
/// seed copies made in this module are scrubbed explicitly.
pub struct Keypair {
    signing_key: ed25519_dalek::SigningKey,
}

impl Keypair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        let signing_key = ed25519_dalek::SigningKey::generate(&mut csprng);
        Self { signing_key }
    }

    /// Create from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = ed25519_dalek::SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Get the public key bytes
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Export the 64-byte keypair encoding: seed followed by public key.
    /// This is the value persisted for a named key.
    pub fn to_keypair_bytes(&self) -> [u8; KEYPAIR_LEN] {
        self.signing_key.to_keypair_bytes()
    }

    /// Rebuild a keypair from its 64-byte stored encoding.
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEYPAIR_LEN {
            return Err(CryptoError::InvalidKeypairEncoding(bytes.len()));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes[..32]);
        let keypair = Self::from_seed(&seed);
        seed.zeroize();
        // the trailing half must be the matching public key
        if keypair.public_key() != bytes[32..] {
            return Err(CryptoError::InvalidPublicKey);
        }
        Ok(keypair)
    }
}

/// Extract the public half of a stored 64-byte keypair encoding without
/// reconstructing the private key.
pub fn public_key_from_keypair_bytes(bytes: &[u8]) -> Result<[u8; PUBLIC_KEY_LEN], CryptoError> {
    if bytes.len() != KEYPAIR_LEN {
        return Err(CryptoError::InvalidKeypairEncoding(bytes.len()));
    }
    let mut public = [0u8; PUBLIC_KEY_LEN];
    public.copy_from_slice(&bytes[32..]);
    Ok(public)
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({})", hex_prefix(&self.public_key()))
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(4).map(|b| format!("{:02x}", b)).collect::<String>() + ".."
}

impl Clone for Keypair {
    fn clone(&self) -> Self {
        Self {
            signing_key: self.signing_key.clone(),
        }
    }
}

use crate::error::TypesError;
use std::fmt;

/// 32-byte blake3 digest identifying a committed state.
///
/// The simulator's Merkle index hashes each key/value record into a leaf
/// (see [`Hash::entry`]) and folds the leaves up to a root of this type,
/// so equal roots mean bit-identical state.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash([u8; 32]);

impl Hash {
    /// Root of the empty state.
    pub const ZERO: Self = Self([0u8; 32]);

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Rebuild a digest from its persisted form.
    pub fn from_slice(slice: &[u8]) -> Result<Self, TypesError> {
        if slice.len() != 32 {
            return Err(TypesError::InvalidHashLength(slice.len()));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    /// Digest of a single buffer.
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Digest of several buffers fed through one hasher, equal to hashing
    /// their concatenation.
    pub fn compute_multi(data: &[&[u8]]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for chunk in data {
            hasher.update(chunk);
        }
        Self(*hasher.finalize().as_bytes())
    }

    /// Leaf digest of one key/value record in the state index. The
    /// separator byte keeps `("ab", "c")` and `("a", "bc")` from
    /// producing the same leaf.
    pub fn entry(key: &[u8], value: &[u8]) -> Self {
        Self::compute_multi(&[key, &[0x1e], value])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash(0x{})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_deterministic() {
        assert_eq!(Hash::compute(b"state"), Hash::compute(b"state"));
        assert_ne!(Hash::compute(b"state"), Hash::compute(b"state2"));
        assert_ne!(Hash::compute(b""), Hash::ZERO);
    }

    #[test]
    fn test_compute_multi_matches_concatenation() {
        assert_eq!(
            Hash::compute_multi(&[b"hello ", b"world"]),
            Hash::compute(b"hello world")
        );
    }

    #[test]
    fn test_entry_separates_key_from_value() {
        assert_ne!(Hash::entry(b"ab", b"c"), Hash::entry(b"a", b"bc"));
        assert_eq!(Hash::entry(b"k", b"v"), Hash::entry(b"k", b"v"));
    }

    #[test]
    fn test_from_slice_roundtrip() {
        let root = Hash::entry(b"k", b"v");
        assert_eq!(Hash::from_slice(root.as_bytes()).unwrap(), root);

        assert!(matches!(
            Hash::from_slice(&[0u8; 16]),
            Err(TypesError::InvalidHashLength(16))
        ));
    }

    #[test]
    fn test_display_is_prefixed_hex() {
        let text = Hash::ZERO.to_string();
        assert!(text.starts_with("0x"));
        assert_eq!(text.len(), 2 + 64);
    }
}

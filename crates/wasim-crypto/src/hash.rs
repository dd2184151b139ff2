use wasim_types::Hash;

/// Blake3 hashing utilities.

/// Compute blake3 hash of data
pub fn hash(data: &[u8]) -> Hash {
    Hash::compute(data)
}

/// Hash two values together (useful for Merkle trees)
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    Hash::compute_multi(&[left.as_bytes(), right.as_bytes()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(hash(b"x"), hash(b"x"));
        assert_ne!(hash(b"x"), hash(b"y"));
    }

    #[test]
    fn test_hash_pair_order_matters() {
        let a = hash(b"a");
        let b = hash(b"b");
        assert_ne!(hash_pair(&a, &b), hash_pair(&b, &a));
    }
}

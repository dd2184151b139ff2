use crate::hash::hash_pair;
use wasim_types::Hash;

/// Binary Merkle tree using blake3.
///
/// Used to index the simulator's key/value state: leaves are hashed
/// key/value records in key order, so a given state maps to exactly one
/// root.
pub struct MerkleTree {
    leaves: Vec<Hash>,
    root: Hash,
}

impl MerkleTree {
    /// Build a Merkle tree from leaf hashes.
    pub fn from_leaves(leaves: &[Hash]) -> Self {
        if leaves.is_empty() {
            return Self {
                leaves: vec![],
                root: Hash::ZERO,
            };
        }

        // Special case: single leaf is its own root
        if leaves.len() == 1 {
            return Self {
                leaves: leaves.to_vec(),
                root: leaves[0],
            };
        }

        let mut tree_leaves = leaves.to_vec();

        // If odd number of leaves, duplicate the last one
        if tree_leaves.len() % 2 != 0 {
            if let Some(last) = tree_leaves.last().copied() {
                tree_leaves.push(last);
            }
        }

        let mut current_level = tree_leaves.clone();

        // Build tree bottom-up
        while current_level.len() > 1 {
            let mut next_level = Vec::with_capacity(current_level.len() / 2 + 1);

            for chunk in current_level.chunks(2) {
                let left = &chunk[0];
                let right = if chunk.len() == 2 { &chunk[1] } else { left };
                next_level.push(hash_pair(left, right));
            }

            current_level = next_level;
        }

        Self {
            leaves: tree_leaves,
            root: current_level[0],
        }
    }

    /// Get the root hash. The empty tree has a zero root.
    pub fn root(&self) -> Hash {
        self.root
    }

    /// Number of leaves
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }
}

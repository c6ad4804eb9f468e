//! Membership tree over the card registry
//!
//! Binary SHA-256 Merkle tree whose leaves are the registry's public keys in
//! canonical (ascending card id) order.
//!
//! ## Hashing
//!
//! - Leaf: `SHA-256(0x00 || compressed_key)`
//! - Node: `SHA-256(0x01 || left || right)`
//!
//! ## Padding
//!
//! The leaf layer is padded to the next power of two with [`EMPTY_LEAF`]
//! (32 zero bytes). A one-key tree has depth 0 and its root is the leaf hash.
//! Changing this rule changes every published root.

use crate::crypto::CardPublicKey;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use thiserror::Error;

/// 32-byte hash (SHA-256 output)
pub type Hash = [u8; 32];

/// Sentinel used for padding leaves
pub const EMPTY_LEAF: Hash = [0u8; 32];

const LEAF_TAG: u8 = 0x00;
const NODE_TAG: u8 = 0x01;

/// Membership tree errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    #[error("Cannot build a membership tree without leaves")]
    EmptyTree,

    #[error("Duplicate leaf: {0}")]
    DuplicateLeaf(CardPublicKey),

    #[error("Leaf not found: {0}")]
    LeafNotFound(CardPublicKey),
}

/// Hash a card key into a leaf
pub fn leaf_hash(key: &CardPublicKey) -> Hash {
    Sha256::new()
        .chain_update([LEAF_TAG])
        .chain_update(key.as_bytes())
        .finalize()
        .into()
}

/// Hash two children into their parent
pub fn node_hash(left: &Hash, right: &Hash) -> Hash {
    Sha256::new()
        .chain_update([NODE_TAG])
        .chain_update(left)
        .chain_update(right)
        .finalize()
        .into()
}

/// A complete, padded membership tree
///
/// `levels[0]` is the padded leaf layer, the last level holds only the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipTree {
    keys: Vec<CardPublicKey>,
    levels: Vec<Vec<Hash>>,
}

impl MembershipTree {
    /// Build a tree from keys in canonical order
    pub fn build(keys: &[CardPublicKey]) -> Result<Self, TreeError> {
        if keys.is_empty() {
            return Err(TreeError::EmptyTree);
        }

        let mut seen = BTreeSet::new();
        for key in keys {
            if !seen.insert(*key) {
                return Err(TreeError::DuplicateLeaf(*key));
            }
        }

        let width = keys.len().next_power_of_two();
        let mut leaves: Vec<Hash> = keys.iter().map(leaf_hash).collect();
        leaves.resize(width, EMPTY_LEAF);

        let mut levels = vec![leaves];
        while levels[levels.len() - 1].len() > 1 {
            let next: Vec<Hash> = levels[levels.len() - 1]
                .chunks_exact(2)
                .map(|pair| node_hash(&pair[0], &pair[1]))
                .collect();
            levels.push(next);
        }

        Ok(Self {
            keys: keys.to_vec(),
            levels,
        })
    }

    /// Get the root hash
    pub fn root(&self) -> Hash {
        self.levels[self.levels.len() - 1][0]
    }

    /// Number of edges from leaf to root
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// Number of real (unpadded) leaves
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Leaf keys in tree order
    pub fn keys(&self) -> &[CardPublicKey] {
        &self.keys
    }

    pub fn leaf_index(&self, key: &CardPublicKey) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    pub fn contains(&self, key: &CardPublicKey) -> bool {
        self.leaf_index(key).is_some()
    }

    /// Authentication path from `key`'s leaf to the root
    pub fn path(&self, key: &CardPublicKey) -> Result<MembershipWitness, TreeError> {
        let leaf_index = self
            .leaf_index(key)
            .ok_or(TreeError::LeafNotFound(*key))?;

        let mut siblings = Vec::with_capacity(self.depth());
        let mut directions = Vec::with_capacity(self.depth());
        let mut index = leaf_index;

        for level in &self.levels[..self.depth()] {
            siblings.push(level[index ^ 1]);
            directions.push(index & 1 == 1);
            index >>= 1;
        }

        Ok(MembershipWitness {
            leaf_value: *key,
            leaf_index,
            siblings,
            directions,
        })
    }
}

/// Authentication path for one leaf
///
/// `directions[i]` is `true` when the running node at level `i` is the right
/// child, i.e. the sibling sits on the left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipWitness {
    pub leaf_value: CardPublicKey,
    pub leaf_index: usize,
    pub siblings: Vec<Hash>,
    pub directions: Vec<bool>,
}

impl MembershipWitness {
    /// Recompute the root implied by this path
    pub fn compute_root(&self) -> Hash {
        let mut current = leaf_hash(&self.leaf_value);
        for (sibling, is_right) in self.siblings.iter().zip(&self.directions) {
            current = if *is_right {
                node_hash(sibling, &current)
            } else {
                node_hash(&current, sibling)
            };
        }
        current
    }

    /// Leaf index encoded by the direction bits (little-endian)
    ///
    /// `None` when a set bit lies beyond `usize`.
    pub fn index_from_directions(&self) -> Option<usize> {
        self.directions
            .iter()
            .enumerate()
            .filter(|(_, bit)| **bit)
            .try_fold(0usize, |acc, (level, _)| {
                let bit = u32::try_from(level)
                    .ok()
                    .and_then(|level| 1usize.checked_shl(level))?;
                Some(acc | bit)
            })
    }

    /// Check the path against a published root
    pub fn verify(&self, root: &Hash) -> bool {
        self.siblings.len() == self.directions.len()
            && self.index_from_directions() == Some(self.leaf_index)
            && &self.compute_root() == root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;
    use proptest::prelude::*;

    fn test_key(id: u8) -> CardPublicKey {
        let mut secret = [0u8; 32];
        secret[0] = 0x42;
        secret[31] = id;
        let signer = SigningKey::from_slice(&secret).unwrap();
        CardPublicKey::from_verifying_key(signer.verifying_key())
    }

    fn test_keys(n: u8) -> Vec<CardPublicKey> {
        (1..=n).map(test_key).collect()
    }

    #[test]
    fn test_empty_tree_rejected() {
        assert_eq!(MembershipTree::build(&[]), Err(TreeError::EmptyTree));
    }

    #[test]
    fn test_duplicate_leaf_rejected() {
        let key = test_key(1);
        let result = MembershipTree::build(&[key, test_key(2), key]);
        assert_eq!(result, Err(TreeError::DuplicateLeaf(key)));
    }

    #[test]
    fn test_single_leaf_tree() {
        let key = test_key(1);
        let tree = MembershipTree::build(&[key]).unwrap();

        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.root(), leaf_hash(&key));

        let witness = tree.path(&key).unwrap();
        assert!(witness.siblings.is_empty());
        assert!(witness.verify(&tree.root()));
    }

    #[test]
    fn test_padding_with_sentinel() {
        let keys = test_keys(3);
        let tree = MembershipTree::build(&keys).unwrap();

        assert_eq!(tree.depth(), 2);
        let left = node_hash(&leaf_hash(&keys[0]), &leaf_hash(&keys[1]));
        let right = node_hash(&leaf_hash(&keys[2]), &EMPTY_LEAF);
        assert_eq!(tree.root(), node_hash(&left, &right));

        // The third key's sibling is the sentinel
        let witness = tree.path(&keys[2]).unwrap();
        assert_eq!(witness.siblings[0], EMPTY_LEAF);
        assert_eq!(witness.directions, vec![false, true]);
    }

    #[test]
    fn test_leaf_not_found() {
        let tree = MembershipTree::build(&test_keys(4)).unwrap();
        let outsider = test_key(99);
        assert_eq!(tree.path(&outsider), Err(TreeError::LeafNotFound(outsider)));
    }

    #[test]
    fn test_order_changes_root() {
        let keys = test_keys(4);
        let mut reversed = keys.clone();
        reversed.reverse();

        let a = MembershipTree::build(&keys).unwrap();
        let b = MembershipTree::build(&reversed).unwrap();
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn test_tampered_sibling_fails() {
        let keys = test_keys(5);
        let tree = MembershipTree::build(&keys).unwrap();
        let mut witness = tree.path(&keys[1]).unwrap();
        witness.siblings[1][0] ^= 0x01;
        assert!(!witness.verify(&tree.root()));
    }

    #[test]
    fn test_wrong_index_fails() {
        let keys = test_keys(4);
        let tree = MembershipTree::build(&keys).unwrap();
        let mut witness = tree.path(&keys[2]).unwrap();
        witness.leaf_index = 1;
        assert!(!witness.verify(&tree.root()));
    }

    #[test]
    fn test_overlong_path_fails_without_overflow() {
        let keys = test_keys(4);
        let tree = MembershipTree::build(&keys).unwrap();
        let mut witness = tree.path(&keys[1]).unwrap();
        witness.siblings = vec![[0u8; 32]; 70];
        witness.directions = vec![true; 70];

        assert_eq!(witness.index_from_directions(), None);
        assert!(!witness.verify(&tree.root()));

        // bits past usize that are unset still encode an index
        witness.directions = vec![false; 70];
        witness.directions[3] = true;
        assert_eq!(witness.index_from_directions(), Some(8));
        assert!(!witness.verify(&tree.root()));
    }

    proptest! {
        /// Property test: every leaf's path recomputes the root
        #[test]
        fn prop_path_round_trip(count in 1u8..40, pick in any::<u8>()) {
            let keys = test_keys(count);
            let tree = MembershipTree::build(&keys).unwrap();
            let key = keys[pick as usize % keys.len()];

            let witness = tree.path(&key).unwrap();
            prop_assert_eq!(witness.compute_root(), tree.root());
            prop_assert_eq!(witness.siblings.len(), tree.depth());
            prop_assert_eq!(witness.index_from_directions(), Some(witness.leaf_index));
        }

        /// Property test: identical leaf order yields bit-identical roots
        #[test]
        fn prop_deterministic_root(count in 1u8..40) {
            let keys = test_keys(count);
            let a = MembershipTree::build(&keys).unwrap();
            let b = MembershipTree::build(&keys).unwrap();
            prop_assert_eq!(a.root(), b.root());
        }
    }
}

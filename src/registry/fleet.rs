//! Fleet snapshot: a registry and the tree built from it, swapped as one
//!
//! Readers take an `Arc<Fleet>` and keep using it for a whole attempt, so a
//! concurrent `replace` never hands out a tree whose root disagrees with its
//! own leaf set.

use super::{CardId, Registry};
use crate::crypto::CardPublicKey;
use crate::merkle::{Hash, MembershipTree, MembershipWitness, TreeError};
use std::sync::{Arc, RwLock};

/// Registry plus its membership tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fleet {
    registry: Registry,
    tree: MembershipTree,
}

impl Fleet {
    pub fn new(registry: Registry) -> Result<Self, TreeError> {
        let tree = MembershipTree::build(&registry.keys_in_order())?;
        tracing::info!(
            cards = registry.len(),
            depth = tree.depth(),
            root = %hex::encode(tree.root()),
            "membership tree built"
        );
        Ok(Self { registry, tree })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn tree(&self) -> &MembershipTree {
        &self.tree
    }

    pub fn root(&self) -> Hash {
        self.tree.root()
    }

    pub fn witness(&self, key: &CardPublicKey) -> Result<MembershipWitness, TreeError> {
        self.tree.path(key)
    }

    pub fn card_for_key(&self, key: &CardPublicKey) -> Option<&CardId> {
        self.registry.card_for_key(key)
    }
}

/// Process-wide handle to the current fleet snapshot
#[derive(Debug)]
pub struct FleetHandle {
    current: RwLock<Arc<Fleet>>,
}

impl FleetHandle {
    pub fn new(fleet: Fleet) -> Self {
        Self {
            current: RwLock::new(Arc::new(fleet)),
        }
    }

    /// Current snapshot
    pub fn current(&self) -> Arc<Fleet> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Build a tree for `registry` and swap it in atomically.
    ///
    /// The tree is built before the write lock is taken; on error the old
    /// snapshot stays in place.
    pub fn replace(&self, registry: Registry) -> Result<Hash, TreeError> {
        let fleet = Arc::new(Fleet::new(registry)?);
        let root = fleet.root();
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = fleet;
        Ok(root)
    }
}

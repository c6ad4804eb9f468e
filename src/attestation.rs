//! Attestation records ("Sigmojis")
//!
//! A record is what a collector keeps after tapping a card: the visual
//! identity they picked, the tap claim, and at most one membership proof.
//! The proof is shared through an `Arc`, so a record that is reused for a
//! second message hands out the identical proof object.

use crate::crypto::SignedNonce;
use crate::merkle::Hash;
use crate::registry::ResolvedCard;
use crate::stark::MembershipProof;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Identity whose messages are posted as the SHA-256 of their text
pub const MAGIC_WAND: &str = "magic-wand.png";

/// Visual identity token (an image asset name)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VisualIdentity(String);

impl VisualIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_magic_wand(&self) -> bool {
        self.0 == MAGIC_WAND
    }
}

impl fmt::Display for VisualIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One collected tap: the signed nonce and the card it resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedClaim {
    pub signed_nonce: SignedNonce,
    pub card: ResolvedCard,
}

/// Proof attached to a record
#[derive(Debug, Clone, Default)]
pub enum ProofState {
    #[default]
    Unproved,
    Proved(Arc<MembershipProof>),
}

impl ProofState {
    pub fn is_proved(&self) -> bool {
        matches!(self, ProofState::Proved(_))
    }
}

#[derive(Debug, Clone)]
pub struct AttestationRecord {
    visual_identity: VisualIdentity,
    claim: CollectedClaim,
    proof: ProofState,
}

impl AttestationRecord {
    pub fn new(visual_identity: VisualIdentity, claim: CollectedClaim) -> Self {
        Self {
            visual_identity,
            claim,
            proof: ProofState::Unproved,
        }
    }

    pub fn visual_identity(&self) -> &VisualIdentity {
        &self.visual_identity
    }

    pub fn claim(&self) -> &CollectedClaim {
        &self.claim
    }

    pub fn proof_state(&self) -> &ProofState {
        &self.proof
    }

    pub fn proof(&self) -> Option<&Arc<MembershipProof>> {
        match &self.proof {
            ProofState::Proved(proof) => Some(proof),
            ProofState::Unproved => None,
        }
    }

    /// Attached proof, if it was made against `root`
    pub fn proof_for_root(&self, root: &Hash) -> Option<Arc<MembershipProof>> {
        self.proof()
            .filter(|proof| proof.root() == root)
            .map(Arc::clone)
    }

    /// Attach a proof. A proof already attached for the same root is kept
    /// and returned instead.
    pub fn attach(&mut self, proof: Arc<MembershipProof>) -> Arc<MembershipProof> {
        if let Some(existing) = self.proof_for_root(proof.root()) {
            return existing;
        }
        self.proof = ProofState::Proved(Arc::clone(&proof));
        proof
    }

    /// Text actually posted for `message` under this identity
    pub fn outgoing_message(&self, message: &str) -> String {
        if self.visual_identity.is_magic_wand() {
            hex::encode(Sha256::digest(message.as_bytes()))
        } else {
            message.to_string()
        }
    }
}

/// A collector's records, one per visual identity
#[derive(Debug, Clone, Default)]
pub struct Collection {
    records: BTreeMap<VisualIdentity, AttestationRecord>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any earlier one for the same identity
    pub fn insert(&mut self, record: AttestationRecord) -> Option<AttestationRecord> {
        self.records
            .insert(record.visual_identity().clone(), record)
    }

    pub fn get(&self, identity: &VisualIdentity) -> Option<&AttestationRecord> {
        self.records.get(identity)
    }

    pub fn get_mut(&mut self, identity: &VisualIdentity) -> Option<&mut AttestationRecord> {
        self.records.get_mut(identity)
    }

    pub fn identities(&self) -> impl Iterator<Item = &VisualIdentity> {
        self.records.keys()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

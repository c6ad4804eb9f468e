//! Types for membership STARK proofs

use crate::crypto::{hex_serde, CardPublicKey, SignedNonce};
use crate::merkle::{Hash, MembershipWitness};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Proof generation / verification errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    /// The witness does not satisfy the circuit
    #[error("Witness does not satisfy circuit: {0}")]
    UnsatisfiedWitness(String),

    /// The proof bytes are malformed or do not bind the public inputs
    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    /// Proof could not be (de)serialized
    #[error("Proof encoding error: {0}")]
    Encoding(String),

    /// Blocking proving task panicked or was aborted
    #[error("Proving task failed: {0}")]
    TaskFailed(String),
}

/// Circuit description shared by prover and verifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitSpec {
    /// Stable circuit identifier, bound into every proof
    pub id: String,

    /// Circuit version, bound into every proof
    pub version: u8,

    /// Deepest membership tree the circuit accepts
    pub max_depth: usize,
}

impl Default for CircuitSpec {
    fn default() -> Self {
        Self {
            id: "sigmoji-membership".to_string(),
            version: 1,
            max_depth: 20,
        }
    }
}

/// Public inputs a membership proof is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicInputs {
    /// Membership tree root
    #[serde(with = "hex_serde")]
    pub root: Hash,

    /// Attest digest the card signed
    #[serde(with = "hex_serde")]
    pub digest: [u8; 32],

    /// Raw nonce behind `digest`
    #[serde(with = "hex_serde")]
    pub nonce: Vec<u8>,
}

impl PublicInputs {
    pub fn new(root: Hash, signed_nonce: &SignedNonce) -> Self {
        Self {
            root,
            digest: signed_nonce.digest,
            nonce: signed_nonce.nonce.clone(),
        }
    }
}

/// Private witness: never leaves the prover, zeroized on drop
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateWitness {
    pub(crate) leaf_value: Vec<u8>,
    pub(crate) leaf_index: u64,
    pub(crate) siblings: Vec<Hash>,
    pub(crate) directions: Vec<bool>,
    pub(crate) signature: Vec<u8>,
}

impl PrivateWitness {
    pub fn new(witness: MembershipWitness, signature: Vec<u8>) -> Self {
        Self {
            leaf_value: witness.leaf_value.as_bytes().to_vec(),
            leaf_index: witness.leaf_index as u64,
            siblings: witness.siblings,
            directions: witness.directions,
            signature,
        }
    }

    pub fn depth(&self) -> usize {
        self.siblings.len()
    }

    /// Membership witness view of this private witness
    pub(crate) fn membership(&self) -> Result<MembershipWitness, ProofError> {
        let leaf_value = CardPublicKey::from_sec1_bytes(&self.leaf_value)
            .map_err(|e| ProofError::UnsatisfiedWitness(e.to_string()))?;
        Ok(MembershipWitness {
            leaf_value,
            leaf_index: self.leaf_index as usize,
            siblings: self.siblings.clone(),
            directions: self.directions.clone(),
        })
    }
}

/// A membership proof and the public inputs it is bound to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipProof {
    /// Circuit the proof was produced for
    pub circuit: CircuitSpec,

    /// Backend that produced the proof
    pub backend: String,

    /// Bound public inputs
    pub public_inputs: PublicInputs,

    /// Opaque proof bytes
    #[serde(with = "hex_serde")]
    pub proof_bytes: Vec<u8>,
}

impl MembershipProof {
    /// Get the size of the proof in bytes
    pub fn size(&self) -> usize {
        self.proof_bytes.len()
    }

    pub fn root(&self) -> &Hash {
        &self.public_inputs.root
    }

    /// CBOR encoding for transit
    pub fn to_cbor(&self) -> Result<Vec<u8>, ProofError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| ProofError::Encoding(e.to_string()))?;
        Ok(bytes)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, ProofError> {
        ciborium::from_reader(bytes).map_err(|e| ProofError::Encoding(e.to_string()))
    }

    /// Hex of the CBOR encoding, as carried in the relay's `serializedZKP`
    pub fn to_serialized(&self) -> Result<String, ProofError> {
        Ok(hex::encode(self.to_cbor()?))
    }

    pub fn from_serialized(value: &str) -> Result<Self, ProofError> {
        let bytes = crate::crypto::decode_hex(value)
            .map_err(|e| ProofError::Encoding(e.to_string()))?;
        Self::from_cbor(&bytes)
    }
}

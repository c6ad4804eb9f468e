//! STARK membership proofs
//!
//! The prover only produces a proof once it has checked that the key which
//! signed a tap's attest digest is a leaf of the fleet's membership tree.
//! The private witness (leaf key, index, path, signature) never leaves the
//! prover.
//!
//! ## Security Properties
//! - Completeness: a registered card's tap always proves and verifies
//! - Prover checks: a wrong root, path or signature produces no proof
//! - Verified: a winterfell STARK for the path-shape AIR, bound to the
//!   circuit and public inputs `(root, digest, nonce)`
//! - Not verified: node hashing and the card signature, which are checked
//!   natively by the prover and not arithmetized
//! - Not hiding: winterfell 0.12 does not blind the trace
//! - Determinism: the same witness and inputs produce the same proof bytes

pub mod backend;
pub mod circuit;
pub mod engine;
pub mod prover;
pub mod types;
pub mod verifier;

#[cfg(test)]
mod proptests;

pub use backend::{ProvingBackend, StarkBackend};
pub use circuit::MembershipAir;
pub use engine::ProofEngine;
pub use prover::prove_membership;
pub use types::{CircuitSpec, MembershipProof, PrivateWitness, ProofError, PublicInputs};
pub use verifier::verify_membership;

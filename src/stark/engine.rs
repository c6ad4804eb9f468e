//! Proof engine: witness in, bound membership proof out
//!
//! Wraps a [`ProvingBackend`] with the circuit description, logging, and
//! record caching. Proving is CPU-bound; async callers go through
//! [`ProofEngine::prove_async`], which runs it on the blocking pool.

use super::{
    backend::{ProvingBackend, StarkBackend},
    types::{CircuitSpec, MembershipProof, PrivateWitness, ProofError, PublicInputs},
};
use crate::attestation::AttestationRecord;
use crate::crypto::SignedNonce;
use crate::error::AttestResult;
use crate::merkle::{Hash, MembershipWitness};
use crate::registry::Fleet;
use std::sync::Arc;
use std::time::Instant;

pub struct ProofEngine {
    backend: Arc<dyn ProvingBackend>,
    circuit: CircuitSpec,
}

impl Default for ProofEngine {
    fn default() -> Self {
        Self::new(Arc::new(StarkBackend))
    }
}

impl std::fmt::Debug for ProofEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofEngine")
            .field("backend", &self.backend.name())
            .field("circuit", &self.circuit)
            .finish()
    }
}

impl ProofEngine {
    pub fn new(backend: Arc<dyn ProvingBackend>) -> Self {
        Self {
            backend,
            circuit: CircuitSpec::default(),
        }
    }

    pub fn with_circuit(mut self, circuit: CircuitSpec) -> Self {
        self.circuit = circuit;
        self
    }

    pub fn circuit(&self) -> &CircuitSpec {
        &self.circuit
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Prove that the signer of `signed_nonce` is the leaf of `witness`
    /// under `root`.
    pub fn prove(
        &self,
        witness: MembershipWitness,
        signed_nonce: &SignedNonce,
        root: Hash,
    ) -> Result<MembershipProof, ProofError> {
        let started = Instant::now();
        let public_inputs = PublicInputs::new(root, signed_nonce);
        let private = PrivateWitness::new(witness, signed_nonce.signature.clone());

        let proof_bytes = self
            .backend
            .prove(&self.circuit, &public_inputs, &private)
            .map_err(|e| {
                tracing::error!(error = %e, backend = self.backend.name(), "membership proof generation failed");
                e
            })?;

        tracing::info!(
            backend = self.backend.name(),
            size = proof_bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "membership proof generated"
        );

        Ok(MembershipProof {
            circuit: self.circuit.clone(),
            backend: self.backend.name().to_string(),
            public_inputs,
            proof_bytes,
        })
    }

    /// Verify a proof produced for this engine's circuit and backend
    pub fn verify(&self, proof: &MembershipProof) -> bool {
        if proof.circuit != self.circuit {
            tracing::warn!(circuit = %proof.circuit.id, version = proof.circuit.version, "proof is for another circuit");
            return false;
        }
        if proof.backend != self.backend.name() {
            tracing::warn!(backend = %proof.backend, "proof is from another backend");
            return false;
        }
        self.backend
            .verify(&self.circuit, &proof.public_inputs, &proof.proof_bytes)
    }

    /// Proof for `record` against the fleet's current root.
    ///
    /// A proof already attached for that root is returned as is (same `Arc`).
    pub fn ensure_proved(
        &self,
        record: &mut AttestationRecord,
        fleet: &Fleet,
    ) -> AttestResult<Arc<MembershipProof>> {
        let root = fleet.root();
        if let Some(proof) = record.proof_for_root(&root) {
            tracing::debug!(identity = %record.visual_identity(), "reusing attached proof");
            return Ok(proof);
        }

        let claim = record.claim();
        let witness = fleet.witness(&claim.card.public_key)?;
        let proof = self.prove(witness, &claim.signed_nonce, root)?;
        Ok(record.attach(Arc::new(proof)))
    }

    /// [`prove`](Self::prove) on the blocking pool.
    ///
    /// Dropping the returned future does not stop the computation; its
    /// result is discarded.
    pub async fn prove_async(
        self: &Arc<Self>,
        witness: MembershipWitness,
        signed_nonce: SignedNonce,
        root: Hash,
    ) -> Result<MembershipProof, ProofError> {
        let engine = Arc::clone(self);
        tokio::task::spawn_blocking(move || engine.prove(witness, &signed_nonce, root))
            .await
            .map_err(|e| ProofError::TaskFailed(e.to_string()))?
    }

    /// Async form of [`ensure_proved`](Self::ensure_proved)
    pub async fn ensure_proved_async(
        self: &Arc<Self>,
        record: &mut AttestationRecord,
        fleet: &Fleet,
    ) -> AttestResult<Arc<MembershipProof>> {
        let root = fleet.root();
        if let Some(proof) = record.proof_for_root(&root) {
            tracing::debug!(identity = %record.visual_identity(), "reusing attached proof");
            return Ok(proof);
        }

        let claim = record.claim();
        let witness = fleet.witness(&claim.card.public_key)?;
        let proof = self
            .prove_async(witness, claim.signed_nonce.clone(), root)
            .await?;
        Ok(record.attach(Arc::new(proof)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::{CollectedClaim, VisualIdentity};
    use crate::crypto::recover;
    use crate::registry::tests::test_registry;
    use crate::stark::prover::tests::signed_nonce;

    fn collected(fleet: &Fleet, id: u8, nonce: &[u8]) -> AttestationRecord {
        let signed = signed_nonce(id, nonce);
        let candidates = recover(&signed.digest, &signed.signature).unwrap();
        let card = fleet.registry().resolve(&candidates).unwrap();
        AttestationRecord::new(
            VisualIdentity::new("cat.png"),
            CollectedClaim {
                signed_nonce: signed,
                card,
            },
        )
    }

    #[test]
    fn test_prove_then_verify() {
        let fleet = Fleet::new(test_registry(&[1, 2, 3, 4, 5])).unwrap();
        let engine = ProofEngine::default();
        let signed = signed_nonce(4, b"tap");

        let witness = fleet.witness(&crate::registry::tests::test_key(4)).unwrap();
        let proof = engine.prove(witness, &signed, fleet.root()).unwrap();

        assert_eq!(proof.backend, StarkBackend::NAME);
        assert_eq!(proof.root(), &fleet.root());
        assert!(engine.verify(&proof));
        assert!(engine.verify(&proof));
    }

    #[test]
    fn test_verify_rejects_proof_moved_to_other_tap() {
        let fleet = Fleet::new(test_registry(&[1, 2, 3])).unwrap();
        let engine = ProofEngine::default();
        let mut first = collected(&fleet, 2, b"first");
        let proof = engine.ensure_proved(&mut first, &fleet).unwrap();

        // Attacker-chosen nonce, digest recomputed, honest proof bytes reused
        let forged_nonce = signed_nonce(3, b"not-a-tap");
        let mut forged = (*proof).clone();
        forged.public_inputs = PublicInputs::new(fleet.root(), &forged_nonce);
        assert!(!engine.verify(&forged));

        forged.proof_bytes = vec![0u8; proof.proof_bytes.len()];
        assert!(!engine.verify(&forged));
    }

    #[test]
    fn test_verify_rejects_other_circuit() {
        let fleet = Fleet::new(test_registry(&[1, 2])).unwrap();
        let engine = ProofEngine::default();
        let mut record = collected(&fleet, 1, b"tap");
        let proof = engine.ensure_proved(&mut record, &fleet).unwrap();

        let other = ProofEngine::default().with_circuit(CircuitSpec {
            version: 9,
            ..CircuitSpec::default()
        });
        assert!(!other.verify(&proof));
    }

    #[test]
    fn test_ensure_proved_reuses_same_arc() {
        let fleet = Fleet::new(test_registry(&[1, 2, 3])).unwrap();
        let engine = ProofEngine::default();
        let mut record = collected(&fleet, 2, b"tap");

        let first = engine.ensure_proved(&mut record, &fleet).unwrap();
        let second = engine.ensure_proved(&mut record, &fleet).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_ensure_proved_reproves_after_fleet_change() {
        let fleet = Fleet::new(test_registry(&[1, 2, 3])).unwrap();
        let engine = ProofEngine::default();
        let mut record = collected(&fleet, 2, b"tap");
        let first = engine.ensure_proved(&mut record, &fleet).unwrap();

        let grown = Fleet::new(test_registry(&[1, 2, 3, 4])).unwrap();
        let second = engine.ensure_proved(&mut record, &grown).unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.root(), &grown.root());
        assert!(engine.verify(&second));
    }

    #[test]
    fn test_ensure_proved_card_removed_from_fleet() {
        let fleet = Fleet::new(test_registry(&[1, 2, 3])).unwrap();
        let engine = ProofEngine::default();
        let mut record = collected(&fleet, 3, b"tap");

        let shrunk = Fleet::new(test_registry(&[1, 2])).unwrap();
        let result = engine.ensure_proved(&mut record, &shrunk);
        assert!(matches!(result, Err(crate::AttestError::LeafNotFound(_))));
        assert!(!record.proof_state().is_proved());
    }

    #[tokio::test]
    async fn test_prove_async_matches_sync() {
        let fleet = Fleet::new(test_registry(&[1, 2, 3])).unwrap();
        let engine = Arc::new(ProofEngine::default());
        let signed = signed_nonce(1, b"async");
        let witness = fleet.witness(&crate::registry::tests::test_key(1)).unwrap();

        let sync_proof = engine
            .prove(witness.clone(), &signed, fleet.root())
            .unwrap();
        let async_proof = engine
            .prove_async(witness, signed, fleet.root())
            .await
            .unwrap();
        assert_eq!(sync_proof, async_proof);
    }
}

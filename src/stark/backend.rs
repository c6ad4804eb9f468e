//! Proving backend capability
//!
//! The engine only knows this trait; the constraint system behind it is
//! swappable. Implementations must be `Send + Sync` so one backend can serve
//! the blocking pool.

use super::{
    prover::prove_membership,
    types::{CircuitSpec, PrivateWitness, ProofError, PublicInputs},
    verifier::verify_membership,
};

/// A proof system able to prove and verify registry membership
pub trait ProvingBackend: Send + Sync {
    /// Stable backend name, recorded in every proof
    fn name(&self) -> &'static str;

    /// Produce proof bytes, or fail if any constraint is unsatisfied
    fn prove(
        &self,
        circuit: &CircuitSpec,
        public_inputs: &PublicInputs,
        witness: &PrivateWitness,
    ) -> Result<Vec<u8>, ProofError>;

    /// Check proof bytes against public inputs
    fn verify(&self, circuit: &CircuitSpec, public_inputs: &PublicInputs, proof: &[u8]) -> bool;
}

/// Default backend: winterfell AIR over the path trace
#[derive(Debug, Clone, Copy, Default)]
pub struct StarkBackend;

impl StarkBackend {
    pub const NAME: &'static str = "winterfell-stark";
}

impl ProvingBackend for StarkBackend {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn prove(
        &self,
        circuit: &CircuitSpec,
        public_inputs: &PublicInputs,
        witness: &PrivateWitness,
    ) -> Result<Vec<u8>, ProofError> {
        prove_membership(circuit, public_inputs, witness)
    }

    fn verify(&self, circuit: &CircuitSpec, public_inputs: &PublicInputs, proof: &[u8]) -> bool {
        match verify_membership(circuit, public_inputs, proof) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "membership proof rejected");
                false
            }
        }
    }
}

//! STARK circuit (AIR) for registry membership
//!
//! This module defines the Algebraic Intermediate Representation (AIR) for
//! the path-shape part of a membership proof: one trace row per tree level,
//! carrying the direction bit taken at that level.
//!
//! The circuit proves:
//! - Every direction bit is boolean
//! - Directions only appear on active rows (row < depth)
//! - Active rows form a prefix of the trace
//! - The index accumulator is the little-endian integer of the directions
//!
//! SHA-256 node hashing and ECDSA verification are checked by the prover
//! outside the AIR. A verified proof does not attest to them.

use sha2::{Digest, Sha256};
use winter_crypto::{hashers::Blake3_256, DefaultRandomCoin, MerkleTree};
use winter_math::ToElements;
use winterfell::{
    math::{fields::f128::BaseElement, FieldElement},
    Air, AirContext, Assertion, BatchingMethod, EvaluationFrame, FieldExtension, ProofOptions,
    TraceInfo, TransitionConstraintDegree,
};

use super::types::{CircuitSpec, PublicInputs};

/// Hash function for trace and constraint commitments
pub type MembershipHasher = Blake3_256<BaseElement>;

/// Fiat-Shamir coin seeded with the proof context and public inputs
pub type MembershipCoin = DefaultRandomCoin<MembershipHasher>;

/// Vector commitment over LDE rows
pub type MembershipCommitment = MerkleTree<MembershipHasher>;

/// Domain tag for the circuit binding hash
const CIRCUIT_DOMAIN: &[u8] = b"sigmoji-membership-circuit";

pub const TRACE_WIDTH: usize = 4;

/// Number of transition constraints
pub const NUM_CONSTRAINTS: usize = 6;

/// Minimum trace length accepted by winterfell
pub const MIN_TRACE_LENGTH: usize = 8;

/// Column indices
pub mod columns {
    pub const DIRECTION: usize = 0;
    pub const POWER: usize = 1;
    pub const INDEX_ACC: usize = 2;
    pub const ACTIVE: usize = 3;
}

/// Trace length for a tree of `depth` levels (always leaves a padding row)
pub fn trace_length_for_depth(depth: usize) -> usize {
    (depth + 1).next_power_of_two().max(MIN_TRACE_LENGTH)
}

/// Proof options shared by prover and verifier
pub fn proof_options() -> ProofOptions {
    ProofOptions::new(
        32, // number of queries
        8,  // blowup factor
        0,  // grinding factor
        FieldExtension::None,
        4,  // FRI folding factor
        31, // FRI max remainder degree (must be 2^n - 1)
        BatchingMethod::Linear,
        BatchingMethod::Linear,
    )
}

/// The AIR for membership path verification
///
/// Execution trace layout (4 columns):
/// - Column 0: direction bit at this level (0 on padding rows)
/// - Column 1: 2^row
/// - Column 2: index accumulator (sum of direction bits below this row)
/// - Column 3: active flag (1 while row < depth)
pub struct MembershipAir {
    context: AirContext<BaseElement>,
    pub_inputs: MembershipPublicInputs,
}

impl Air for MembershipAir {
    type BaseField = BaseElement;
    type PublicInputs = MembershipPublicInputs;

    fn new(trace_info: TraceInfo, pub_inputs: Self::PublicInputs, options: ProofOptions) -> Self {
        let degrees = vec![
            TransitionConstraintDegree::new(2), // direction is boolean
            TransitionConstraintDegree::new(1), // power doubles
            TransitionConstraintDegree::new(2), // index accumulation
            TransitionConstraintDegree::new(2), // active is boolean
            TransitionConstraintDegree::new(2), // active never restarts
            TransitionConstraintDegree::new(2), // no direction on padding rows
        ];

        let context = AirContext::new(trace_info, degrees, 3, options);
        Self {
            context,
            pub_inputs,
        }
    }

    fn context(&self) -> &AirContext<Self::BaseField> {
        &self.context
    }

    fn evaluate_transition<E: FieldElement<BaseField = Self::BaseField>>(
        &self,
        frame: &EvaluationFrame<E>,
        _periodic_values: &[E],
        result: &mut [E],
    ) {
        use columns::*;

        let current = frame.current();
        let next = frame.next();
        let two = E::ONE + E::ONE;

        let direction = current[DIRECTION];
        let active = current[ACTIVE];

        // Constraint 0: direction * (direction - 1) = 0
        result[0] = direction * (direction - E::ONE);

        // Constraint 1: power_next = 2 * power
        result[1] = next[POWER] - two * current[POWER];

        // Constraint 2: acc_next = acc + direction * power
        result[2] = next[INDEX_ACC] - (current[INDEX_ACC] + direction * current[POWER]);

        // Constraint 3: active * (active - 1) = 0
        result[3] = active * (active - E::ONE);

        // Constraint 4: once inactive, stays inactive
        result[4] = next[ACTIVE] * (E::ONE - active);

        // Constraint 5: padding rows carry no direction
        result[5] = direction * (E::ONE - active);
    }

    fn get_assertions(&self) -> Vec<Assertion<Self::BaseField>> {
        let last_step = self.trace_length() - 1;

        vec![
            Assertion::single(columns::POWER, 0, BaseElement::ONE),
            Assertion::single(columns::INDEX_ACC, 0, BaseElement::ZERO),
            Assertion::single(columns::ACTIVE, last_step, BaseElement::ZERO),
        ]
    }
}

impl MembershipAir {
    /// Get the trace length
    pub fn trace_length(&self) -> usize {
        self.context.trace_len()
    }

    pub fn public_inputs(&self) -> &MembershipPublicInputs {
        &self.pub_inputs
    }
}

/// Public inputs for the membership AIR
///
/// Circuit tag, root, digest and nonce are folded into field elements 15
/// bytes at a time so every limb is below the f128 modulus. winterfell seeds
/// its Fiat-Shamir coin with these elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipPublicInputs {
    pub circuit: [u8; 32],
    pub root: [u8; 32],
    pub digest: [u8; 32],
    pub nonce_hash: [u8; 32],
}

impl MembershipPublicInputs {
    pub fn new(circuit: &CircuitSpec, public_inputs: &PublicInputs) -> Self {
        Self {
            circuit: circuit_tag(circuit),
            root: public_inputs.root,
            digest: public_inputs.digest,
            nonce_hash: Sha256::digest(&public_inputs.nonce).into(),
        }
    }
}

/// Hash of the circuit id and version
pub fn circuit_tag(circuit: &CircuitSpec) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(CIRCUIT_DOMAIN);
    hasher.update((circuit.id.len() as u64).to_le_bytes());
    hasher.update(circuit.id.as_bytes());
    hasher.update([circuit.version]);
    hasher.finalize().into()
}

/// Split bytes into field elements of at most 15 bytes each
pub fn bytes_to_limbs(bytes: &[u8]) -> Vec<BaseElement> {
    bytes
        .chunks(15)
        .map(|chunk| {
            let mut buf = [0u8; 16];
            buf[..chunk.len()].copy_from_slice(chunk);
            BaseElement::new(u128::from_le_bytes(buf))
        })
        .collect()
}

impl ToElements<BaseElement> for MembershipPublicInputs {
    fn to_elements(&self) -> Vec<BaseElement> {
        let mut elements = bytes_to_limbs(&self.circuit);
        elements.extend(bytes_to_limbs(&self.root));
        elements.extend(bytes_to_limbs(&self.digest));
        elements.extend(bytes_to_limbs(&self.nonce_hash));
        elements
    }
}

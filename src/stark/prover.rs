//! STARK prover for registry membership
//!
//! Every witness constraint the circuit names is checked natively before any
//! bytes are produced: the signature against the leaf key, the path against
//! the root, the directions against the leaf index and the digest against
//! the nonce. The path shape is then laid out as a winterfell execution
//! trace, checked against `MembershipAir`, and proven with winterfell.
//!
//! Only the AIR is proven. The node hashes and the signature stay native
//! prover checks; a verifier learns that some well-formed path shape was
//! proven for these public inputs. winterfell 0.12 does not blind the trace,
//! so queried evaluations are not hiding.

use super::{
    circuit::{
        columns, proof_options, trace_length_for_depth, MembershipAir, MembershipCoin,
        MembershipCommitment, MembershipHasher, MembershipPublicInputs, NUM_CONSTRAINTS,
        TRACE_WIDTH,
    },
    types::{CircuitSpec, PrivateWitness, ProofError, PublicInputs},
};
use crate::crypto::{attest_digest, verify_card_signature};
use winter_math::FieldElement;
use winterfell::{
    math::fields::f128::BaseElement, matrix::ColMatrix, Air, AuxRandElements, CompositionPoly,
    CompositionPolyTrace, ConstraintCompositionCoefficients, DefaultConstraintCommitment,
    DefaultConstraintEvaluator, DefaultTraceLde, EvaluationFrame, PartitionOptions, ProofOptions,
    Prover, StarkDomain, TraceInfo, TracePolyTable, TraceTable,
};

/// Leading bytes of every proof
pub const PROOF_MAGIC: &[u8; 4] = b"SGMJ";

/// Proof byte layout version
pub const PROOF_FORMAT_VERSION: u8 = 2;

/// Header: magic, format version
pub(crate) const HEADER_LEN: usize = 4 + 1;

pub(crate) type TraceRow = [BaseElement; TRACE_WIDTH];

/// winterfell prover for one membership statement
struct MembershipProver {
    options: ProofOptions,
    pub_inputs: MembershipPublicInputs,
}

impl Prover for MembershipProver {
    type BaseField = BaseElement;
    type Air = MembershipAir;
    type Trace = TraceTable<BaseElement>;
    type HashFn = MembershipHasher;
    type VC = MembershipCommitment;
    type RandomCoin = MembershipCoin;
    type TraceLde<E: FieldElement<BaseField = Self::BaseField>> =
        DefaultTraceLde<E, Self::HashFn, Self::VC>;
    type ConstraintCommitment<E: FieldElement<BaseField = Self::BaseField>> =
        DefaultConstraintCommitment<E, Self::HashFn, Self::VC>;
    type ConstraintEvaluator<'a, E: FieldElement<BaseField = Self::BaseField>> =
        DefaultConstraintEvaluator<'a, Self::Air, E>;

    // Public inputs are not derivable from the trace; the leaf stays private
    fn get_pub_inputs(&self, _trace: &Self::Trace) -> MembershipPublicInputs {
        self.pub_inputs.clone()
    }

    fn options(&self) -> &ProofOptions {
        &self.options
    }

    fn new_trace_lde<E: FieldElement<BaseField = Self::BaseField>>(
        &self,
        trace_info: &TraceInfo,
        main_trace: &ColMatrix<Self::BaseField>,
        domain: &StarkDomain<Self::BaseField>,
        partition_option: PartitionOptions,
    ) -> (Self::TraceLde<E>, TracePolyTable<E>) {
        DefaultTraceLde::new(trace_info, main_trace, domain, partition_option)
    }

    fn build_constraint_commitment<E: FieldElement<BaseField = Self::BaseField>>(
        &self,
        composition_poly_trace: CompositionPolyTrace<E>,
        num_constraint_composition_columns: usize,
        domain: &StarkDomain<Self::BaseField>,
        partition_options: PartitionOptions,
    ) -> (Self::ConstraintCommitment<E>, CompositionPoly<E>) {
        DefaultConstraintCommitment::new(
            composition_poly_trace,
            num_constraint_composition_columns,
            domain,
            partition_options,
        )
    }

    fn new_evaluator<'a, E: FieldElement<BaseField = Self::BaseField>>(
        &self,
        air: &'a Self::Air,
        aux_rand_elements: Option<AuxRandElements<E>>,
        composition_coefficients: ConstraintCompositionCoefficients<E>,
    ) -> Self::ConstraintEvaluator<'a, E> {
        DefaultConstraintEvaluator::new(air, aux_rand_elements, composition_coefficients)
    }
}

/// Generate membership proof bytes
///
/// Layout: magic, format version, then a serialized winterfell `Proof`.
///
/// # Errors
/// `UnsatisfiedWitness` if any constraint fails; no bytes are produced.
pub fn prove_membership(
    circuit: &CircuitSpec,
    public_inputs: &PublicInputs,
    witness: &PrivateWitness,
) -> Result<Vec<u8>, ProofError> {
    check_witness(circuit, public_inputs, witness)?;

    let trace = build_execution_trace(witness);
    let pub_inputs = MembershipPublicInputs::new(circuit, public_inputs);

    let trace_info = TraceInfo::new(TRACE_WIDTH, trace.len());
    let air = MembershipAir::new(trace_info, pub_inputs.clone(), proof_options());
    check_trace(&air, &trace)?;

    if trace[trace.len() - 1][columns::INDEX_ACC] != BaseElement::new(witness.leaf_index as u128)
    {
        return Err(ProofError::UnsatisfiedWitness(
            "trace index accumulator does not reach the leaf index".to_string(),
        ));
    }

    let prover = MembershipProver {
        options: proof_options(),
        pub_inputs,
    };
    let proof = prover
        .prove(trace_table(&trace))
        .map_err(|e| ProofError::UnsatisfiedWitness(format!("STARK prover failed: {}", e)))?;

    let body = proof.to_bytes();
    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(PROOF_MAGIC);
    bytes.push(PROOF_FORMAT_VERSION);
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Native checks of everything outside the AIR
fn check_witness(
    circuit: &CircuitSpec,
    public_inputs: &PublicInputs,
    witness: &PrivateWitness,
) -> Result<(), ProofError> {
    if witness.depth() > circuit.max_depth {
        return Err(ProofError::UnsatisfiedWitness(format!(
            "tree depth {} exceeds circuit maximum {}",
            witness.depth(),
            circuit.max_depth
        )));
    }

    if witness.siblings.len() != witness.directions.len() {
        return Err(ProofError::UnsatisfiedWitness(format!(
            "{} siblings but {} directions",
            witness.siblings.len(),
            witness.directions.len()
        )));
    }

    let membership = witness.membership()?;

    if membership.index_from_directions() != Some(membership.leaf_index) {
        return Err(ProofError::UnsatisfiedWitness(
            "directions do not encode the leaf index".to_string(),
        ));
    }

    if membership.compute_root() != public_inputs.root {
        return Err(ProofError::UnsatisfiedWitness(
            "authentication path does not reach the root".to_string(),
        ));
    }

    if attest_digest(&public_inputs.nonce) != public_inputs.digest {
        return Err(ProofError::UnsatisfiedWitness(
            "digest is not the attest digest of the nonce".to_string(),
        ));
    }

    if !verify_card_signature(
        &membership.leaf_value,
        &public_inputs.digest,
        &witness.signature,
    ) {
        return Err(ProofError::UnsatisfiedWitness(
            "signature does not verify against the leaf key".to_string(),
        ));
    }

    Ok(())
}

/// Build execution trace from the membership path
///
/// Row `i < depth` holds the direction taken at level `i`; padding rows
/// carry the finished index with no direction.
fn build_execution_trace(witness: &PrivateWitness) -> Vec<TraceRow> {
    let depth = witness.depth();
    let trace_len = trace_length_for_depth(depth);

    let mut trace = Vec::with_capacity(trace_len);
    let mut power = BaseElement::ONE;
    let mut acc = BaseElement::ZERO;

    for step in 0..trace_len {
        let active = step < depth;
        let direction = active && witness.directions[step];

        trace.push([
            BaseElement::new(direction as u128),
            power,
            acc,
            BaseElement::new(active as u128),
        ]);

        if direction {
            acc += power;
        }
        power = power.double();
    }

    trace
}

/// Column-major winterfell trace from rows
fn trace_table(trace: &[TraceRow]) -> TraceTable<BaseElement> {
    let columns = (0..TRACE_WIDTH)
        .map(|column| trace.iter().map(|row| row[column]).collect())
        .collect();
    TraceTable::init(columns)
}

/// Evaluate every transition and assertion of the AIR over the trace
fn check_trace(air: &MembershipAir, trace: &[TraceRow]) -> Result<(), ProofError> {
    let mut result = vec![BaseElement::ZERO; NUM_CONSTRAINTS];

    for (step, rows) in trace.windows(2).enumerate() {
        let frame = EvaluationFrame::from_rows(rows[0].to_vec(), rows[1].to_vec());
        air.evaluate_transition(&frame, &[], &mut result);

        if let Some(index) = result.iter().position(|value| *value != BaseElement::ZERO) {
            return Err(ProofError::UnsatisfiedWitness(format!(
                "transition constraint {} fails at step {}",
                index, step
            )));
        }
    }

    for assertion in air.get_assertions() {
        let step = assertion.first_step();
        let expected = assertion.values()[0];
        if trace[step][assertion.column()] != expected {
            return Err(ProofError::UnsatisfiedWitness(format!(
                "assertion on column {} fails at step {}",
                assertion.column(),
                step
            )));
        }
    }

    Ok(())
}

//! STARK verifier for registry membership

use super::{
    circuit::{
        proof_options, trace_length_for_depth, MembershipAir, MembershipCoin,
        MembershipCommitment, MembershipHasher, MembershipPublicInputs, MIN_TRACE_LENGTH,
        TRACE_WIDTH,
    },
    prover::{HEADER_LEN, PROOF_FORMAT_VERSION, PROOF_MAGIC},
    types::{CircuitSpec, ProofError, PublicInputs},
};
use crate::crypto::attest_digest;
use winter_math::StarkField;
use winter_utils::Serializable;
use winterfell::{math::fields::f128::BaseElement, AcceptableOptions, Proof};

/// Serialized `TraceInfo` with no auxiliary segment and no metadata
const TRACE_INFO_LEN: usize = 6;

/// Verify membership proof bytes against their public inputs
///
/// Checks that the digest is the attest digest of the nonce, that the trace
/// shape fits the circuit, and then runs the winterfell verifier. Public
/// inputs seed the Fiat-Shamir transcript, so a proof made for any other
/// circuit, root, digest or nonce fails verification.
pub fn verify_membership(
    circuit: &CircuitSpec,
    public_inputs: &PublicInputs,
    proof_bytes: &[u8],
) -> Result<(), ProofError> {
    if attest_digest(&public_inputs.nonce) != public_inputs.digest {
        return Err(ProofError::InvalidProof(
            "digest is not the attest digest of the nonce".to_string(),
        ));
    }

    if proof_bytes.len() <= HEADER_LEN {
        return Err(ProofError::InvalidProof(format!(
            "proof is {} bytes, too short",
            proof_bytes.len()
        )));
    }

    if &proof_bytes[..4] != PROOF_MAGIC {
        return Err(ProofError::InvalidProof("bad magic".to_string()));
    }

    if proof_bytes[4] != PROOF_FORMAT_VERSION {
        return Err(ProofError::InvalidProof(format!(
            "unsupported proof format version {}",
            proof_bytes[4]
        )));
    }

    let body = &proof_bytes[HEADER_LEN..];
    check_context(body, trace_length_for_depth(circuit.max_depth))?;

    let proof = Proof::from_bytes(body)
        .map_err(|e| ProofError::InvalidProof(format!("malformed STARK proof: {}", e)))?;

    let acceptable = AcceptableOptions::OptionSet(vec![proof_options()]);
    winterfell::verify::<MembershipAir, MembershipHasher, MembershipCoin, MembershipCommitment>(
        proof,
        MembershipPublicInputs::new(circuit, public_inputs),
        &acceptable,
    )
    .map_err(|e| ProofError::InvalidProof(format!("STARK verification failed: {}", e)))
}

/// Check the proof context prefix before handing bytes to winterfell
///
/// winterfell 0.12 asserts on out-of-range options and trace lengths while
/// deserializing, so the prefix must match the one accepted shape exactly:
/// trace info for this AIR, the f128 modulus, then `proof_options()`.
fn check_context(body: &[u8], max_trace_len: usize) -> Result<(), ProofError> {
    let modulus = BaseElement::get_modulus_le_bytes();
    let options = proof_options().to_bytes();
    let modulus_at = TRACE_INFO_LEN + 1;
    let options_at = modulus_at + modulus.len();
    let prefix_len = options_at + options.len();

    if body.len() < prefix_len {
        return Err(ProofError::InvalidProof(format!(
            "proof is {} bytes, too short",
            body.len()
        )));
    }

    if body[0] as usize != TRACE_WIDTH || body[1] != 0 || body[2] != 0 {
        return Err(ProofError::InvalidProof(format!(
            "trace width {} not accepted by circuit",
            body[0] as usize + body[1] as usize
        )));
    }

    let log_len = u32::from(body[3]);
    if log_len < MIN_TRACE_LENGTH.ilog2() || log_len > max_trace_len.ilog2() {
        return Err(ProofError::InvalidProof(format!(
            "trace length 2^{} not accepted by circuit",
            log_len
        )));
    }

    if body[4..TRACE_INFO_LEN] != [0, 0] {
        return Err(ProofError::InvalidProof("unexpected trace metadata".to_string()));
    }

    if body[TRACE_INFO_LEN] as usize != modulus.len() || body[modulus_at..options_at] != modulus[..]
    {
        return Err(ProofError::InvalidProof("proof is over another field".to_string()));
    }

    if body[options_at..prefix_len] != options[..] {
        return Err(ProofError::InvalidProof(
            "proof options not accepted by circuit".to_string(),
        ));
    }

    Ok(())
}

//! Property-based tests for membership proofs
//!
//! Tests for:
//! - Completeness: Every registered card proves and verifies
//! - Soundness: Tampered roots, siblings or signatures never produce a
//!   verifying proof
//! - Determinism: Same witness produces the same proof

use super::{
    prove_membership,
    prover::tests::{fixture, signed_nonce},
    types::{CircuitSpec, ProofError},
    verify_membership,
};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property test: Completeness
    /// For every member of every fleet size, proving succeeds and verifies
    #[test]
    fn prop_completeness(
        count in 1u8..24,
        pick in any::<u8>(),
        nonce in prop::collection::vec(any::<u8>(), 0..48),
    ) {
        let id = pick % count + 1;
        let (inputs, witness) = fixture(count, id, &nonce);
        let circuit = CircuitSpec::default();

        let proof = prove_membership(&circuit, &inputs, &witness);
        prop_assert!(proof.is_ok(), "Proof generation failed for valid witness");

        let proof = proof.unwrap();
        prop_assert!(verify_membership(&circuit, &inputs, &proof).is_ok());
    }

    /// Property test: Soundness (tampered root)
    #[test]
    fn prop_soundness_tampered_root(
        count in 2u8..16,
        pick in any::<u8>(),
        byte in 0usize..32,
        mask in 1u8..=255,
    ) {
        let id = pick % count + 1;
        let (mut inputs, witness) = fixture(count, id, b"sound");
        let circuit = CircuitSpec::default();
        let proof = prove_membership(&circuit, &inputs, &witness).unwrap();

        inputs.root[byte] ^= mask;
        prop_assert!(verify_membership(&circuit, &inputs, &proof).is_err());

        let result = prove_membership(&circuit, &inputs, &witness);
        prop_assert!(matches!(result, Err(ProofError::UnsatisfiedWitness(_))));
    }

    /// Property test: Soundness (tampered sibling)
    #[test]
    fn prop_soundness_tampered_sibling(
        count in 2u8..16,
        pick in any::<u8>(),
        level in any::<usize>(),
        mask in 1u8..=255,
    ) {
        let id = pick % count + 1;
        let (inputs, mut witness) = fixture(count, id, b"sound");
        let level = level % witness.siblings.len();
        witness.siblings[level][0] ^= mask;

        let result = prove_membership(&CircuitSpec::default(), &inputs, &witness);
        prop_assert!(matches!(result, Err(ProofError::UnsatisfiedWitness(_))));
    }

    /// Property test: Soundness (signature by another card)
    #[test]
    fn prop_soundness_foreign_signature(
        count in 2u8..16,
        pick in any::<u8>(),
        offset in 1u8..100,
    ) {
        let id = pick % count + 1;
        let (inputs, mut witness) = fixture(count, id, b"sound");
        witness.signature = signed_nonce(id.wrapping_add(offset).max(1), b"sound").signature;

        let result = prove_membership(&CircuitSpec::default(), &inputs, &witness);
        prop_assert!(matches!(result, Err(ProofError::UnsatisfiedWitness(_))));
    }

    /// Property test: Determinism
    #[test]
    fn prop_determinism(
        count in 1u8..16,
        pick in any::<u8>(),
        nonce in prop::collection::vec(any::<u8>(), 1..32),
    ) {
        let id = pick % count + 1;
        let (inputs, witness) = fixture(count, id, &nonce);
        let circuit = CircuitSpec::default();

        let proof1 = prove_membership(&circuit, &inputs, &witness).unwrap();
        let proof2 = prove_membership(&circuit, &inputs, &witness).unwrap();
        prop_assert_eq!(proof1, proof2, "Same witness should produce identical proofs");
    }
}

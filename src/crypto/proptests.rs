//! Property-based tests for key recovery
//!
//! Tests for:
//! - Completeness: the signer's key is always one of the two candidates
//! - Order stability: recovery order depends only on its inputs

use super::{attest_digest, recover, CardPublicKey};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use proptest::prelude::*;

fn signer_from(secret: [u8; 32]) -> Option<SigningKey> {
    SigningKey::from_slice(&secret).ok()
}

proptest! {
    /// Property test: Completeness
    /// For all keys and nonces, recovery returns two candidates containing the signer
    #[test]
    fn prop_signer_is_candidate(
        secret in any::<[u8; 32]>(),
        nonce in proptest::collection::vec(any::<u8>(), 1..64),
    ) {
        // Skip secrets outside the scalar range (zero or >= n)
        let Some(signer) = signer_from(secret) else {
            return Ok(());
        };
        let expected = CardPublicKey::from_verifying_key(signer.verifying_key());
        let digest = attest_digest(&nonce);
        let signature: Signature = signer.sign_prehash(&digest).unwrap();

        let candidates = recover(&digest, signature.to_der().as_bytes()).unwrap();
        prop_assert!(candidates.contains(&expected), "Signer key must be a recovery candidate");

        let (a, b) = candidates.pair();
        prop_assert_ne!(a, b);
    }

    /// Property test: Determinism
    /// Recovering twice yields the same ordered pair
    #[test]
    fn prop_recovery_is_deterministic(
        secret in any::<[u8; 32]>(),
        nonce in proptest::collection::vec(any::<u8>(), 1..32),
    ) {
        let Some(signer) = signer_from(secret) else {
            return Ok(());
        };
        let digest = attest_digest(&nonce);
        let signature: Signature = signer.sign_prehash(&digest).unwrap();

        let first = recover(&digest, &signature.to_bytes()).unwrap();
        let second = recover(&digest, &signature.to_bytes()).unwrap();
        prop_assert_eq!(first, second);
    }
}

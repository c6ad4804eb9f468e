//! Signed nonces returned by a card tap
//!
//! On `sign_random` the card signs
//! `SHA-256(0x19 || "Attest counter pk2:\n" || nonce)`. The prefix must be
//! reproduced byte-for-byte or every recovered key is wrong.

use super::hex_serde;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Domain separation prefix for the card's attest counter signature
pub const ATTEST_PREFIX: &[u8] = b"\x19Attest counter pk2:\n";

/// Digest the card signs over a raw nonce
pub fn attest_digest(nonce: &[u8]) -> [u8; 32] {
    Sha256::new()
        .chain_update(ATTEST_PREFIX)
        .chain_update(nonce)
        .finalize()
        .into()
}

/// One tap's output: nonce, its attest digest, and the card's signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedNonce {
    /// Raw message bytes the card signed
    #[serde(with = "hex_serde")]
    pub nonce: Vec<u8>,

    /// `attest_digest(nonce)`
    #[serde(with = "hex_serde")]
    pub digest: [u8; 32],

    /// DER or compact `r || s` signature bytes as returned by the card
    #[serde(with = "hex_serde")]
    pub signature: Vec<u8>,
}

impl SignedNonce {
    /// Build from the raw nonce; the digest is always recomputed locally.
    pub fn from_nonce(nonce: Vec<u8>, signature: Vec<u8>) -> Self {
        let digest = attest_digest(&nonce);
        Self {
            nonce,
            digest,
            signature,
        }
    }

    /// Check that `digest` is the attest digest of `nonce`
    pub fn is_consistent(&self) -> bool {
        attest_digest(&self.nonce) == self.digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_bytes() {
        assert_eq!(ATTEST_PREFIX[0], 0x19);
        assert_eq!(&ATTEST_PREFIX[1..], b"Attest counter pk2:\n");
        assert_eq!(ATTEST_PREFIX.len(), 21);
    }

    #[test]
    fn test_attest_digest_matches_manual_concatenation() {
        let nonce = hex::decode("0000002a5f3c").unwrap();
        let mut buf = vec![0x19];
        buf.extend_from_slice(b"Attest counter pk2:\n");
        buf.extend_from_slice(&nonce);
        let expected: [u8; 32] = Sha256::digest(&buf).into();

        assert_eq!(attest_digest(&nonce), expected);
    }

    #[test]
    fn test_signed_nonce_consistency() {
        let mut signed = SignedNonce::from_nonce(vec![1, 2, 3], vec![0u8; 64]);
        assert!(signed.is_consistent());

        signed.nonce.push(4);
        assert!(!signed.is_consistent());
    }

    #[test]
    fn test_signed_nonce_json_is_hex() {
        let signed = SignedNonce::from_nonce(vec![0xab, 0xcd], vec![0x01]);
        let json = serde_json::to_value(&signed).unwrap();
        assert_eq!(json["nonce"], "abcd");
        assert_eq!(json["signature"], "01");

        let parsed: SignedNonce = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, signed);
    }
}

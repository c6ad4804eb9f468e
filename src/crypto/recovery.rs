//! secp256k1 public key recovery without a recovery bit
//!
//! The secure element returns only `{nonce, digest, signature}`. Without the
//! recovery bit, ECDSA recovery yields two points (one per parity of the
//! nonce point R). Both are returned in a fixed order, even parity first, and
//! the caller disambiguates against the registry.
//!
//! High-S signatures are normalised to low-S before recovery. Negating `s`
//! swaps which parity recovers which point, so the candidate set is unchanged.

use super::key::CardPublicKey;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use std::fmt;
use thiserror::Error;

/// Required digest length (SHA-256 output)
pub const DIGEST_LEN: usize = 32;

/// Key recovery errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecoveryError {
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Invalid curve point: {0}")]
    InvalidCurvePoint(String),
}

/// Parity of the nonce point's y coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    pub fn is_odd(self) -> bool {
        matches!(self, Parity::Odd)
    }

    /// Recovery id byte (0 or 1)
    pub fn recovery_byte(self) -> u8 {
        self.is_odd() as u8
    }

    /// Ethereum-style `v` value (27 or 28)
    pub fn v(self) -> u8 {
        27 + self.recovery_byte()
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parity::Even => write!(f, "even"),
            Parity::Odd => write!(f, "odd"),
        }
    }
}

/// The two keys consistent with one (digest, signature) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveredKeyCandidates {
    even: CardPublicKey,
    odd: CardPublicKey,
}

impl RecoveredKeyCandidates {
    /// Candidates in recovery order: (even parity, odd parity)
    pub fn pair(&self) -> (&CardPublicKey, &CardPublicKey) {
        (&self.even, &self.odd)
    }

    pub fn get(&self, parity: Parity) -> &CardPublicKey {
        match parity {
            Parity::Even => &self.even,
            Parity::Odd => &self.odd,
        }
    }

    pub fn contains(&self, key: &CardPublicKey) -> bool {
        self.parity_of(key).is_some()
    }

    /// Which parity recovered `key`, if either did
    pub fn parity_of(&self, key: &CardPublicKey) -> Option<Parity> {
        if &self.even == key {
            Some(Parity::Even)
        } else if &self.odd == key {
            Some(Parity::Odd)
        } else {
            None
        }
    }
}

/// Decode a card signature: DER first, compact `r || s` for 64-byte input.
///
/// The result is always low-S.
pub fn parse_signature(bytes: &[u8]) -> Result<Signature, RecoveryError> {
    let signature = Signature::from_der(bytes).or_else(|der_err| {
        if bytes.len() == 64 {
            Signature::from_slice(bytes)
        } else {
            Err(der_err)
        }
    });
    let signature =
        signature.map_err(|e| RecoveryError::MalformedSignature(format!("{}", e)))?;

    Ok(signature.normalize_s().unwrap_or(signature))
}

/// Split a card signature into its low-S `(r, s)` scalars
pub fn signature_scalars(bytes: &[u8]) -> Result<([u8; 32], [u8; 32]), RecoveryError> {
    let signature = parse_signature(bytes)?;
    let (r, s) = signature.split_bytes();
    Ok((r.into(), s.into()))
}

/// Recover both candidate public keys for `signature` over `digest`.
pub fn recover(digest: &[u8], signature: &[u8]) -> Result<RecoveredKeyCandidates, RecoveryError> {
    if digest.len() != DIGEST_LEN {
        return Err(RecoveryError::MalformedSignature(format!(
            "digest must be {} bytes, got {}",
            DIGEST_LEN,
            digest.len()
        )));
    }

    let signature = parse_signature(signature)?;

    Ok(RecoveredKeyCandidates {
        even: recover_with_parity(digest, &signature, Parity::Even)?,
        odd: recover_with_parity(digest, &signature, Parity::Odd)?,
    })
}

fn recover_with_parity(
    digest: &[u8],
    signature: &Signature,
    parity: Parity,
) -> Result<CardPublicKey, RecoveryError> {
    let recovery_id = RecoveryId::new(parity.is_odd(), false);
    let key = VerifyingKey::recover_from_prehash(digest, signature, recovery_id).map_err(|_| {
        RecoveryError::InvalidCurvePoint(format!(
            "signature r value has no {} parity point on secp256k1",
            parity
        ))
    })?;
    Ok(CardPublicKey::from_verifying_key(&key))
}

/// Parity under which `signature` over `digest` recovers `key`.
pub fn recovery_parity(
    key: &CardPublicKey,
    digest: &[u8],
    signature: &[u8],
) -> Result<Option<Parity>, RecoveryError> {
    Ok(recover(digest, signature)?.parity_of(key))
}

/// Check a card signature over a prehashed digest.
///
/// Returns `false` for malformed input rather than an error; callers that
/// need to distinguish use [`recover`].
pub fn verify_card_signature(key: &CardPublicKey, digest: &[u8], signature: &[u8]) -> bool {
    let Ok(signature) = parse_signature(signature) else {
        return false;
    };
    let Ok(verifying_key) = key.verifying_key() else {
        return false;
    };
    verifying_key.verify_prehash(digest, &signature).is_ok()
}

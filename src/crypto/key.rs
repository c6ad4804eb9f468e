//! Card public keys
//!
//! Cards publish their secondary signing key as an uncompressed SEC1 point
//! ("raw" form, `04 || x || y`). Recovery naturally yields points too, so
//! every key is normalised to the 33-byte compressed encoding on
//! construction. Two encodings of the same point therefore compare equal, and
//! hex comparison is case-insensitive because decoding accepts both cases.

use super::recovery::RecoveryError;
use k256::ecdsa::VerifyingKey;
use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of a compressed SEC1 secp256k1 point.
pub const COMPRESSED_LEN: usize = 33;

/// A provisioned card's secondary public key (compressed SEC1)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CardPublicKey([u8; COMPRESSED_LEN]);

impl CardPublicKey {
    /// Parse a SEC1 point (compressed or uncompressed).
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, RecoveryError> {
        let key = VerifyingKey::from_sec1_bytes(bytes).map_err(|_| {
            RecoveryError::InvalidCurvePoint(format!(
                "{} bytes do not encode a secp256k1 point",
                bytes.len()
            ))
        })?;
        Ok(Self::from_verifying_key(&key))
    }

    /// Parse a hex-encoded SEC1 point (optional `0x` prefix, any case).
    pub fn from_hex(value: &str) -> Result<Self, RecoveryError> {
        let bytes = super::decode_hex(value)
            .map_err(|e| RecoveryError::InvalidCurvePoint(format!("invalid key hex: {}", e)))?;
        Self::from_sec1_bytes(&bytes)
    }

    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(true);
        let mut bytes = [0u8; COMPRESSED_LEN];
        bytes.copy_from_slice(point.as_bytes());
        Self(bytes)
    }

    /// Compressed SEC1 bytes
    pub fn as_bytes(&self) -> &[u8; COMPRESSED_LEN] {
        &self.0
    }

    /// ECDSA verifying key for this point
    pub fn verifying_key(&self) -> Result<VerifyingKey, RecoveryError> {
        VerifyingKey::from_sec1_bytes(&self.0)
            .map_err(|_| RecoveryError::InvalidCurvePoint("stored key is not on curve".into()))
    }

    /// Lowercase hex of the compressed encoding
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Lowercase hex of the uncompressed ("raw") encoding used by card exports
    pub fn to_uncompressed_hex(&self) -> Result<String, RecoveryError> {
        let key = self.verifying_key()?;
        Ok(hex::encode(key.to_encoded_point(false).as_bytes()))
    }

    /// Compare against a hex-encoded key in either encoding and either case.
    pub fn matches_hex(&self, other: &str) -> bool {
        Self::from_hex(other).map(|k| k == *self).unwrap_or(false)
    }
}

impl fmt::Display for CardPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for CardPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CardPublicKey({})", self.to_hex())
    }
}

impl FromStr for CardPublicKey {
    type Err = RecoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for CardPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CardPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(D::Error::custom)
    }
}

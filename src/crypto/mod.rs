/// Card signature primitives
///
/// This module implements:
/// - The domain-separated attest digest the card signs on `sign_random`
/// - secp256k1 public key recovery without a recovery bit
/// - The normalised `CardPublicKey` type shared by registry and tree
pub mod key;
pub mod nonce;
pub mod recovery;

#[cfg(test)]
mod proptests;

pub use key::CardPublicKey;
pub use nonce::{attest_digest, SignedNonce, ATTEST_PREFIX};
pub use recovery::{
    recover, recovery_parity, verify_card_signature, Parity, RecoveredKeyCandidates, RecoveryError, DIGEST_LEN,
};

/// Decode a hex string as produced by the card transport.
///
/// Accepts an optional `0x` prefix and either letter case.
pub fn decode_hex(value: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let trimmed = value.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    hex::decode(trimmed)
}

/// Serde adapter encoding byte fields as lowercase hex strings.
///
/// Used for every byte field that crosses JSON or CBOR boundaries so proof
/// files stay readable and fixed-size arrays above 32 bytes stay serializable.
pub mod hex_serde {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: hex::FromHex,
        <T as hex::FromHex>::Error: std::fmt::Display,
    {
        let s = String::deserialize(deserializer)?;
        let trimmed = s.strip_prefix("0x").unwrap_or(&s);
        T::from_hex(trimmed).map_err(D::Error::custom)
    }
}

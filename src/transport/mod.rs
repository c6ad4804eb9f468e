//! NFC card transport abstraction
//!
//! The card itself is an external collaborator. This trait is the boundary:
//! a command goes in, the card's hex-encoded response (or an error) comes
//! out. Status updates while the phone waits for the tap are informational
//! and only logged.

pub mod mock;

pub use mock::{MockCardTransport, SimulatedCard};

use crate::crypto::{decode_hex, CardPublicKey, SignedNonce};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Key slot the card uses for `sign_random` attestations
pub const ATTEST_KEY_SLOT: u8 = 2;

/// Key slot the card uses for signing cardholder messages
pub const MESSAGE_KEY_SLOT: u8 = 1;

/// Command sent to the card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardCommand {
    pub name: String,
    #[serde(rename = "keyNo")]
    pub key_no: u8,
    /// Hex digest to sign, for `sign`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl CardCommand {
    /// Sign a card-generated random message on the attest key
    pub fn sign_random() -> Self {
        Self {
            name: "sign_random".to_string(),
            key_no: ATTEST_KEY_SLOT,
            digest: None,
        }
    }

    /// Sign a caller-supplied 32-byte digest on the message key
    pub fn sign_digest(digest: &[u8; 32]) -> Self {
        Self {
            name: "sign".to_string(),
            key_no: MESSAGE_KEY_SLOT,
            digest: Some(hex::encode(digest)),
        }
    }
}

/// Status updates while a tap is in progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapStatus {
    /// Waiting for the card to be held to the phone
    Init,
    /// Read failed, the card should be tapped again
    Retry,
    /// Card read, response is being post-processed
    Scanned,
    Other(String),
}

impl TapStatus {
    pub fn from_cause(cause: &str) -> Self {
        match cause {
            "init" => TapStatus::Init,
            "retry" => TapStatus::Retry,
            "scanned" => TapStatus::Scanned,
            other => TapStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TapStatus::Init => {
                write!(f, "Please tap the tag to the back of your smartphone and hold it...")
            }
            TapStatus::Retry => {
                write!(f, "Something went wrong, please try to tap the tag again...")
            }
            TapStatus::Scanned => {
                write!(f, "Tag scanned successfully, post-processing the result...")
            }
            TapStatus::Other(text) => write!(f, "{}", text),
        }
    }
}

/// Card response, hex-encoded as the card returns it
///
/// On `sign_random`, `digest` is the random message the card signed (under
/// the attest prefix) and `nonce` is its tap counter. On `sign`, `digest`
/// echoes the signed digest and `public_key` names the signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportResponse {
    pub nonce: String,
    pub digest: String,
    pub signature: String,
    #[serde(default, rename = "publicKey", skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

impl TransportResponse {
    /// Decode a `sign_random` response into a signed nonce
    pub fn into_signed_nonce(self) -> Result<SignedNonce, TransportError> {
        let nonce = decode_hex(&self.digest)
            .map_err(|e| TransportError::Failed(format!("bad digest hex: {}", e)))?;
        let signature = decode_hex(&self.signature)
            .map_err(|e| TransportError::Failed(format!("bad signature hex: {}", e)))?;
        Ok(SignedNonce::from_nonce(nonce, signature))
    }

    pub fn signature_bytes(&self) -> Result<Vec<u8>, TransportError> {
        decode_hex(&self.signature)
            .map_err(|e| TransportError::Failed(format!("bad signature hex: {}", e)))
    }

    /// Signing key reported by the card, if any
    pub fn reported_key(&self) -> Result<Option<CardPublicKey>, TransportError> {
        self.public_key
            .as_deref()
            .map(CardPublicKey::from_hex)
            .transpose()
            .map_err(|e| TransportError::Failed(format!("bad public key: {}", e)))
    }
}

/// Transport errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Card command failed: {0}")]
    Failed(String),

    #[error("Card did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Tap cancelled")]
    Cancelled,
}

/// Status callback handed to the transport for the duration of one command
pub type StatusCallback<'a> = &'a (dyn Fn(TapStatus) + Send + Sync);

/// Card transport abstraction
#[async_trait]
pub trait CardTransport: Send + Sync {
    /// Run one command against the card
    async fn execute(
        &self,
        command: &CardCommand,
        status: StatusCallback<'_>,
    ) -> Result<TransportResponse, TransportError>;
}

/// Status callback that only logs
pub fn log_status(status: TapStatus) {
    tracing::info!(status = %status, "tap status");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_names() {
        let json = serde_json::to_value(CardCommand::sign_random()).unwrap();
        assert_eq!(json, serde_json::json!({"name": "sign_random", "keyNo": 2}));

        let sign = CardCommand::sign_digest(&[0xab; 32]);
        assert_eq!(sign.name, "sign");
        assert_eq!(sign.key_no, 1);
        assert_eq!(sign.digest.as_deref(), Some("ab".repeat(32).as_str()));
    }

    #[test]
    fn test_status_from_cause() {
        assert_eq!(TapStatus::from_cause("init"), TapStatus::Init);
        assert_eq!(TapStatus::from_cause("retry"), TapStatus::Retry);
        assert_eq!(TapStatus::from_cause("scanned"), TapStatus::Scanned);
        assert_eq!(
            TapStatus::from_cause("NFC disabled"),
            TapStatus::Other("NFC disabled".to_string())
        );
    }

    #[test]
    fn test_response_digest_becomes_nonce() {
        let response = TransportResponse {
            nonce: "0000002a".to_string(),
            digest: "0xA1B2".to_string(),
            signature: "3006020101020101".to_string(),
            public_key: None,
        };
        let signed = response.into_signed_nonce().unwrap();
        assert_eq!(signed.nonce, vec![0xa1, 0xb2]);
        assert!(signed.is_consistent());
    }

    #[test]
    fn test_response_bad_hex_fails() {
        let response = TransportResponse {
            nonce: "00".to_string(),
            digest: "zz".to_string(),
            signature: "00".to_string(),
            public_key: None,
        };
        assert!(matches!(
            response.into_signed_nonce(),
            Err(TransportError::Failed(_))
        ));
    }
}

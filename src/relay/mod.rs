//! Message relay abstraction
//!
//! The relay is the only network surface: it accepts anonymous chat posts
//! carrying a membership proof, and cardholder posts carrying a raw
//! signature. Only an HTTP 200 counts as delivered.

pub mod http;
pub mod mock;

pub use http::HttpRelay;
pub use mock::MockRelay;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Anonymous post, proven by membership
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousChatMessage {
    pub message: String,
    /// Visual identity the message is posted under
    pub sigmoji: String,
    /// Hex CBOR of the membership proof
    #[serde(rename = "serializedZKP")]
    pub serialized_zkp: Option<String>,
}

/// Card signature in `{r, s, v}` form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSignature {
    pub r: String,
    pub s: String,
    pub v: u8,
}

/// Post signed directly by the cardholder's card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardholderMessage {
    pub message: String,
    pub signature: RawSignature,
}

/// Error body the relay may return
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("Relay returned HTTP {status}{}", error_detail(.error))]
    Rejected { status: u16, error: Option<String> },

    #[error("Relay unreachable: {0}")]
    Transport(String),

    #[error("Relay request timed out")]
    Timeout,

    #[error("Could not encode message: {0}")]
    Encoding(String),

    #[error("Invalid relay configuration: {0}")]
    Config(String),
}

fn error_detail(error: &Option<String>) -> String {
    error
        .as_deref()
        .map(|e| format!(": {}", e))
        .unwrap_or_default()
}

/// Relay client abstraction
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// `POST /api/chat`
    async fn send_chat(&self, message: &AnonymousChatMessage) -> Result<(), RelayError>;

    /// `POST /api/cardholder`
    async fn send_cardholder(&self, message: &CardholderMessage) -> Result<(), RelayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_wire_format() {
        let message = AnonymousChatMessage {
            message: "gm".to_string(),
            sigmoji: "cat.png".to_string(),
            serialized_zkp: None,
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            serde_json::json!({"message": "gm", "sigmoji": "cat.png", "serializedZKP": null})
        );
    }

    #[test]
    fn test_cardholder_wire_format() {
        let message = CardholderMessage {
            message: "hi".to_string(),
            signature: RawSignature {
                r: "01".to_string(),
                s: "02".to_string(),
                v: 28,
            },
        };
        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            serde_json::json!({"message": "hi", "signature": {"r": "01", "s": "02", "v": 28}})
        );
    }

    #[test]
    fn test_rejected_display() {
        let err = RelayError::Rejected {
            status: 500,
            error: Some("db down".to_string()),
        };
        assert_eq!(err.to_string(), "Relay returned HTTP 500: db down");
        let bare = RelayError::Rejected {
            status: 404,
            error: None,
        };
        assert_eq!(bare.to_string(), "Relay returned HTTP 404");
    }
}

//! Crate-level error taxonomy
//!
//! Module errors convert into `AttestError` with `?`. Only
//! [`AttestError::user_message`] is meant for people; the `Display` text is
//! for logs.

use crate::attestation::VisualIdentity;
use crate::crypto::{CardPublicKey, RecoveryError};
use crate::registry::{CardId, MatchError, RegistryError};
use crate::merkle::TreeError;
use crate::relay::RelayError;
use crate::session::SessionState;
use crate::stark::ProofError;
use crate::transport::TransportError;
use thiserror::Error;

pub type AttestResult<T> = Result<T, AttestError>;

pub const UNKNOWN_CARD_MESSAGE: &str =
    "Couldn't find the card's public key in the list of known cards. Please contact organizers.";
pub const SCAN_FAILED_MESSAGE: &str = "Scanning failed, please try again.";
pub const RELAY_FAILED_MESSAGE: &str = "Error sending chat message.";
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Debug, Error)]
pub enum AttestError {
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Invalid curve point: {0}")]
    InvalidCurvePoint(String),

    #[error("Card is not in the registry")]
    UnknownCard,

    #[error("Recovery candidates match two cards ({first}, {second})")]
    AmbiguousIdentity { first: CardId, second: CardId },

    #[error("Key {0} is not a leaf of the membership tree")]
    LeafNotFound(CardPublicKey),

    #[error("Proof generation failed: {0}")]
    ProofGenerationFailed(#[source] ProofError),

    #[error("Card transport failed: {0}")]
    TransportFailure(#[from] TransportError),

    #[error("Relay rejected message: {0}")]
    RelayRejected(#[from] RelayError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Membership tree error: {0}")]
    Tree(TreeError),

    #[error("Another attempt is in progress (state: {0})")]
    Busy(SessionState),

    #[error("Message is empty")]
    EmptyMessage,

    #[error("No collected record for {0}")]
    UnknownSelection(VisualIdentity),
}

impl AttestError {
    /// Generic text safe to show the person holding the card
    pub fn user_message(&self) -> &'static str {
        match self {
            AttestError::UnknownCard
            | AttestError::AmbiguousIdentity { .. }
            | AttestError::LeafNotFound(_) => UNKNOWN_CARD_MESSAGE,
            AttestError::TransportFailure(_)
            | AttestError::MalformedSignature(_)
            | AttestError::InvalidCurvePoint(_) => SCAN_FAILED_MESSAGE,
            AttestError::RelayRejected(_) => RELAY_FAILED_MESSAGE,
            _ => GENERIC_FAILURE_MESSAGE,
        }
    }
}

impl From<RecoveryError> for AttestError {
    fn from(err: RecoveryError) -> Self {
        match err {
            RecoveryError::MalformedSignature(reason) => AttestError::MalformedSignature(reason),
            RecoveryError::InvalidCurvePoint(reason) => AttestError::InvalidCurvePoint(reason),
        }
    }
}

impl From<MatchError> for AttestError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::UnknownCard => AttestError::UnknownCard,
            MatchError::AmbiguousIdentity { first, second } => {
                AttestError::AmbiguousIdentity { first, second }
            }
        }
    }
}

impl From<TreeError> for AttestError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::LeafNotFound(key) => AttestError::LeafNotFound(key),
            other => AttestError::Tree(other),
        }
    }
}

impl From<ProofError> for AttestError {
    fn from(err: ProofError) -> Self {
        AttestError::ProofGenerationFailed(err)
    }
}

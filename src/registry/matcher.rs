//! Registry matcher - picks the real card key out of two recovery candidates
//!
//! Each candidate is looked up against the full registry, then the pair of
//! lookups is matched exhaustively:
//!
//! | even | odd  | result                     |
//! |------|------|----------------------------|
//! | hit  | miss | even candidate             |
//! | miss | hit  | odd candidate              |
//! | hit  | hit  | `AmbiguousIdentity` (fail closed) |
//! | miss | miss | `UnknownCard`              |
//!
//! Both hitting the same entry cannot happen with distinct points but is
//! resolved to that entry.
//!
//! Two candidates hitting distinct cards means two provisioned cards share
//! key material, which is a provisioning failure.

use super::{CardId, Registry};
use crate::crypto::{CardPublicKey, Parity, RecoveredKeyCandidates};
use thiserror::Error;

/// Matching errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("No recovery candidate is a registered card")]
    UnknownCard,

    #[error("Recovery candidates match two cards ({first}, {second})")]
    AmbiguousIdentity { first: CardId, second: CardId },
}

/// A card identified from a tap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCard {
    pub card_id: CardId,
    pub public_key: CardPublicKey,
    /// Recovery parity that produced `public_key`
    pub parity: Parity,
}

impl Registry {
    /// Owner of `key`, scanning every entry
    pub fn card_for_key(&self, key: &CardPublicKey) -> Option<&CardId> {
        self.iter()
            .find(|(_, registered)| *registered == key)
            .map(|(card_id, _)| card_id)
    }

    /// Select the registered key among the two recovery candidates
    pub fn resolve(&self, candidates: &RecoveredKeyCandidates) -> Result<ResolvedCard, MatchError> {
        let (even, odd) = candidates.pair();

        match (self.card_for_key(even), self.card_for_key(odd)) {
            (Some(card_id), None) => Ok(ResolvedCard {
                card_id: card_id.clone(),
                public_key: *even,
                parity: Parity::Even,
            }),
            (None, Some(card_id)) => Ok(ResolvedCard {
                card_id: card_id.clone(),
                public_key: *odd,
                parity: Parity::Odd,
            }),
            (Some(first), Some(second)) if first == second => Ok(ResolvedCard {
                card_id: first.clone(),
                public_key: *even,
                parity: Parity::Even,
            }),
            (Some(first), Some(second)) => {
                tracing::error!(
                    first = %first,
                    second = %second,
                    "both recovery candidates are registered cards; registry keys are not unique"
                );
                Err(MatchError::AmbiguousIdentity {
                    first: first.clone(),
                    second: second.clone(),
                })
            }
            (None, None) => Err(MatchError::UnknownCard),
        }
    }
}

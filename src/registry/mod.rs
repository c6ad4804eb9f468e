//! Card registry - the provisioned fleet of card public keys
//!
//! The registry maps card identifiers to each card's secondary public key.
//! It is loaded once from the provisioning export and never mutated.
//!
//! ## Snapshot Format
//!
//! ```json
//! {
//!   "card-01": { "secondaryPublicKeyRaw": "04..." },
//!   "card-02": { "secondaryPublicKeyRaw": "04...", "primaryPublicKeyRaw": "04..." }
//! }
//! ```
//!
//! Extra per-card fields are ignored. Entries are held in a `BTreeMap`, so
//! iteration (and therefore the membership tree's leaf order) is ascending
//! by card id regardless of file order.

pub mod fleet;
pub mod matcher;

pub use fleet::{Fleet, FleetHandle};
pub use matcher::{MatchError, ResolvedCard};

use crate::crypto::CardPublicKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Card identifier as used in the provisioning export
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CardId(pub String);

impl CardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry loading errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read registry '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse registry: {0}")]
    Parse(String),

    #[error("Card {card_id} has an invalid public key: {reason}")]
    InvalidKey { card_id: CardId, reason: String },

    #[error("Cards {first} and {second} share the same public key")]
    DuplicateKey { first: CardId, second: CardId },

    #[error("Registry contains no cards")]
    Empty,
}

/// One card's entry in the provisioning export
#[derive(Debug, Deserialize)]
struct CardRecord {
    #[serde(rename = "secondaryPublicKeyRaw")]
    secondary_public_key_raw: String,
}

/// Immutable mapping from card id to public key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    cards: BTreeMap<CardId, CardPublicKey>,
}

impl Registry {
    /// Create a registry, rejecting empty sets and shared keys
    pub fn from_entries<I>(entries: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (CardId, CardPublicKey)>,
    {
        let cards: BTreeMap<CardId, CardPublicKey> = entries.into_iter().collect();
        if cards.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut owners: HashMap<CardPublicKey, &CardId> = HashMap::with_capacity(cards.len());
        for (card_id, key) in &cards {
            if let Some(first) = owners.insert(*key, card_id) {
                return Err(RegistryError::DuplicateKey {
                    first: first.clone(),
                    second: card_id.clone(),
                });
            }
        }

        Ok(Self { cards })
    }

    /// Parse the provisioning export JSON
    pub fn from_json_str(contents: &str) -> Result<Self, RegistryError> {
        let records: BTreeMap<String, CardRecord> =
            serde_json::from_str(contents).map_err(|e| RegistryError::Parse(e.to_string()))?;

        let mut entries = Vec::with_capacity(records.len());
        for (id, record) in records {
            let card_id = CardId(id);
            let key = CardPublicKey::from_hex(&record.secondary_public_key_raw).map_err(|e| {
                RegistryError::InvalidKey {
                    card_id: card_id.clone(),
                    reason: e.to_string(),
                }
            })?;
            entries.push((card_id, key));
        }

        Self::from_entries(entries)
    }

    /// Load the registry snapshot from disk
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let contents = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_json_str(&contents)?;
        tracing::info!(
            cards = registry.len(),
            path = %path.display(),
            "card registry loaded"
        );
        Ok(registry)
    }

    pub fn get(&self, card_id: &CardId) -> Option<&CardPublicKey> {
        self.cards.get(card_id)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Entries in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (&CardId, &CardPublicKey)> {
        self.cards.iter()
    }

    /// Public keys in canonical order (the tree's leaf order)
    pub fn keys_in_order(&self) -> Vec<CardPublicKey> {
        self.cards.values().copied().collect()
    }
}

//! Mock card transport for testing
//!
//! `SimulatedCard` holds real secp256k1 keys and answers `sign_random` and
//! `sign` the way the card does, DER signatures included. The transport
//! around it can be told to fail, to stall, or to emit high-S signatures.

use super::{CardCommand, CardTransport, StatusCallback, TapStatus, TransportError, TransportResponse};
use super::{ATTEST_KEY_SLOT, MESSAGE_KEY_SLOT};
use crate::crypto::{attest_digest, decode_hex, CardPublicKey};
use async_trait::async_trait;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{Signature, SigningKey};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A software card with an attest key (slot 2) and a message key (slot 1)
#[derive(Clone)]
pub struct SimulatedCard {
    attest_key: SigningKey,
    message_key: SigningKey,
    counter: u32,
}

impl std::fmt::Debug for SimulatedCard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedCard")
            .field("attest_key", &self.attest_public_key())
            .field("counter", &self.counter)
            .finish()
    }
}

impl SimulatedCard {
    pub fn new(attest_key: SigningKey, message_key: SigningKey) -> Self {
        Self {
            attest_key,
            message_key,
            counter: 0,
        }
    }

    /// Derive both keys from a seed
    pub fn from_seed(seed: &[u8]) -> Self {
        Self::new(derive_key(seed, b"attest"), derive_key(seed, b"message"))
    }

    pub fn attest_public_key(&self) -> CardPublicKey {
        CardPublicKey::from_verifying_key(self.attest_key.verifying_key())
    }

    pub fn message_public_key(&self) -> CardPublicKey {
        CardPublicKey::from_verifying_key(self.message_key.verifying_key())
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Answer one command
    pub fn respond(
        &mut self,
        command: &CardCommand,
        high_s: bool,
    ) -> Result<TransportResponse, TransportError> {
        self.counter = self.counter.wrapping_add(1);
        let counter = self.counter.to_be_bytes();

        match (command.name.as_str(), command.key_no) {
            ("sign_random", ATTEST_KEY_SLOT) => {
                let rnd = self.random_message(&counter);
                let signature = sign(&self.attest_key, &attest_digest(&rnd), high_s)?;
                Ok(TransportResponse {
                    nonce: hex::encode(counter),
                    digest: hex::encode(rnd),
                    signature: hex::encode(signature.to_der().as_bytes()),
                    public_key: None,
                })
            }
            ("sign", MESSAGE_KEY_SLOT) => {
                let digest = command
                    .digest
                    .as_deref()
                    .ok_or_else(|| TransportError::Failed("sign requires a digest".to_string()))
                    .and_then(|value| {
                        decode_hex(value)
                            .map_err(|e| TransportError::Failed(format!("bad digest: {}", e)))
                    })?;
                if digest.len() != 32 {
                    return Err(TransportError::Failed(format!(
                        "digest must be 32 bytes, got {}",
                        digest.len()
                    )));
                }
                let signature = sign(&self.message_key, &digest, high_s)?;
                let public_key = self
                    .message_public_key()
                    .to_uncompressed_hex()
                    .map_err(|e| TransportError::Failed(e.to_string()))?;
                Ok(TransportResponse {
                    nonce: hex::encode(counter),
                    digest: hex::encode(&digest),
                    signature: hex::encode(signature.to_der().as_bytes()),
                    public_key: Some(public_key),
                })
            }
            (name, key_no) => Err(TransportError::Failed(format!(
                "unsupported command {} on key slot {}",
                name, key_no
            ))),
        }
    }

    fn random_message(&self, counter: &[u8; 4]) -> Vec<u8> {
        let tail = Sha256::new()
            .chain_update(b"simulated-card-rnd")
            .chain_update(self.attest_public_key().as_bytes())
            .chain_update(counter)
            .finalize();
        let mut rnd = counter.to_vec();
        rnd.extend_from_slice(&tail[..28]);
        rnd
    }
}

fn derive_key(seed: &[u8], label: &[u8]) -> SigningKey {
    let mut round: u32 = 0;
    loop {
        let bytes = Sha256::new()
            .chain_update(label)
            .chain_update(seed)
            .chain_update(round.to_be_bytes())
            .finalize();
        if let Ok(key) = SigningKey::from_slice(&bytes) {
            return key;
        }
        round += 1;
    }
}

fn sign(key: &SigningKey, digest: &[u8], high_s: bool) -> Result<Signature, TransportError> {
    let signature: Signature = key
        .sign_prehash(digest)
        .map_err(|e| TransportError::Failed(format!("signing failed: {}", e)))?;
    if !high_s {
        return Ok(signature);
    }
    let (r, s) = signature.split_scalars();
    Signature::from_scalars(r.to_bytes(), (-*s).to_bytes())
        .map_err(|e| TransportError::Failed(format!("signing failed: {}", e)))
}

#[derive(Debug)]
struct MockState {
    card: SimulatedCard,
    failure: Option<TransportError>,
    delay: Option<Duration>,
    high_s: bool,
    commands: Vec<CardCommand>,
    statuses: Vec<TapStatus>,
}

/// Mock transport wrapping a simulated card
#[derive(Debug, Clone)]
pub struct MockCardTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockCardTransport {
    pub fn new(card: SimulatedCard) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                card,
                failure: None,
                delay: None,
                high_s: false,
                commands: Vec::new(),
                statuses: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fail every following command with `error`
    pub fn fail_with(&self, error: TransportError) {
        self.state().failure = Some(error);
    }

    pub fn clear_failure(&self) {
        self.state().failure = None;
    }

    /// Wait `delay` before answering (to exercise timeouts)
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    /// Emit high-S signatures
    pub fn set_high_s(&self, high_s: bool) {
        self.state().high_s = high_s;
    }

    pub fn card(&self) -> SimulatedCard {
        self.state().card.clone()
    }

    /// Commands received so far
    pub fn commands(&self) -> Vec<CardCommand> {
        self.state().commands.clone()
    }

    /// Statuses emitted so far
    pub fn statuses(&self) -> Vec<TapStatus> {
        self.state().statuses.clone()
    }
}

#[async_trait]
impl CardTransport for MockCardTransport {
    async fn execute(
        &self,
        command: &CardCommand,
        status: StatusCallback<'_>,
    ) -> Result<TransportResponse, TransportError> {
        let delay = {
            let mut state = self.state();
            state.commands.push(command.clone());
            state.statuses.push(TapStatus::Init);
            state.delay
        };
        status(TapStatus::Init);

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut state = self.state();
            match state.failure.clone() {
                Some(error) => Err(error),
                None => {
                    let high_s = state.high_s;
                    state.statuses.push(TapStatus::Scanned);
                    state.card.respond(command, high_s)
                }
            }
        };
        if result.is_ok() {
            status(TapStatus::Scanned);
        }
        result
    }
}

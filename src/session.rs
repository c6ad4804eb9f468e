//! Submission session: tap, resolve, prove, relay
//!
//! One attempt runs at a time. The attempt owns the state machine through an
//! [`Attempt`] guard:
//!
//! ```text
//! Idle -> Scanning -> Resolving -> Proving -> Submitting -> Idle(success)
//!            |            |           |           |
//!            +------------+-----------+-----------+------> Idle(failed)
//! ```
//!
//! Starting an attempt while not idle fails with `Busy` and leaves the
//! running attempt alone. Dropping an attempt's future (cancellation) or
//! returning an error puts the session back to `Idle(failed)`.
//!
//! No lock is held across an `.await`.

use crate::attestation::{AttestationRecord, CollectedClaim, Collection, VisualIdentity};
use crate::crypto::{recover, recovery::signature_scalars, Parity};
use crate::error::{AttestError, AttestResult};
use crate::registry::{Fleet, FleetHandle};
use crate::relay::{AnonymousChatMessage, CardholderMessage, RawSignature, RelayClient, RelayError};
use crate::stark::ProofEngine;
use crate::transport::{log_status, CardCommand, CardTransport, TransportError, TransportResponse};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Timeouts for the external collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub transport_timeout: Duration,
    pub relay_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport_timeout: Duration::from_secs(60),
            relay_timeout: Duration::from_secs(15),
        }
    }
}

/// How the last attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle { last: Option<Outcome> },
    Scanning,
    Resolving,
    Proving,
    Submitting,
}

impl SessionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionState::Idle { .. })
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle { last: None }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle { last: None } => write!(f, "idle"),
            SessionState::Idle {
                last: Some(Outcome::Success),
            } => write!(f, "idle (success)"),
            SessionState::Idle {
                last: Some(Outcome::Failed),
            } => write!(f, "idle (failed)"),
            SessionState::Scanning => write!(f, "scanning"),
            SessionState::Resolving => write!(f, "resolving"),
            SessionState::Proving => write!(f, "proving"),
            SessionState::Submitting => write!(f, "submitting"),
        }
    }
}

/// Exclusive hold on the session state for one attempt
struct Attempt<'a> {
    state: &'a Mutex<SessionState>,
    finished: bool,
}

impl<'a> Attempt<'a> {
    fn begin(state: &'a Mutex<SessionState>, first: SessionState) -> AttestResult<Self> {
        let mut guard = lock(state);
        if !guard.is_idle() {
            let current = *guard;
            tracing::warn!(state = %current, "attempt rejected, session busy");
            return Err(AttestError::Busy(current));
        }
        *guard = first;
        tracing::info!(state = %first, "attempt started");
        Ok(Self {
            state,
            finished: false,
        })
    }

    fn advance(&self, next: SessionState) {
        *lock(self.state) = next;
        tracing::info!(state = %next, "attempt advanced");
    }

    fn succeed(mut self) {
        self.finished = true;
        *lock(self.state) = SessionState::Idle {
            last: Some(Outcome::Success),
        };
        tracing::info!("attempt succeeded");
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        if !self.finished {
            *lock(self.state) = SessionState::Idle {
                last: Some(Outcome::Failed),
            };
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// A collector's session against one card transport and relay
pub struct Session {
    fleet: Arc<FleetHandle>,
    engine: Arc<ProofEngine>,
    transport: Arc<dyn CardTransport>,
    relay: Arc<dyn RelayClient>,
    config: SessionConfig,
    state: Mutex<SessionState>,
    collection: Mutex<Collection>,
}

impl Session {
    pub fn new(
        fleet: Arc<FleetHandle>,
        engine: Arc<ProofEngine>,
        transport: Arc<dyn CardTransport>,
        relay: Arc<dyn RelayClient>,
        config: SessionConfig,
    ) -> Self {
        Self {
            fleet,
            engine,
            transport,
            relay,
            config,
            state: Mutex::new(SessionState::default()),
            collection: Mutex::new(Collection::new()),
        }
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    /// Collected record for `identity`
    pub fn record(&self, identity: &VisualIdentity) -> Option<AttestationRecord> {
        lock(&self.collection).get(identity).cloned()
    }

    pub fn identities(&self) -> Vec<VisualIdentity> {
        lock(&self.collection).identities().cloned().collect()
    }

    /// Tap a card and keep the claim under `identity`, replacing any earlier
    /// record for it.
    pub async fn collect(&self, identity: VisualIdentity) -> AttestResult<AttestationRecord> {
        log_failure("collect", self.collect_inner(identity).await)
    }

    async fn collect_inner(&self, identity: VisualIdentity) -> AttestResult<AttestationRecord> {
        let attempt = Attempt::begin(&self.state, SessionState::Scanning)?;
        let fleet = self.fleet.current();
        let claim = self.scan_claim(&attempt, &fleet).await?;

        let record = AttestationRecord::new(identity, claim);
        lock(&self.collection).insert(record.clone());
        tracing::info!(
            identity = %record.visual_identity(),
            card = %record.claim().card.card_id,
            "card collected"
        );
        attempt.succeed();
        Ok(record)
    }

    /// Post `message` anonymously as the holder of `identity`'s card.
    ///
    /// The record is proved on first use; later messages reuse the proof
    /// unless the fleet changed since.
    pub async fn send_chat(&self, identity: &VisualIdentity, message: &str) -> AttestResult<()> {
        log_failure("send_chat", self.send_chat_inner(identity, message).await)
    }

    async fn send_chat_inner(&self, identity: &VisualIdentity, message: &str) -> AttestResult<()> {
        if message.trim().is_empty() {
            return Err(AttestError::EmptyMessage);
        }
        let attempt = Attempt::begin(&self.state, SessionState::Proving)?;
        let mut record = self
            .record(identity)
            .ok_or_else(|| AttestError::UnknownSelection(identity.clone()))?;
        let fleet = self.fleet.current();

        self.prove_and_submit(&attempt, &mut record, &fleet, message)
            .await?;
        attempt.succeed();
        Ok(())
    }

    /// Tap, collect under `identity` and post `message`, as one attempt
    pub async fn tap_and_send(&self, identity: VisualIdentity, message: &str) -> AttestResult<()> {
        log_failure("tap_and_send", self.tap_and_send_inner(identity, message).await)
    }

    async fn tap_and_send_inner(&self, identity: VisualIdentity, message: &str) -> AttestResult<()> {
        if message.trim().is_empty() {
            return Err(AttestError::EmptyMessage);
        }
        let attempt = Attempt::begin(&self.state, SessionState::Scanning)?;
        let fleet = self.fleet.current();
        let claim = self.scan_claim(&attempt, &fleet).await?;

        let mut record = AttestationRecord::new(identity, claim);
        lock(&self.collection).insert(record.clone());

        attempt.advance(SessionState::Proving);
        self.prove_and_submit(&attempt, &mut record, &fleet, message)
            .await?;
        attempt.succeed();
        Ok(())
    }

    /// Post `message` signed by the card itself.
    ///
    /// The card signs `SHA-256(message)`; the relay receives the low-S
    /// `(r, s)` and `v = 27 + parity`.
    pub async fn send_cardholder(&self, message: &str) -> AttestResult<CardholderMessage> {
        log_failure("send_cardholder", self.send_cardholder_inner(message).await)
    }

    async fn send_cardholder_inner(&self, message: &str) -> AttestResult<CardholderMessage> {
        if message.trim().is_empty() {
            return Err(AttestError::EmptyMessage);
        }
        let attempt = Attempt::begin(&self.state, SessionState::Scanning)?;
        let digest: [u8; 32] = Sha256::digest(message.as_bytes()).into();
        let response = self.tap(&CardCommand::sign_digest(&digest)).await?;

        attempt.advance(SessionState::Resolving);
        let signature = response.signature_bytes()?;
        let parity = self.cardholder_parity(&response, &digest, &signature)?;
        let (r, s) = signature_scalars(&signature)?;

        attempt.advance(SessionState::Submitting);
        let post = CardholderMessage {
            message: message.to_string(),
            signature: RawSignature {
                r: hex::encode(r),
                s: hex::encode(s),
                v: parity.v(),
            },
        };
        self.with_relay_timeout(self.relay.send_cardholder(&post))
            .await?;
        attempt.succeed();
        Ok(post)
    }

    /// Scanning -> Resolving: tap the card and match it against the fleet
    async fn scan_claim(&self, attempt: &Attempt<'_>, fleet: &Fleet) -> AttestResult<CollectedClaim> {
        let response = self.tap(&CardCommand::sign_random()).await?;
        tracing::debug!(counter = %response.nonce, "card tap counter");
        let signed_nonce = response.into_signed_nonce()?;

        attempt.advance(SessionState::Resolving);
        let candidates = recover(&signed_nonce.digest, &signed_nonce.signature)?;
        let card = fleet.registry().resolve(&candidates)?;

        Ok(CollectedClaim { signed_nonce, card })
    }

    /// Proving -> Submitting
    async fn prove_and_submit(
        &self,
        attempt: &Attempt<'_>,
        record: &mut AttestationRecord,
        fleet: &Fleet,
        message: &str,
    ) -> AttestResult<()> {
        let proof = self.engine.ensure_proved_async(record, fleet).await?;
        // Keep the proof even if the relay call below fails
        lock(&self.collection).insert(record.clone());

        attempt.advance(SessionState::Submitting);
        let post = AnonymousChatMessage {
            message: record.outgoing_message(message),
            sigmoji: record.visual_identity().to_string(),
            serialized_zkp: Some(proof.to_serialized()?),
        };
        self.with_relay_timeout(self.relay.send_chat(&post)).await?;
        Ok(())
    }

    fn cardholder_parity(
        &self,
        response: &TransportResponse,
        digest: &[u8; 32],
        signature: &[u8],
    ) -> AttestResult<Parity> {
        let candidates = recover(digest, signature)?;
        match response.reported_key()? {
            Some(key) => candidates.parity_of(&key).ok_or_else(|| {
                AttestError::MalformedSignature(
                    "signature does not recover the key the card reported".to_string(),
                )
            }),
            None => Ok(self.fleet.current().registry().resolve(&candidates)?.parity),
        }
    }

    async fn tap(&self, command: &CardCommand) -> Result<TransportResponse, TransportError> {
        let timeout = self.config.transport_timeout;
        match tokio::time::timeout(timeout, self.transport.execute(command, &log_status)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout(timeout)),
        }
    }

    async fn with_relay_timeout<F>(&self, call: F) -> Result<(), RelayError>
    where
        F: std::future::Future<Output = Result<(), RelayError>>,
    {
        tokio::time::timeout(self.config.relay_timeout, call)
            .await
            .unwrap_or(Err(RelayError::Timeout))
    }
}

fn log_failure<T>(operation: &str, result: AttestResult<T>) -> AttestResult<T> {
    if let Err(e) = &result {
        match e {
            AttestError::ProofGenerationFailed(_) => {
                tracing::error!(operation, error = %e, "attempt failed")
            }
            _ => tracing::warn!(operation, error = %e, "attempt failed"),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attestation::MAGIC_WAND;
    use crate::crypto::verify_card_signature;
    use crate::registry::{CardId, Registry};
    use crate::relay::MockRelay;
    use crate::stark::MembershipProof;
    use crate::transport::{MockCardTransport, SimulatedCard};

    struct Harness {
        session: Session,
        transport: MockCardTransport,
        relay: MockRelay,
        engine: Arc<ProofEngine>,
        fleet: Arc<FleetHandle>,
    }

    fn fleet_with(cards: &[&SimulatedCard]) -> Fleet {
        let registry = Registry::from_entries(
            cards
                .iter()
                .enumerate()
                .map(|(i, card)| (CardId(format!("card-{:02}", i + 1)), card.attest_public_key())),
        )
        .unwrap();
        Fleet::new(registry).unwrap()
    }

    fn harness(config: SessionConfig) -> Harness {
        let tapped = SimulatedCard::from_seed(b"tapped");
        let others: Vec<_> = (0..4u8)
            .map(|i| SimulatedCard::from_seed(&[b'o', i]))
            .collect();
        let mut cards: Vec<&SimulatedCard> = others.iter().collect();
        cards.insert(2, &tapped);

        let fleet = Arc::new(FleetHandle::new(fleet_with(&cards)));
        let engine = Arc::new(ProofEngine::default());
        let transport = MockCardTransport::new(tapped);
        let relay = MockRelay::new();
        let session = Session::new(
            Arc::clone(&fleet),
            Arc::clone(&engine),
            Arc::new(transport.clone()),
            Arc::new(relay.clone()),
            config,
        );
        Harness {
            session,
            transport,
            relay,
            engine,
            fleet,
        }
    }

    fn cat() -> VisualIdentity {
        VisualIdentity::new("cat.png")
    }

    fn failed() -> SessionState {
        SessionState::Idle {
            last: Some(Outcome::Failed),
        }
    }

    fn succeeded() -> SessionState {
        SessionState::Idle {
            last: Some(Outcome::Success),
        }
    }

    #[tokio::test]
    async fn test_collect_resolves_card() {
        let h = harness(SessionConfig::default());
        let record = h.session.collect(cat()).await.unwrap();

        assert_eq!(record.claim().card.card_id, CardId::new("card-03"));
        assert_eq!(h.session.state(), succeeded());
        assert_eq!(h.session.identities(), vec![cat()]);
        assert_eq!(h.transport.commands(), vec![CardCommand::sign_random()]);
    }

    #[tokio::test]
    async fn test_unknown_card_fails_closed() {
        let h = harness(SessionConfig::default());
        let stranger = SimulatedCard::from_seed(b"stranger");
        h.fleet.replace(fleet_with(&[&stranger]).registry().clone()).unwrap();

        let err = h.session.collect(cat()).await.unwrap_err();
        assert!(matches!(err, AttestError::UnknownCard));
        assert_eq!(h.session.state(), failed());
        assert!(h.session.record(&cat()).is_none());
    }

    #[tokio::test]
    async fn test_transport_failure_is_scan_failure() {
        let h = harness(SessionConfig::default());
        h.transport
            .fail_with(TransportError::Failed("NFC disabled".to_string()));

        let err = h.session.collect(cat()).await.unwrap_err();
        assert!(matches!(err, AttestError::TransportFailure(_)));
        assert_eq!(err.user_message(), crate::error::SCAN_FAILED_MESSAGE);
        assert_eq!(h.session.state(), failed());
    }

    #[tokio::test]
    async fn test_transport_timeout() {
        let h = harness(SessionConfig {
            transport_timeout: Duration::from_millis(50),
            ..SessionConfig::default()
        });
        h.transport.set_delay(Duration::from_secs(5));

        let err = h.session.collect(cat()).await.unwrap_err();
        assert!(matches!(
            err,
            AttestError::TransportFailure(TransportError::Timeout(_))
        ));
        assert_eq!(h.session.state(), failed());
    }

    #[tokio::test]
    async fn test_second_attempt_is_busy() {
        let h = harness(SessionConfig::default());
        h.transport.set_delay(Duration::from_millis(200));

        let (first, second) = tokio::join!(h.session.collect(cat()), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            h.session.collect(VisualIdentity::new("dog.png")).await
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(AttestError::Busy(SessionState::Scanning))));
        assert_eq!(h.session.identities(), vec![cat()]);
        assert_eq!(h.session.state(), succeeded());
    }

    #[tokio::test]
    async fn test_cancelled_attempt_returns_to_idle() {
        let h = harness(SessionConfig::default());
        h.transport.set_delay(Duration::from_secs(5));

        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), h.session.collect(cat())).await;
        assert!(cancelled.is_err());
        assert_eq!(h.session.state(), failed());

        h.transport.set_delay(Duration::from_millis(0));
        assert!(h.session.collect(cat()).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_chat_attaches_verifying_proof() {
        let h = harness(SessionConfig::default());
        h.session.collect(cat()).await.unwrap();
        h.session.send_chat(&cat(), "gm").await.unwrap();

        let sent = h.relay.chat_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message, "gm");
        assert_eq!(sent[0].sigmoji, "cat.png");

        let proof =
            MembershipProof::from_serialized(sent[0].serialized_zkp.as_deref().unwrap()).unwrap();
        assert!(h.engine.verify(&proof));
        assert_eq!(proof.root(), &h.fleet.current().root());
        assert_eq!(h.session.state(), succeeded());
    }

    #[tokio::test]
    async fn test_second_message_reuses_proof() {
        let h = harness(SessionConfig::default());
        h.session.collect(cat()).await.unwrap();

        h.session.send_chat(&cat(), "one").await.unwrap();
        let first = Arc::clone(h.session.record(&cat()).unwrap().proof().unwrap());
        h.session.send_chat(&cat(), "two").await.unwrap();
        let second = Arc::clone(h.session.record(&cat()).unwrap().proof().unwrap());

        assert!(Arc::ptr_eq(&first, &second));
        let sent = h.relay.chat_messages();
        assert_eq!(sent[0].serialized_zkp, sent[1].serialized_zkp);
    }

    #[tokio::test]
    async fn test_relay_failure_keeps_proof() {
        let h = harness(SessionConfig::default());
        h.session.collect(cat()).await.unwrap();
        h.relay.push_response(Err(RelayError::Rejected {
            status: 500,
            error: Some("db down".to_string()),
        }));

        let err = h.session.send_chat(&cat(), "gm").await.unwrap_err();
        assert!(matches!(err, AttestError::RelayRejected(_)));
        assert_eq!(err.user_message(), crate::error::RELAY_FAILED_MESSAGE);
        assert_eq!(h.session.state(), failed());
        assert!(h.session.record(&cat()).unwrap().proof_state().is_proved());
    }

    #[tokio::test]
    async fn test_send_chat_rejects_empty_and_unknown() {
        let h = harness(SessionConfig::default());
        assert!(matches!(
            h.session.send_chat(&cat(), "   ").await,
            Err(AttestError::EmptyMessage)
        ));
        assert!(matches!(
            h.session.send_chat(&cat(), "gm").await,
            Err(AttestError::UnknownSelection(_))
        ));
        assert!(h.relay.chat_messages().is_empty());
    }

    #[tokio::test]
    async fn test_magic_wand_posts_digest() {
        let h = harness(SessionConfig::default());
        let wand = VisualIdentity::new(MAGIC_WAND);
        h.session.tap_and_send(wand, "abc").await.unwrap();

        let sent = h.relay.chat_messages();
        assert_eq!(
            sent[0].message,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(sent[0].sigmoji, MAGIC_WAND);
    }

    #[tokio::test]
    async fn test_high_s_card_still_resolves() {
        let h = harness(SessionConfig::default());
        h.transport.set_high_s(true);
        let record = h.session.collect(cat()).await.unwrap();
        assert_eq!(record.claim().card.card_id, CardId::new("card-03"));
    }

    #[tokio::test]
    async fn test_cardholder_message_signature() {
        let h = harness(SessionConfig::default());
        let post = h.session.send_cardholder("hello fleet").await.unwrap();

        let digest: [u8; 32] = Sha256::digest(b"hello fleet").into();
        let mut compact = hex::decode(&post.signature.r).unwrap();
        compact.extend(hex::decode(&post.signature.s).unwrap());

        let key = h.transport.card().message_public_key();
        assert!(verify_card_signature(&key, &digest, &compact));
        let parity = recover(&digest, &compact).unwrap().parity_of(&key).unwrap();
        assert_eq!(post.signature.v, parity.v());

        assert_eq!(h.relay.cardholder_messages(), vec![post]);
        assert_eq!(h.transport.commands(), vec![CardCommand::sign_digest(&digest)]);
    }
}

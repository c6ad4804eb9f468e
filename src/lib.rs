//! Sigmoji - card-attested anonymous fleet messaging
//!
//! Proves that a message was sent by the holder of one of a registered fleet
//! of NFC secure-element cards without revealing which card.
//!
//! Pipeline:
//! - Recover the two candidate public keys from a raw card signature
//! - Select the real key via the provisioned card registry
//! - Build a Merkle tree over the registry and take the card's path
//! - Prove tree membership (STARK backend) and attach it to the message
//!
//! Key principles:
//! - The registry is the only persisted input (immutable snapshot)
//! - Proofs are generated once per collected card and reused
//! - User-facing errors never reveal which stage failed

pub mod attestation;
pub mod crypto;
pub mod error;
pub mod merkle;
pub mod registry;
pub mod relay;
pub mod session;
pub mod stark;
pub mod transport;

pub use attestation::{AttestationRecord, ProofState, VisualIdentity};
pub use error::{AttestError, AttestResult};
pub use merkle::{MembershipTree, MembershipWitness};
pub use registry::{CardId, Fleet, FleetHandle, Registry, ResolvedCard};
pub use session::{Session, SessionConfig, SessionState};
pub use stark::{MembershipProof, ProofEngine, ProvingBackend, StarkBackend};

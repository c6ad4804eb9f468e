use sigmoji::crypto::{recover, SignedNonce};
use sigmoji::{AttestError, Fleet, ProofEngine};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// Prove that the card behind `signed_nonce` is in `fleet`.
///
/// The proof is written as JSON, to `output` or stdout.
pub async fn execute(
    fleet: Fleet,
    signed_nonce: SignedNonce,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let candidates = recover(&signed_nonce.digest, &signed_nonce.signature)?;
    let card = fleet
        .registry()
        .resolve(&candidates)
        .map_err(AttestError::from)?;
    let witness = fleet.witness(&card.public_key)?;

    let engine = Arc::new(ProofEngine::default());
    let proof = engine
        .prove_async(witness, signed_nonce, fleet.root())
        .await?;
    let json = serde_json::to_string_pretty(&proof)?;

    match output {
        Some(path) => {
            fs::write(path, json)
                .map_err(|e| format!("Failed to write proof '{}': {}", path.display(), e))?;
            println!(
                "Wrote {} byte proof for root {} to {}",
                proof.size(),
                hex::encode(proof.root()),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

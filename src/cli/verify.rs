use sigmoji::{Fleet, MembershipProof, ProofEngine};
use std::fs;
use std::path::Path;

/// Verify a proof file, optionally against a registry's current root
pub async fn execute(
    proof_path: &Path,
    fleet: Option<&Fleet>,
) -> Result<(), Box<dyn std::error::Error>> {
    let contents = fs::read_to_string(proof_path)
        .map_err(|e| format!("Failed to read proof '{}': {}", proof_path.display(), e))?;
    let proof: MembershipProof =
        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse proof: {}", e))?;

    println!("Root:    {}", hex::encode(proof.root()));
    println!("Circuit: {} v{}", proof.circuit.id, proof.circuit.version);

    if let Some(fleet) = fleet {
        if fleet.root() != *proof.root() {
            return Err("Proof was made for a different registry root".into());
        }
        println!("Registry root matches");
    }

    if !ProofEngine::default().verify(&proof) {
        return Err("Proof verification failed".into());
    }

    // Hashing and the card signature are prover-side checks, not proven
    println!(
        "Proof verified: path shape bound to root, digest and nonce ({} bytes, {})",
        proof.size(),
        proof.backend
    );
    Ok(())
}

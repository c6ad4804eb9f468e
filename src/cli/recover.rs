use sigmoji::crypto::{recover, Parity, SignedNonce};

/// Print both public keys the signature could have come from
pub async fn execute(signed_nonce: &SignedNonce) -> Result<(), Box<dyn std::error::Error>> {
    let candidates = recover(&signed_nonce.digest, &signed_nonce.signature)?;

    println!("Digest: {}", hex::encode(signed_nonce.digest));
    for parity in [Parity::Even, Parity::Odd] {
        println!("{:>6}: {}", parity.to_string(), candidates.get(parity).to_hex());
    }
    Ok(())
}

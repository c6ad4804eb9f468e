use sigmoji::crypto::{recover, SignedNonce};
use sigmoji::{AttestError, Fleet};

/// Identify the card that signed `signed_nonce`
pub async fn execute(
    fleet: &Fleet,
    signed_nonce: &SignedNonce,
) -> Result<(), Box<dyn std::error::Error>> {
    let candidates = recover(&signed_nonce.digest, &signed_nonce.signature)?;
    let card = fleet
        .registry()
        .resolve(&candidates)
        .map_err(AttestError::from)?;

    println!("Card:   {}", card.card_id);
    println!("Key:    {}", card.public_key.to_hex());
    println!("Parity: {}", card.parity);
    Ok(())
}

use super::config::SigmojiConfig;
use sigmoji::relay::{HttpRelay, MockRelay, RelayClient};
use sigmoji::transport::{MockCardTransport, SimulatedCard};
use sigmoji::{CardId, Fleet, FleetHandle, ProofEngine, Registry, Session, VisualIdentity};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub cards: usize,
    pub identity: String,
    pub message: String,
    pub cardholder: bool,
    pub use_relay: bool,
}

/// Run one submission against a fleet of simulated cards.
///
/// The middle card of the fleet is the one tapped. Without `use_relay` the
/// relay is in memory and the posted bodies are printed.
pub async fn execute(
    config: &SigmojiConfig,
    options: SimulateOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    if options.cards == 0 {
        return Err("A simulated fleet needs at least one card".into());
    }

    let cards: Vec<SimulatedCard> = (0..options.cards)
        .map(|i| SimulatedCard::from_seed(format!("simulated-card-{}", i).as_bytes()))
        .collect();
    let registry = Registry::from_entries(
        cards
            .iter()
            .enumerate()
            .map(|(i, card)| (CardId(format!("sim-{:02}", i + 1)), card.attest_public_key())),
    )?;
    let fleet = Fleet::new(registry)?;
    println!(
        "Simulated fleet: {} cards, root {}",
        options.cards,
        hex::encode(fleet.root())
    );

    let tapped = cards[options.cards / 2].clone();
    let memory_relay = MockRelay::new();
    let relay: Arc<dyn RelayClient> = if options.use_relay {
        Arc::new(HttpRelay::new(&config.relay.base_url, config.relay_timeout())?)
    } else {
        Arc::new(memory_relay.clone())
    };

    let session = Session::new(
        Arc::new(FleetHandle::new(fleet)),
        Arc::new(ProofEngine::default()),
        Arc::new(MockCardTransport::new(tapped)),
        relay,
        config.session_config(),
    );

    if options.cardholder {
        let post = session
            .send_cardholder(&options.message)
            .await
            .map_err(|e| e.user_message())?;
        println!("Cardholder message signed (v = {})", post.signature.v);
    } else {
        let identity = VisualIdentity::new(options.identity);
        session
            .tap_and_send(identity.clone(), &options.message)
            .await
            .map_err(|e| e.user_message())?;
        if let Some(record) = session.record(&identity) {
            let size = record.proof().map(|proof| proof.size()).unwrap_or_default();
            println!(
                "Collected {} as {} ({} byte proof)",
                record.claim().card.card_id,
                identity,
                size
            );
        }
    }

    if options.use_relay {
        println!("Sent to {}", config.relay.base_url);
        return Ok(());
    }
    for message in memory_relay.chat_messages() {
        println!("POST /api/chat\n{}", serde_json::to_string_pretty(&message)?);
    }
    for message in memory_relay.cardholder_messages() {
        println!("POST /api/cardholder\n{}", serde_json::to_string_pretty(&message)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(message: &str) -> SimulateOptions {
        SimulateOptions {
            cards: 4,
            identity: "cat.png".to_string(),
            message: message.to_string(),
            cardholder: false,
            use_relay: false,
        }
    }

    #[tokio::test]
    async fn test_simulate_chat() {
        let result = execute(&SigmojiConfig::default(), options("gm")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_simulate_cardholder() {
        let mut options = options("signed by the card");
        options.cardholder = true;
        assert!(execute(&SigmojiConfig::default(), options).await.is_ok());
    }

    #[tokio::test]
    async fn test_simulate_rejects_empty_fleet_and_message() {
        let mut empty_fleet = options("gm");
        empty_fleet.cards = 0;
        assert!(execute(&SigmojiConfig::default(), empty_fleet).await.is_err());

        assert!(execute(&SigmojiConfig::default(), options("   ")).await.is_err());
    }
}

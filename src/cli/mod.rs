use clap::{Parser, Subcommand};
use sigmoji::crypto::{decode_hex, SignedNonce};
use sigmoji::{Fleet, Registry};
use std::path::{Path, PathBuf};

pub mod config;
pub mod init_config;
pub mod logging;
pub mod prove;
pub mod recover;
pub mod resolve;
pub mod root;
pub mod simulate;
pub mod verify;
pub mod version;

use config::SigmojiConfig;

/// Sigmoji - card-attested anonymous fleet messaging
#[derive(Parser, Debug)]
#[command(name = "sigmoji")]
#[command(author, version = env!("CARGO_PKG_VERSION"), about = "Card-attested anonymous fleet messaging", long_about = None)]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a commented default config file
    InitConfig {
        /// Registry export to reference from the config
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Print the membership root of the card registry
    Root {
        #[arg(long)]
        registry: Option<PathBuf>,
    },

    /// Recover both candidate public keys from a `sign_random` response
    Recover {
        /// Random message the card signed (hex)
        #[arg(long)]
        nonce: String,

        /// Card signature (hex, DER or r||s)
        #[arg(long)]
        signature: String,
    },

    /// Identify the registered card behind a `sign_random` response
    Resolve {
        #[arg(long)]
        registry: Option<PathBuf>,

        #[arg(long)]
        nonce: String,

        #[arg(long)]
        signature: String,
    },

    /// Prove registry membership for a `sign_random` response
    Prove {
        #[arg(long)]
        registry: Option<PathBuf>,

        #[arg(long)]
        nonce: String,

        #[arg(long)]
        signature: String,

        /// Write the proof JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify a membership proof file
    Verify {
        /// Proof JSON written by `prove`
        #[arg(long)]
        proof: PathBuf,

        /// Also require the proof to match this registry's root
        #[arg(long)]
        registry: Option<PathBuf>,
    },

    /// Tap a simulated card from a simulated fleet and post a message
    Simulate {
        /// Fleet size
        #[arg(long, default_value_t = 8)]
        cards: usize,

        /// Visual identity the claim is collected under
        #[arg(long, default_value = "cat.png")]
        identity: String,

        #[arg(long)]
        message: String,

        /// Post a card-signed cardholder message instead of an anonymous one
        #[arg(long)]
        cardholder: bool,

        /// Send to the configured relay instead of an in-memory one
        #[arg(long)]
        relay: bool,
    },

    /// Show version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);
    let config = SigmojiConfig::load_or_default(&config_path)?;
    logging::init(&config.logging)?;

    match cli.command {
        Commands::InitConfig { registry, force } => {
            init_config::execute(&config_path, registry.as_deref(), force).await
        }
        Commands::Root { registry } => {
            let fleet = load_fleet(&config, registry.as_deref())?;
            root::execute(&fleet).await
        }
        Commands::Recover { nonce, signature } => {
            recover::execute(&parse_signed_nonce(&nonce, &signature)?).await
        }
        Commands::Resolve {
            registry,
            nonce,
            signature,
        } => {
            let fleet = load_fleet(&config, registry.as_deref())?;
            resolve::execute(&fleet, &parse_signed_nonce(&nonce, &signature)?).await
        }
        Commands::Prove {
            registry,
            nonce,
            signature,
            output,
        } => {
            let fleet = load_fleet(&config, registry.as_deref())?;
            let signed_nonce = parse_signed_nonce(&nonce, &signature)?;
            prove::execute(fleet, signed_nonce, output.as_deref()).await
        }
        Commands::Verify { proof, registry } => {
            let fleet = match registry {
                Some(path) => Some(load_fleet(&config, Some(path.as_path()))?),
                None => None,
            };
            verify::execute(&proof, fleet.as_ref()).await
        }
        Commands::Simulate {
            cards,
            identity,
            message,
            cardholder,
            relay,
        } => {
            let options = simulate::SimulateOptions {
                cards,
                identity,
                message,
                cardholder,
                use_relay: relay,
            };
            simulate::execute(&config, options).await
        }
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}

/// Load the registry snapshot and build its membership tree
pub fn load_fleet(
    config: &SigmojiConfig,
    registry_override: Option<&Path>,
) -> Result<Fleet, Box<dyn std::error::Error>> {
    let path = config.registry_path(registry_override)?;
    let registry = Registry::load(&path)?;
    Ok(Fleet::new(registry)?)
}

/// Decode a `sign_random` response given on the command line
pub fn parse_signed_nonce(
    nonce: &str,
    signature: &str,
) -> Result<SignedNonce, Box<dyn std::error::Error>> {
    let nonce = decode_hex(nonce).map_err(|e| format!("Invalid nonce hex: {}", e))?;
    let signature = decode_hex(signature).map_err(|e| format!("Invalid signature hex: {}", e))?;
    Ok(SignedNonce::from_nonce(nonce, signature))
}

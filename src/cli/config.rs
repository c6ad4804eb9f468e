use serde::{Deserialize, Serialize};
use sigmoji::SessionConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sigmoji configuration
///
/// The registry snapshot is the only input the pipeline needs besides the
/// card itself; everything else has a working default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SigmojiConfig {
    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Path to the provisioning export (JSON)
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_relay_url")]
    pub base_url: String,

    #[serde(default = "default_relay_timeout")]
    pub timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: default_relay_url(),
            timeout_secs: default_relay_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// How long to wait for a tap before giving up
    #[serde(default = "default_transport_timeout")]
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_transport_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_relay_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_relay_timeout() -> u64 {
    15
}

fn default_transport_timeout() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `$XDG_CONFIG_HOME/sigmoji/config.toml` or the platform equivalent
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sigmoji")
        .join("config.toml")
}

impl SigmojiConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: SigmojiConfig =
            toml::from_str(&contents).map_err(|e| format!("Failed to parse config file: {}", e))?;

        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, contents)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        Ok(())
    }

    /// Registry path: the command-line override wins over the config file
    pub fn registry_path(&self, cli_override: Option<&Path>) -> Result<PathBuf, String> {
        cli_override
            .map(Path::to_path_buf)
            .or_else(|| self.registry.path.clone())
            .ok_or_else(|| {
                "No registry given: pass --registry or set [registry] path in the config".to_string()
            })
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay.timeout_secs)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            transport_timeout: Duration::from_secs(self.transport.timeout_secs),
            relay_timeout: self.relay_timeout(),
        }
    }

    /// Commented default config, pointing at `registry_path`
    pub fn generate_default_toml(registry_path: Option<&Path>) -> String {
        let registry_line = match registry_path {
            Some(path) => format!("path = \"{}\"", path.display()),
            None => "# path = \"/path/to/registry.json\"".to_string(),
        };

        format!(
            r#"# Sigmoji Configuration
#
# Card registry, relay endpoint and timeouts for the card attestation
# pipeline. Every value except the registry path has a default.

[registry]
# Provisioning export: {{ "<card id>": {{ "secondaryPublicKeyRaw": "04..." }} }}
{}

[relay]
# Relay serving /api/chat and /api/cardholder
base_url = "{}"
timeout_secs = {}

[transport]
# How long a tap may take before it fails
timeout_secs = {}

[logging]
# Overridden by RUST_LOG when set
level = "{}"
# file = "/var/log/sigmoji.log"
"#,
            registry_line,
            default_relay_url(),
            default_relay_timeout(),
            default_transport_timeout(),
            default_log_level(),
        )
    }

    /// Write the commented default config to `config_path`
    pub fn create_default(
        config_path: &Path,
        registry_path: Option<&Path>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(config_path, Self::generate_default_toml(registry_path))
            .map_err(|e| format!("Failed to write config file: {}", e))?;

        Ok(())
    }
}

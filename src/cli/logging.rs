use super::config::LoggingConfig;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr, or are
/// appended to `[logging] file` when set. A subscriber that is already
/// installed is left in place.
pub fn init(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| format!("Invalid log level '{}': {}", config.level, e))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);

    let installed = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("Failed to open log file '{}': {}", path.display(), e))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_invalid_level_rejected() {
        let config = LoggingConfig {
            level: "sigmoji=notalevel".to_string(),
            file: None,
        };
        if std::env::var_os("RUST_LOG").is_none() {
            assert!(init(&config).is_err());
        }
    }

    #[test]
    fn test_init_twice_is_ok() {
        let temp_dir = TempDir::new().unwrap();
        let config = LoggingConfig {
            level: "debug".to_string(),
            file: Some(temp_dir.path().join("sigmoji.log")),
        };
        assert!(init(&config).is_ok());
        assert!(init(&LoggingConfig::default()).is_ok());
        assert!(temp_dir.path().join("sigmoji.log").exists());
    }
}

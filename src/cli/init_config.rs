use super::config::SigmojiConfig;
use std::path::Path;

/// Write a commented default config to `config_path`
pub async fn execute(
    config_path: &Path,
    registry: Option<&Path>,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if config_path.exists() && !force {
        return Err(format!(
            "Config file '{}' already exists (use --force to overwrite)",
            config_path.display()
        )
        .into());
    }

    SigmojiConfig::create_default(config_path, registry)?;
    println!("Wrote config to {}", config_path.display());
    if registry.is_none() {
        println!("Set [registry] path before running root, resolve or prove");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_config_refuses_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        execute(&config_path, None, false).await.unwrap();
        assert!(execute(&config_path, None, false).await.is_err());

        execute(&config_path, Some(Path::new("registry.json")), true)
            .await
            .unwrap();
        let config = SigmojiConfig::load(&config_path).unwrap();
        assert_eq!(
            config.registry.path.as_deref(),
            Some(Path::new("registry.json"))
        );
    }
}

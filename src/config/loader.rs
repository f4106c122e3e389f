use super::structs::Config;
use anyhow::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::Path;

pub const CONFIG_PATH: &str = "/etc/nic-logtail/config.toml";

/// Load the system-wide config, falling back to defaults
pub fn load_config() -> Config {
    let path = Path::new(CONFIG_PATH);
    if path.exists() {
        match load_config_from(path) {
            Ok(config) => return config,
            Err(e) => {
                warn!("{:#}. Using defaults.", e);
            }
        }
    } else {
        info!("No config file found at {}. Using defaults.", CONFIG_PATH);
    }

    Config::default()
}

/// Load a config file the user asked for explicitly; failures are errors
pub fn load_config_from(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

use super::GcConfig;
use crate::error::Result;
use std::path::Path;
use tokio::fs;

/// Load a collector config from a TOML file, falling back to defaults when
/// no path is given.
pub async fn load_config(path: Option<&Path>) -> Result<GcConfig> {
    let config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).await?;
            let config: GcConfig = toml::from_str(&content)?;
            tracing::debug!(path = %path.display(), "Loaded collector configuration");
            config
        }
        None => GcConfig::default(),
    };

    config.validate()?;
    Ok(config)
}

pub mod commands;
pub mod run;
pub mod plan;
pub mod verify;

pub use commands::{Cli, Commands};

use std::path::{Path, PathBuf};
use crate::config::{apply_env_overrides, parse_config, validate_config, AutopatchConfig};
use crate::errors::AutopatchError;

/// Load the config file if given, then overlay the process environment.
pub(crate) async fn load_base_config(path: Option<&str>) -> Result<AutopatchConfig, AutopatchError> {
    let config = match path {
        Some(p) => parse_config(Path::new(p)).await?,
        None => AutopatchConfig::default(),
    };
    let config = apply_env_overrides(config, |key| std::env::var(key).ok());
    validate_config(&config)?;
    Ok(config)
}

pub(crate) fn override_trust_root(config: &mut AutopatchConfig, trust_root: Option<&str>) {
    if let Some(root) = trust_root {
        config.trust_root = PathBuf::from(root);
    }
}

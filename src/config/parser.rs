use std::path::{Path, PathBuf};
use crate::errors::AutopatchError;
use super::types::AutopatchConfig;
use tracing::warn;

pub const WEBHOOK_ENV: &str = "AUTOPATCH_WEBHOOK";
pub const TRUST_ROOT_ENV: &str = "AUTOPATCH_TRUST_ROOT";

pub async fn parse_config(path: &Path) -> Result<AutopatchConfig, AutopatchError> {
    if !path.exists() {
        return Err(AutopatchError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > 1_048_576 {
        return Err(AutopatchError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    let config: AutopatchConfig = serde_yaml::from_str(&content)
        .map_err(|e| AutopatchError::Config(format!("{}: {}", path.display(), e)))?;

    validate_config(&config)?;
    Ok(config)
}

/// Overlay process environment onto a loaded configuration.
///
/// `lookup` is `std::env::var` in the binary; tests pass a closure.
pub fn apply_env_overrides<F>(mut config: AutopatchConfig, lookup: F) -> AutopatchConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(WEBHOOK_ENV).filter(|v| !v.trim().is_empty()) {
        config.webhook_url = Some(url);
    }
    if let Some(root) = lookup(TRUST_ROOT_ENV).filter(|v| !v.trim().is_empty()) {
        config.trust_root = PathBuf::from(root);
    }
    config
}

/// Detect values that would make a run meaningless or unsafe.
pub fn validate_config(config: &AutopatchConfig) -> Result<(), AutopatchError> {
    if config.workers == 0 {
        return Err(AutopatchError::Config("workers must be at least 1".into()));
    }
    if config.step_timeout_secs == 0 {
        return Err(AutopatchError::Config("step_timeout_secs must be greater than 0".into()));
    }
    if config.notify_timeout_secs == 0 {
        return Err(AutopatchError::Config("notify_timeout_secs must be greater than 0".into()));
    }
    if config.lib_dir.is_absolute()
        || config.lib_dir.components().any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(AutopatchError::Config(format!(
            "lib_dir must stay inside the project: {}",
            config.lib_dir.display()
        )));
    }
    if let Some(url) = &config.webhook_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AutopatchError::Config(format!("webhook_url is not an http(s) URL: {}", url)));
        }
        if url.starts_with("http://") {
            warn!("Webhook configured over plain http");
        }
    }
    Ok(())
}

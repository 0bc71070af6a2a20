//! Config loading and manager construction shared by the commands.

use std::path::{Path, PathBuf};

use anyhow::Context;
use console::{style, Emoji};
use vaultkeep_core::config::ProviderKind;
use vaultkeep_core::error::ConfigError;
use vaultkeep_core::{paths, Config};
use vaultkeep_secrets::{LocalSecretStore, SecretManager};

pub static CHECK: Emoji = Emoji("✓", "+");
pub static CROSS: Emoji = Emoji("✗", "x");
pub static WARN: Emoji = Emoji("⚠", "!");

/// The config file to read and write.
pub fn config_path(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(paths::config_file()?),
    }
}

/// Load the config file as written, without environment overrides.
///
/// A missing file yields the defaults.
pub fn load_file_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let path = config_path(explicit)?;
    match Config::load(&path) {
        Ok(config) => Ok(config),
        Err(ConfigError::NotFound(_)) => Ok(Config::default()),
        Err(e) => Err(e).with_context(|| format!("failed to load {}", path.display())),
    }
}

/// Load the effective config: file (or defaults) plus `VAULTKEEP_*` overrides.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = load_file_config(explicit)?;
    config
        .apply_env_overrides()
        .context("invalid VAULTKEEP_* environment override")?;
    expand_local_paths(&mut config);
    Ok(config)
}

fn expand_local_paths(config: &mut Config) {
    let local = &mut config.secrets.local;
    if let Some(path) = local.store_path.to_str() {
        local.store_path = paths::expand_tilde(path);
    }
    if let Some(path) = local.backup_path.to_str() {
        local.backup_path = paths::expand_tilde(path);
    }
}

/// Build the secret manager, reporting a provider fallback on stderr.
pub async fn open_manager(config: &Config) -> anyhow::Result<SecretManager> {
    let manager = SecretManager::from_config(&config.secrets)
        .await
        .context("failed to initialize secret provider")?;

    if let Some(fallback) = manager.fallback() {
        eprintln!(
            "{} provider '{}' unavailable ({}); using environment variables",
            style(WARN).yellow(),
            fallback.requested,
            fallback.reason
        );
    }
    Ok(manager)
}

/// The local store behind `manager`, or an error naming the active provider.
pub fn require_local<'a>(manager: &'a SecretManager, what: &str) -> anyhow::Result<&'a LocalSecretStore> {
    manager.local_store().with_context(|| {
        format!(
            "{what} needs the '{}' provider, but '{}' is active",
            ProviderKind::Local,
            manager.provider_name()
        )
    })
}

/// Read a value from the terminal without echo.
pub fn prompt_secret(prompt: &str) -> anyhow::Result<String> {
    let value = rpassword::prompt_password(prompt).context("failed to read from terminal")?;
    if value.is_empty() {
        anyhow::bail!("value must not be empty");
    }
    Ok(value)
}

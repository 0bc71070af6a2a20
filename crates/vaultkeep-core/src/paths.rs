//! Path resolution utilities.

use crate::env::{get_var, vars};
use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the VaultKeep base directory (~/.vaultkeep, or `VAULTKEEP_HOME`).
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    if let Some(home) = get_var(vars::VAULTKEEP_HOME) {
        return Ok(expand_tilde(&home));
    }
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".vaultkeep"))
}

/// Get the main config file path (~/.vaultkeep/vaultkeep.json5).
pub fn config_file() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("vaultkeep.json5"))
}

/// Get the default encrypted vault path (~/.vaultkeep/secrets.vault.json).
pub fn vault_file() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("secrets.vault.json"))
}

/// Get the default backup directory (~/.vaultkeep/backups).
pub fn backups_dir() -> Result<PathBuf, ConfigError> {
    Ok(base_dir()?.join("backups"))
}

/// Path of the salt file stored beside a vault file (`<vault>.salt`).
pub fn salt_file_for(vault: &Path) -> PathBuf {
    sibling_with_suffix(vault, "salt")
}

/// Path of the advisory lock file stored beside a vault file (`<vault>.lock`).
pub fn lock_file_for(vault: &Path) -> PathBuf {
    sibling_with_suffix(vault, "lock")
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Expand tilde (~) in a path.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

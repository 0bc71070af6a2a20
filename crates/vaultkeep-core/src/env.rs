//! Environment variable handling.

use std::env;

/// Get an environment variable, returning None if not set or empty.
pub fn get_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
pub fn get_var_or(name: &str, default: &str) -> String {
    get_var(name).unwrap_or_else(|| default.to_string())
}

/// Parse a boolean-ish string ("1", "true", "yes", "on").
pub fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Get an environment variable as a boolean.
pub fn get_bool(name: &str) -> bool {
    get_var(name).map(|v| parse_bool(&v)).unwrap_or(false)
}

/// Get an environment variable as an optional boolean (None when unset).
pub fn get_opt_bool(name: &str) -> Option<bool> {
    get_var(name).map(|v| parse_bool(&v))
}

/// Get an environment variable as a u32.
pub fn get_u32(name: &str) -> Option<u32> {
    get_var(name).and_then(|v| v.parse().ok())
}

/// Environment variable names recognised by VaultKeep.
pub mod vars {
    /// VaultKeep home directory override.
    pub const VAULTKEEP_HOME: &str = "VAULTKEEP_HOME";

    /// VaultKeep config file override.
    pub const VAULTKEEP_CONFIG: &str = "VAULTKEEP_CONFIG";

    /// Provider kind override (`env`, `local`, `memory`, ...).
    pub const VAULTKEEP_PROVIDER: &str = "VAULTKEEP_PROVIDER";

    /// Master passphrase for the encrypted local store.
    pub const VAULTKEEP_MASTER_PASSPHRASE: &str = "VAULTKEEP_MASTER_PASSPHRASE";

    /// Vault file location override.
    pub const VAULTKEEP_STORE_PATH: &str = "VAULTKEEP_STORE_PATH";

    /// Backup directory override.
    pub const VAULTKEEP_BACKUP_PATH: &str = "VAULTKEEP_BACKUP_PATH";

    /// Auto-backup toggle.
    pub const VAULTKEEP_AUTO_BACKUP: &str = "VAULTKEEP_AUTO_BACKUP";

    /// VaultKeep log level.
    pub const VAULTKEEP_LOG: &str = "VAULTKEEP_LOG";
}

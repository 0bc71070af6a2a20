//! Configuration loading and persistence.

use super::{Config, ProviderKind};
use crate::env::{self, vars};
use crate::error::ConfigError;
use crate::paths;
use crate::secret::SecretString;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Smallest accepted PBKDF2 iteration count.
const MIN_KDF_ITERATIONS: u32 = 1_000;

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = paths::config_file()?;
        Self::load(&path)
    }

    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Syntax(e.to_string()))
    }

    /// Save configuration to the default path.
    pub fn save_default(&self) -> Result<(), ConfigError> {
        let path = paths::config_file()?;
        self.save(&path)
    }

    /// Save configuration to a file path.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Write atomically, owner-only: the file may carry the master passphrase.
        let temp_path = path.with_extension("tmp");
        write_private(&temp_path, content.as_bytes())?;
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        Ok(())
    }

    /// Serialize to JSON5 string.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 doesn't have a serializer, so we use serde_json with pretty print
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Validate the configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let secrets = &self.secrets;

        if secrets.rotation.interval_days == 0 {
            errors.push("Rotation intervalDays must be greater than 0".to_string());
        }
        if secrets.rotation.notify_before_days > secrets.rotation.interval_days {
            errors.push(format!(
                "Rotation notifyBeforeDays ({}) exceeds intervalDays ({})",
                secrets.rotation.notify_before_days, secrets.rotation.interval_days
            ));
        }

        if secrets.local.max_backups == 0 {
            errors.push("Local store maxBackups must be at least 1".to_string());
        }
        if secrets.local.kdf_iterations < MIN_KDF_ITERATIONS {
            errors.push(format!(
                "Local store kdfIterations must be at least {}, got {}",
                MIN_KDF_ITERATIONS, secrets.local.kdf_iterations
            ));
        }
        if secrets.local.store_path.as_os_str().is_empty() {
            errors.push("Local store storePath must not be empty".to_string());
        }

        for (i, key) in secrets.required.iter().enumerate() {
            if key.trim().is_empty() {
                errors.push(format!("Required key [{}] must not be empty", i));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }

    /// Load configuration from the default path, falling back to defaults if no file exists.
    ///
    /// Environment overrides are applied in both cases.
    pub fn load_or_default() -> Self {
        let mut config = match Self::load_default() {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => Self::default(),
            Err(e) => {
                tracing::warn!("ignoring unreadable config file: {e}");
                Self::default()
            }
        };
        if let Err(e) = config.apply_env_overrides() {
            tracing::warn!("ignoring invalid environment override: {e}");
        }
        config
    }

    /// Apply `VAULTKEEP_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(env::get_var)
    }

    /// Apply overrides using an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(kind) = lookup(vars::VAULTKEEP_PROVIDER) {
            self.secrets.provider = kind.parse::<ProviderKind>()?;
        }
        if let Some(passphrase) = lookup(vars::VAULTKEEP_MASTER_PASSPHRASE) {
            self.secrets.local.master_passphrase = Some(SecretString::new(passphrase));
        }
        if let Some(path) = lookup(vars::VAULTKEEP_STORE_PATH) {
            self.secrets.local.store_path = paths::expand_tilde(&path);
        }
        if let Some(path) = lookup(vars::VAULTKEEP_BACKUP_PATH) {
            self.secrets.local.backup_path = paths::expand_tilde(&path);
        }
        if let Some(flag) = lookup(vars::VAULTKEEP_AUTO_BACKUP) {
            self.secrets.local.auto_backup = env::parse_bool(&flag);
        }
        if let Some(level) = lookup(vars::VAULTKEEP_LOG) {
            self.logging.level = level;
        }
        Ok(())
    }
}

/// Create or truncate `path` with mode 0600 on Unix and write `data`.
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(data)?;
    file.sync_all()?;

    // An existing file keeps its old mode through open.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

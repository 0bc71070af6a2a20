//! Configuration schema definitions.

use crate::error::ConfigError;
use crate::paths;
use crate::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Main VaultKeep configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Secret provider and policy settings.
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Secrets configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretsConfig {
    /// Which backend the manager instantiates.
    #[serde(default)]
    pub provider: ProviderKind,

    /// Keys that must be present for `validate` to pass.
    #[serde(default)]
    pub required: Vec<String>,

    /// Rotation policy.
    #[serde(default)]
    pub rotation: RotationConfig,

    /// Encrypted local store settings.
    #[serde(default)]
    pub local: LocalStoreConfig,

    /// Environment provider settings.
    #[serde(default)]
    pub env: EnvProviderConfig,

    /// Connection settings for remote providers, keyed by provider kind.
    ///
    /// Passed verbatim to externally registered provider factories.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub remote: HashMap<String, serde_json::Value>,
}

/// Secret backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Process environment variables.
    Env,
    /// Encrypted file-backed store.
    #[default]
    Local,
    /// Process memory, lost on exit.
    Memory,
    /// HashiCorp Vault KV.
    Vault,
    /// AWS Secrets Manager.
    Aws,
    /// Azure Key Vault.
    Azure,
    /// Google Cloud Secret Manager.
    Gcp,
}

impl ProviderKind {
    /// All known provider kinds.
    pub const ALL: [ProviderKind; 7] = [
        ProviderKind::Env,
        ProviderKind::Local,
        ProviderKind::Memory,
        ProviderKind::Vault,
        ProviderKind::Aws,
        ProviderKind::Azure,
        ProviderKind::Gcp,
    ];

    /// Stable lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Env => "env",
            ProviderKind::Local => "local",
            ProviderKind::Memory => "memory",
            ProviderKind::Vault => "vault",
            ProviderKind::Aws => "aws",
            ProviderKind::Azure => "azure",
            ProviderKind::Gcp => "gcp",
        }
    }

    /// Whether the backend is a remote service rather than in-process state.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ProviderKind::Vault | ProviderKind::Aws | ProviderKind::Azure | ProviderKind::Gcp
        )
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ProviderKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownProvider(s.to_string()))
    }
}

/// Rotation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotationConfig {
    /// Whether `validate` reports keys due for rotation.
    #[serde(default)]
    pub enabled: bool,

    /// Days between rotations.
    #[serde(default = "default_interval_days")]
    pub interval_days: u32,

    /// Days before the due date at which a rotation is reported as upcoming.
    #[serde(default = "default_notify_before_days")]
    pub notify_before_days: u32,
}

fn default_interval_days() -> u32 {
    90
}

fn default_notify_before_days() -> u32 {
    7
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_days: default_interval_days(),
            notify_before_days: default_notify_before_days(),
        }
    }
}

/// Encrypted local store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalStoreConfig {
    /// Master passphrase. Falls back to `VAULTKEEP_MASTER_PASSPHRASE`, then to
    /// a generated, non-persisted passphrase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_passphrase: Option<SecretString>,

    /// Vault file location.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Backup directory.
    #[serde(default = "default_backup_path")]
    pub backup_path: PathBuf,

    /// Back up the vault file before every mutation.
    #[serde(default = "default_true")]
    pub auto_backup: bool,

    /// Number of backups retained.
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,

    /// Take an exclusive advisory lock on `<vault>.lock` while mutating.
    #[serde(default = "default_true")]
    pub file_lock: bool,

    /// PBKDF2-HMAC-SHA256 iteration count.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
}

fn default_store_path() -> PathBuf {
    paths::vault_file().unwrap_or_else(|_| PathBuf::from("secrets.vault.json"))
}

fn default_backup_path() -> PathBuf {
    paths::backups_dir().unwrap_or_else(|_| PathBuf::from("backups"))
}

fn default_true() -> bool {
    true
}

fn default_max_backups() -> usize {
    10
}

/// Default PBKDF2 iteration count.
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

fn default_kdf_iterations() -> u32 {
    DEFAULT_KDF_ITERATIONS
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            master_passphrase: None,
            store_path: default_store_path(),
            backup_path: default_backup_path(),
            auto_backup: true,
            max_backups: default_max_backups(),
            file_lock: true,
            kdf_iterations: default_kdf_iterations(),
        }
    }
}

impl LocalStoreConfig {
    /// Settings for a store rooted in `dir`, with vault and backups side by side.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            store_path: dir.join("secrets.vault.json"),
            backup_path: dir.join("backups"),
            ..Self::default()
        }
    }

    /// Set the master passphrase.
    pub fn with_passphrase(mut self, passphrase: impl Into<SecretString>) -> Self {
        self.master_passphrase = Some(passphrase.into());
        self
    }
}

/// Environment provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvProviderConfig {
    /// Prefix prepended to every key when mapping to a variable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

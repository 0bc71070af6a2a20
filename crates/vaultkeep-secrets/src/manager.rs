//! The secret manager: one active provider plus cross-provider policy.
//!
//! [`SecretManager`] is what the rest of an application talks to. It adds
//! required-key validation, rotation bookkeeping, migration between providers
//! and startup fallback to the environment provider. Construct one at startup
//! and pass it (usually as `Arc<SecretManager>`) to consumers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use vaultkeep_core::config::{ProviderKind, RotationConfig, SecretsConfig};
use vaultkeep_core::SecretString;

use crate::env::EnvProvider;
use crate::error::{Result, SecretError};
use crate::local::LocalSecretStore;
use crate::provider::{validate_key, SecretProvider};
use crate::registry::ProviderRegistry;
use crate::types::{
    BackupInfo, DecryptedSecret, MigrationFailure, MigrationResult, SecretMetadata,
    ValidationResult,
};

/// Why the manager is running on the environment provider instead of the
/// configured one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    /// The provider kind the configuration asked for.
    pub requested: ProviderKind,
    /// The construction error.
    pub reason: String,
}

/// A key whose rotation falls due soon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationNotice {
    pub key: String,
    pub due_at: DateTime<Utc>,
}

/// Orchestrates one active [`SecretProvider`].
pub struct SecretManager {
    provider: Arc<dyn SecretProvider>,
    fallback: Option<Fallback>,
    required: RwLock<Vec<String>>,
    rotation: RotationConfig,
}

impl SecretManager {
    /// Wrap an already constructed provider.
    pub fn new(provider: Arc<dyn SecretProvider>, config: &SecretsConfig) -> Self {
        Self {
            provider,
            fallback: None,
            required: RwLock::new(config.required.clone()),
            rotation: config.rotation.clone(),
        }
    }

    /// Build the configured provider with the built-in registry.
    pub async fn from_config(config: &SecretsConfig) -> Result<Self> {
        Self::from_config_with(&ProviderRegistry::with_builtins(), config).await
    }

    /// Build the configured provider from `registry`.
    ///
    /// A provider that is not compiled in or is misconfigured is replaced by
    /// the environment provider with a warning. Other errors (an unreadable
    /// vault, a missing salt) are returned.
    pub async fn from_config_with(registry: &ProviderRegistry, config: &SecretsConfig) -> Result<Self> {
        let requested = config.provider;
        match registry.create(requested, config).await {
            Ok(provider) => {
                info!(provider = provider.name(), "secret manager ready");
                Ok(Self::new(provider, config))
            }
            Err(e) if e.is_configuration() => {
                match &e {
                    SecretError::NotCompiledIn(_) => warn!(
                        provider = %requested,
                        "provider is not compiled into this build; falling back to environment variables"
                    ),
                    _ => warn!(
                        provider = %requested,
                        error = %e,
                        "provider is misconfigured; falling back to environment variables"
                    ),
                }
                let mut manager = Self::new(Arc::new(EnvProvider::from_config(&config.env)), config);
                manager.fallback = Some(Fallback {
                    requested,
                    reason: e.to_string(),
                });
                Ok(manager)
            }
            Err(e) => {
                error!(provider = %requested, error = %e, "failed to initialize secret provider");
                Err(e)
            }
        }
    }

    /// The active provider.
    pub fn provider(&self) -> &Arc<dyn SecretProvider> {
        &self.provider
    }

    /// Name of the active provider.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Set when startup fell back to the environment provider.
    pub fn fallback(&self) -> Option<&Fallback> {
        self.fallback.as_ref()
    }

    /// The rotation policy in effect.
    pub fn rotation_policy(&self) -> &RotationConfig {
        &self.rotation
    }

    // ---- provider operations -------------------------------------------

    pub async fn get(&self, key: &str) -> Option<DecryptedSecret> {
        let value = self.provider.get(key).await;
        debug!(key, op = "get", found = value.is_some(), "secret lookup");
        value
    }

    /// Like [`get`](Self::get) but absence is an error.
    pub async fn get_or_throw(&self, key: &str) -> Result<DecryptedSecret> {
        self.get(key).await.ok_or_else(|| {
            warn!(key, op = "get_or_throw", provider = self.provider_name(), "required secret missing");
            SecretError::MissingSecret(key.to_string())
        })
    }

    pub async fn set(&self, key: &str, value: &str, expires_at: Option<DateTime<Utc>>) -> Result<()> {
        self.provider
            .set(key, value, expires_at)
            .await
            .map_err(|e| self.log_failure("set", key, e))
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.provider
            .delete(key)
            .await
            .map_err(|e| self.log_failure("delete", key, e))
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        self.provider
            .list()
            .await
            .map_err(|e| self.log_failure("list", "*", e))
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.provider.exists(key).await
    }

    pub async fn get_metadata(&self, key: &str) -> Option<SecretMetadata> {
        self.provider.get_metadata(key).await
    }

    pub async fn rotate(&self, key: &str, new_value: &str) -> Result<()> {
        self.provider
            .rotate(key, new_value)
            .await
            .map_err(|e| self.log_failure("rotate", key, e))?;
        info!(key, provider = self.provider_name(), "rotated secret");
        Ok(())
    }

    pub async fn health_check(&self) -> bool {
        let healthy = self.provider.health_check().await;
        if !healthy {
            error!(provider = self.provider_name(), "secret provider health check failed");
        }
        healthy
    }

    fn log_failure(&self, op: &'static str, key: &str, err: SecretError) -> SecretError {
        warn!(key, op, provider = self.provider_name(), error = %err, "secret operation failed");
        err
    }

    // ---- required keys -------------------------------------------------

    /// The current required-key list.
    pub async fn required_keys(&self) -> Vec<String> {
        self.required.read().await.clone()
    }

    /// Replace the required-key list.
    pub async fn set_required_keys(&self, keys: Vec<String>) -> Result<()> {
        for key in &keys {
            validate_key(key)?;
        }
        let mut deduped: Vec<String> = Vec::with_capacity(keys.len());
        for key in keys {
            if !deduped.contains(&key) {
                deduped.push(key);
            }
        }
        *self.required.write().await = deduped;
        Ok(())
    }

    /// Add a required key. Returns `false` if it was already listed.
    pub async fn add_required_key(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let mut required = self.required.write().await;
        if required.iter().any(|k| k == key) {
            return Ok(false);
        }
        required.push(key.to_string());
        Ok(true)
    }

    /// Remove a required key. Returns `false` if it was not listed.
    pub async fn remove_required_key(&self, key: &str) -> bool {
        let mut required = self.required.write().await;
        let before = required.len();
        required.retain(|k| k != key);
        required.len() != before
    }

    // ---- policy ----------------------------------------------------------

    /// Validate the configured required keys.
    pub async fn validate(&self) -> ValidationResult {
        let keys = self.required_keys().await;
        self.validate_keys(&keys).await
    }

    /// Validate an explicit key list.
    ///
    /// A key that cannot be read counts as missing. Expired keys make the
    /// result invalid; keys due for rotation are reported but do not.
    pub async fn validate_keys(&self, keys: &[String]) -> ValidationResult {
        let now = Utc::now();
        let mut result = ValidationResult::default();

        for key in keys {
            if self.provider.get(key).await.is_none() {
                result.missing.push(key.clone());
                continue;
            }
            let Some(metadata) = self.provider.get_metadata(key).await else {
                continue;
            };
            if metadata.is_expired(now) {
                result.expired.push(key.clone());
            }
            if self.rotation.enabled && now > metadata.rotation_due_at(self.rotation.interval_days) {
                result.requires_rotation.push(key.clone());
            }
        }

        result.valid = result.missing.is_empty() && result.expired.is_empty();
        if result.valid {
            debug!(checked = keys.len(), "required secrets valid");
        } else {
            warn!(
                missing = ?result.missing,
                expired = ?result.expired,
                "required secret validation failed"
            );
        }
        if !result.requires_rotation.is_empty() {
            info!(keys = ?result.requires_rotation, "secrets due for rotation");
        }
        result
    }

    /// Keys whose rotation falls due within `notifyBeforeDays` but is not yet
    /// overdue, soonest first. Empty when rotation is disabled.
    pub async fn upcoming_rotations(&self, keys: &[String]) -> Vec<RotationNotice> {
        if !self.rotation.enabled {
            return Vec::new();
        }
        let now = Utc::now();
        let window = Duration::days(i64::from(self.rotation.notify_before_days));

        let mut notices = Vec::new();
        for key in keys {
            let Some(metadata) = self.provider.get_metadata(key).await else {
                continue;
            };
            let due_at = metadata.rotation_due_at(self.rotation.interval_days);
            if due_at >= now && due_at - now <= window {
                notices.push(RotationNotice {
                    key: key.clone(),
                    due_at,
                });
            }
        }
        notices.sort_by_key(|notice| notice.due_at);
        notices
    }

    /// Copy secrets into `target`.
    ///
    /// `keys` defaults to every key of the active provider. Per-key failures
    /// are collected and the remaining keys are still processed. Only a
    /// failure to list the source keys is returned as an error.
    pub async fn migrate(
        &self,
        target: &dyn SecretProvider,
        keys: Option<&[String]>,
    ) -> Result<MigrationResult> {
        let keys = match keys {
            Some(keys) => keys.to_vec(),
            None => self.list().await?,
        };
        info!(
            from = self.provider_name(),
            to = target.name(),
            total = keys.len(),
            "starting secret migration"
        );

        let mut result = MigrationResult {
            total: keys.len(),
            ..MigrationResult::default()
        };

        for key in keys {
            match self.migrate_one(target, &key).await {
                Ok(()) => {
                    debug!(key = %key, op = "migrate", "migrated secret");
                    result.migrated.push(key);
                }
                Err(e) => {
                    warn!(key = %key, op = "migrate", error = %e, "failed to migrate secret");
                    result.failed.push(MigrationFailure {
                        key,
                        error: e.to_string(),
                    });
                }
            }
        }

        result.success = result.failed.is_empty();
        info!(
            migrated = result.migrated.len(),
            failed = result.failed.len(),
            "secret migration finished"
        );
        Ok(result)
    }

    async fn migrate_one(&self, target: &dyn SecretProvider, key: &str) -> Result<()> {
        let value = self
            .provider
            .get(key)
            .await
            .ok_or_else(|| SecretError::KeyNotFound(key.to_string()))?;
        let expires_at = self
            .provider
            .get_metadata(key)
            .await
            .and_then(|metadata| metadata.expires_at);
        target.set(key, value.expose(), expires_at).await
    }

    // ---- local store maintenance ------------------------------------------

    /// The active provider as an encrypted local store, if it is one.
    pub fn local_store(&self) -> Option<&LocalSecretStore> {
        self.provider.as_any().downcast_ref::<LocalSecretStore>()
    }

    fn require_local(&self, operation: &str) -> Result<&LocalSecretStore> {
        self.local_store().ok_or_else(|| SecretError::Unsupported {
            provider: self.provider_name().to_string(),
            operation: operation.to_string(),
        })
    }

    /// See [`LocalSecretStore::export`].
    pub async fn export(&self) -> Result<String> {
        self.require_local("export")?.export().await
    }

    /// See [`LocalSecretStore::import`].
    pub async fn import(&self, data: &str) -> Result<usize> {
        self.require_local("import")?
            .import(data)
            .await
            .map_err(|e| self.log_failure("import", "*", e))
    }

    /// See [`LocalSecretStore::re_encrypt`].
    pub async fn re_encrypt(&self, new_passphrase: &SecretString) -> Result<usize> {
        self.require_local("reencrypt")?
            .re_encrypt(new_passphrase)
            .await
            .map_err(|e| self.log_failure("reencrypt", "*", e))
    }

    /// See [`LocalSecretStore::list_backups`].
    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        self.require_local("list backups")?.list_backups().await
    }

    /// See [`LocalSecretStore::backup_now`].
    pub async fn backup_now(&self) -> Result<PathBuf> {
        self.require_local("backup")?.backup_now().await
    }

    /// See [`LocalSecretStore::restore_backup`].
    pub async fn restore_backup(&self, path: &Path) -> Result<usize> {
        self.require_local("restore backup")?
            .restore_backup(path)
            .await
            .map_err(|e| self.log_failure("restore", "*", e))
    }

    /// See [`LocalSecretStore::verify`].
    pub async fn verify(&self) -> Result<Vec<String>> {
        self.require_local("verify")?.verify().await
    }
}

//! Environment-variable backed provider.
//!
//! The universal fallback: always constructible, no persistence. Writes go to
//! the current process environment only. Versions are tracked in memory for
//! the lifetime of the provider; variables inherited from the parent process
//! start at version 1 when first observed.

use std::any::Any;
use std::collections::HashMap;
use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use vaultkeep_core::config::EnvProviderConfig;

use crate::error::{Result, SecretError};
use crate::provider::{validate_key, SecretProvider};
use crate::types::{DecryptedSecret, SecretMetadata};

const HEALTH_CHECK_VAR: &str = "__VAULTKEEP_ENV_HEALTH_CHECK";

/// Secret provider over process environment variables.
pub struct EnvProvider {
    prefix: String,
    metadata: Mutex<HashMap<String, SecretMetadata>>,
}

impl Default for EnvProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvProvider {
    /// Provider mapping keys to variables of the same name.
    pub fn new() -> Self {
        Self::with_prefix("")
    }

    /// Provider mapping key `K` to variable `{prefix}K`.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            metadata: Mutex::new(HashMap::new()),
        }
    }

    /// Build from the `secrets.env` config section.
    pub fn from_config(config: &EnvProviderConfig) -> Self {
        Self::with_prefix(config.prefix.clone().unwrap_or_default())
    }

    fn var_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn read_var(&self, key: &str) -> Option<String> {
        if validate_env_key(key).is_err() {
            return None;
        }
        match env::var(self.var_name(key)) {
            Ok(value) => Some(value),
            Err(env::VarError::NotPresent) => None,
            Err(env::VarError::NotUnicode(_)) => {
                warn!(key, op = "get", "environment variable is not valid UTF-8");
                None
            }
        }
    }
}

/// Environment variable names cannot contain `=` or NUL.
fn validate_env_key(key: &str) -> Result<()> {
    validate_key(key)?;
    if key.contains('=') || key.contains('\0') {
        return Err(SecretError::InvalidKey(format!(
            "environment keys must not contain '=' or NUL: {key}"
        )));
    }
    Ok(())
}

#[async_trait]
impl SecretProvider for EnvProvider {
    fn name(&self) -> &str {
        "env"
    }

    async fn get(&self, key: &str) -> Option<DecryptedSecret> {
        self.read_var(key).map(DecryptedSecret::new)
    }

    async fn set(&self, key: &str, value: &str, expires_at: Option<DateTime<Utc>>) -> Result<()> {
        validate_env_key(key)?;
        let now = Utc::now();

        let mut metadata = self.metadata.lock().await;
        let next = match metadata.get(key) {
            Some(current) => current.next_version(now, expires_at),
            None if self.read_var(key).is_some() => {
                // Inherited variable: first observation counts as version 1.
                SecretMetadata::new(key, now, None).next_version(now, expires_at)
            }
            None => SecretMetadata::new(key, now, expires_at),
        };

        env::set_var(self.var_name(key), value);
        debug!(key, version = next.version, "set environment secret");
        metadata.insert(key.to_string(), next);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_env_key(key)?;
        let mut metadata = self.metadata.lock().await;
        metadata.remove(key);
        if env::var_os(self.var_name(key)).is_some() {
            env::remove_var(self.var_name(key));
            debug!(key, "deleted environment secret");
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = env::vars_os()
            .filter_map(|(name, _)| name.into_string().ok())
            .filter_map(|name| name.strip_prefix(self.prefix.as_str()).map(str::to_string))
            .filter(|key| !key.is_empty() && key != HEALTH_CHECK_VAR)
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn exists(&self, key: &str) -> bool {
        validate_env_key(key).is_ok() && env::var_os(self.var_name(key)).is_some()
    }

    async fn get_metadata(&self, key: &str) -> Option<SecretMetadata> {
        if !self.exists(key).await {
            return None;
        }
        let mut metadata = self.metadata.lock().await;
        let entry = metadata
            .entry(key.to_string())
            .or_insert_with(|| SecretMetadata::new(key, Utc::now(), None));
        Some(entry.clone())
    }

    async fn rotate(&self, key: &str, new_value: &str) -> Result<()> {
        validate_env_key(key)?;
        if self.read_var(key).is_none() {
            return Err(SecretError::KeyNotFound(key.to_string()));
        }
        let now = Utc::now();

        let mut metadata = self.metadata.lock().await;
        let current = metadata
            .remove(key)
            .unwrap_or_else(|| SecretMetadata::new(key, now, None));
        let next = current.rotated(now);

        env::set_var(self.var_name(key), new_value);
        debug!(key, version = next.version, "rotated environment secret");
        metadata.insert(key.to_string(), next);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let probe = format!("ok-{}", std::process::id());
        env::set_var(HEALTH_CHECK_VAR, &probe);
        let round_trip = env::var(HEALTH_CHECK_VAR).ok();
        env::remove_var(HEALTH_CHECK_VAR);
        round_trip.as_deref() == Some(probe.as_str())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

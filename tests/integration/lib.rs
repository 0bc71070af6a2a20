//! Fixtures shared by the integration test binaries.

use std::any::Any;
use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use vaultkeep_core::config::LocalStoreConfig;
use vaultkeep_secrets::{
    DecryptedSecret, MemoryProvider, Result, SecretError, SecretMetadata, SecretProvider,
};

/// Iteration count used where the KDF cost is not under test.
pub const FAST_KDF_ITERATIONS: u32 = 1_000;

/// Local store settings rooted in `dir`.
pub fn local_config(dir: &Path, passphrase: &str) -> LocalStoreConfig {
    let mut config = LocalStoreConfig::in_dir(dir).with_passphrase(passphrase);
    config.kdf_iterations = FAST_KDF_ITERATIONS;
    config
}

pub fn read_vault_json(path: &Path) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

pub fn write_vault_json(path: &Path, vault: &Value) {
    std::fs::write(path, serde_json::to_string_pretty(vault).unwrap()).unwrap();
}

/// Change the first base64 character of `field` in the record for `key`.
pub fn corrupt_field(path: &Path, key: &str, field: &str) {
    let mut vault = read_vault_json(path);
    let record = vault["secrets"]
        .as_array_mut()
        .unwrap()
        .iter_mut()
        .find(|r| r["key"] == key)
        .unwrap();
    let encoded = record[field].as_str().unwrap().to_string();
    let flipped = if encoded.starts_with('A') { "B" } else { "A" };
    record[field] = Value::String(format!("{flipped}{}", &encoded[1..]));
    write_vault_json(path, &vault);
}

/// In-memory provider whose `set` fails for a fixed set of keys.
#[derive(Default)]
pub struct RejectingProvider {
    inner: MemoryProvider,
    rejected: HashSet<String>,
}

impl RejectingProvider {
    pub fn rejecting<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: MemoryProvider::new(),
            rejected: keys.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl SecretProvider for RejectingProvider {
    fn name(&self) -> &str {
        "rejecting"
    }

    async fn get(&self, key: &str) -> Option<DecryptedSecret> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, expires_at: Option<DateTime<Utc>>) -> Result<()> {
        if self.rejected.contains(key) {
            return Err(SecretError::ProviderUnavailable(format!("refusing to store {key}")));
        }
        self.inner.set(key, value, expires_at).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn list(&self) -> Result<Vec<String>> {
        self.inner.list().await
    }

    async fn exists(&self, key: &str) -> bool {
        self.inner.exists(key).await
    }

    async fn get_metadata(&self, key: &str) -> Option<SecretMetadata> {
        self.inner.get_metadata(key).await
    }

    async fn rotate(&self, key: &str, new_value: &str) -> Result<()> {
        self.inner.rotate(key, new_value).await
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

//! In-process provider. Contents are lost when the process exits.

use std::any::Any;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use vaultkeep_core::SecretString;

use crate::error::{Result, SecretError};
use crate::provider::{validate_key, SecretProvider};
use crate::types::{DecryptedSecret, SecretMetadata};

struct Entry {
    value: SecretString,
    metadata: SecretMetadata,
}

/// Secret provider backed by a map in process memory.
#[derive(Default)]
pub struct MemoryProvider {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl MemoryProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no keys are stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl SecretProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Option<DecryptedSecret> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .map(|entry| DecryptedSecret::new(entry.value.expose_secret()))
    }

    async fn set(&self, key: &str, value: &str, expires_at: Option<DateTime<Utc>>) -> Result<()> {
        validate_key(key)?;
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let metadata = match entries.get(key) {
            Some(current) => current.metadata.next_version(now, expires_at),
            None => SecretMetadata::new(key, now, expires_at),
        };
        debug!(key, version = metadata.version, "set in-memory secret");
        entries.insert(
            key.to_string(),
            Entry {
                value: SecretString::new(value),
                metadata,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn exists(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    async fn get_metadata(&self, key: &str) -> Option<SecretMetadata> {
        let entries = self.entries.read().await;
        entries.get(key).map(|entry| entry.metadata.clone())
    }

    async fn rotate(&self, key: &str, new_value: &str) -> Result<()> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(key)
            .ok_or_else(|| SecretError::KeyNotFound(key.to_string()))?;
        entry.metadata = entry.metadata.rotated(Utc::now());
        entry.value = SecretString::new(new_value);
        debug!(key, version = entry.metadata.version, "rotated in-memory secret");
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

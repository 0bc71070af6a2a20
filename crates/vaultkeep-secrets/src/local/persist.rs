//! On-disk format and file handling for the encrypted vault.
//!
//! The vault is one JSON document:
//!
//! ```json
//! {
//!   "schemaVersion": 1,
//!   "secrets": [
//!     { "key": "...", "encryptedValue": "<b64>", "iv": "<b64>", "authTag": "<b64>",
//!       "metadata": { "key": "...", "createdAt": "...", "updatedAt": "...", "version": 1 } }
//!   ],
//!   "createdAt": "...",
//!   "updatedAt": "...",
//!   "keyCheck": "<hex>"
//! }
//! ```
//!
//! `keyCheck` is the fingerprint of the key the records are sealed under.
//! Vaults written before it existed omit it.
//!
//! Vault, salt and backup files are created with mode `0600` on Unix and the
//! vault is replaced via temp file + rename.

use std::collections::HashSet;
use std::fs::OpenOptions as StdOpenOptions;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use vaultkeep_core::SecretString;

use crate::crypto::{self, DerivedKey, SALT_SIZE};
use crate::error::{Result, SecretError};
use crate::provider::validate_key;
use crate::types::SecretMetadata;

/// Current vault schema version.
pub(crate) const SCHEMA_VERSION: u32 = 1;

/// The whole vault document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VaultFile {
    pub schema_version: u32,
    pub secrets: Vec<EncryptedRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_check: Option<String>,
}

/// One encrypted secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EncryptedRecord {
    pub key: String,
    pub encrypted_value: String,
    pub iv: String,
    pub auth_tag: String,
    pub metadata: SecretMetadata,
}

impl VaultFile {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            secrets: Vec::new(),
            created_at: now,
            updated_at: now,
            key_check: None,
        }
    }

    /// Whether the records are sealed under `key`.
    ///
    /// Uses the stored fingerprint when there is one. Older vaults fall back
    /// to trying the first record; an empty vault matches any key.
    pub fn sealed_with(&self, key: &DerivedKey) -> bool {
        match &self.key_check {
            Some(check) => *check == key.fingerprint(),
            None => self.secrets.first().map_or(true, |r| r.open(key).is_ok()),
        }
    }

    pub fn find(&self, key: &str) -> Option<&EncryptedRecord> {
        self.secrets.iter().find(|r| r.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    /// Insert or replace the record with the same key.
    pub fn upsert(&mut self, record: EncryptedRecord) {
        match self.secrets.iter_mut().find(|r| r.key == record.key) {
            Some(slot) => *slot = record,
            None => self.secrets.push(record),
        }
    }

    /// Remove a record. Returns whether one was present.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.secrets.len();
        self.secrets.retain(|r| r.key != key);
        self.secrets.len() != before
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.secrets.iter().map(|r| r.key.clone()).collect();
        keys.sort();
        keys
    }

    /// Keys whose records fail to decrypt under `key`.
    pub fn undecryptable(&self, key: &DerivedKey) -> Vec<String> {
        self.secrets
            .iter()
            .filter(|r| r.open(key).is_err())
            .map(|r| r.key.clone())
            .collect()
    }
}

impl EncryptedRecord {
    /// Encrypt `value` under a fresh IV.
    pub fn seal(key: &DerivedKey, metadata: SecretMetadata, value: &[u8]) -> Result<Self> {
        let sealed = crypto::encrypt(key, metadata.key.as_bytes(), value)?;
        Ok(Self {
            key: metadata.key.clone(),
            encrypted_value: STANDARD.encode(&sealed.ciphertext),
            iv: STANDARD.encode(sealed.iv),
            auth_tag: STANDARD.encode(sealed.tag),
            metadata,
        })
    }

    /// Decrypt and authenticate the value.
    pub fn open(&self, key: &DerivedKey) -> Result<SecretString> {
        let ciphertext = decode_field(&self.key, "encryptedValue", &self.encrypted_value)?;
        let iv = decode_field(&self.key, "iv", &self.iv)?;
        let tag = decode_field(&self.key, "authTag", &self.auth_tag)?;

        let plaintext = crypto::decrypt(key, self.key.as_bytes(), &iv, &ciphertext, &tag)?;
        let value = String::from_utf8(plaintext)
            .map_err(|e| SecretError::DecryptionFailed(format!("invalid UTF-8: {e}")))?;
        Ok(SecretString::new(value))
    }
}

fn decode_field(key: &str, field: &str, value: &str) -> Result<Vec<u8>> {
    STANDARD.decode(value).map_err(|e| {
        SecretError::DecryptionFailed(format!("record '{key}': {field} is not valid base64: {e}"))
    })
}

/// Parse and shape-check a vault document.
///
/// Checks the top level (`schemaVersion` and a `secrets` array) before typed
/// deserialization so malformed payloads get a precise error.
pub(crate) fn parse_vault(data: &str) -> Result<VaultFile> {
    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| SecretError::InvalidImport(format!("not valid JSON: {e}")))?;

    let object = value
        .as_object()
        .ok_or_else(|| SecretError::InvalidImport("expected a JSON object".to_string()))?;

    let schema_version = object
        .get("schemaVersion")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| SecretError::InvalidImport("missing numeric schemaVersion".to_string()))?;
    if schema_version == 0 || schema_version > u64::from(SCHEMA_VERSION) {
        return Err(SecretError::InvalidImport(format!(
            "unsupported schemaVersion {schema_version} (supported: {SCHEMA_VERSION})"
        )));
    }

    if !object.get("secrets").is_some_and(serde_json::Value::is_array) {
        return Err(SecretError::InvalidImport(
            "missing secrets array".to_string(),
        ));
    }

    let vault: VaultFile = serde_json::from_value(value)
        .map_err(|e| SecretError::InvalidImport(format!("malformed vault: {e}")))?;

    let mut seen = HashSet::with_capacity(vault.secrets.len());
    for record in &vault.secrets {
        validate_key(&record.key).map_err(|e| SecretError::InvalidImport(e.to_string()))?;
        if !seen.insert(record.key.as_str()) {
            return Err(SecretError::InvalidImport(format!(
                "duplicate record for '{}'",
                record.key
            )));
        }
        if record.key != record.metadata.key {
            return Err(SecretError::InvalidImport(format!(
                "record '{}' carries metadata for '{}'",
                record.key, record.metadata.key
            )));
        }
    }

    Ok(vault)
}

/// Read the vault file.
pub(crate) async fn read_vault(path: &Path) -> Result<VaultFile> {
    let data = tokio::fs::read_to_string(path).await?;
    parse_vault(&data)
}

/// Replace the vault file atomically.
pub(crate) async fn write_vault(path: &Path, vault: &VaultFile) -> Result<()> {
    let json = serde_json::to_vec_pretty(vault)?;
    ensure_parent_dir(path).await?;

    let tmp = tmp_path(path);
    write_private_file(&tmp, &json).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    debug!(path = %path.display(), records = vault.secrets.len(), "wrote vault file");
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `data` to `path` with mode 0600 on Unix, flushing to disk.
pub(crate) async fn write_private_file(path: &Path, data: &[u8]) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(path, perms).await?;
    }

    Ok(())
}

/// Create a directory (mode 0700 on Unix) if it does not exist yet.
///
/// Existing directories keep their permissions.
pub(crate) async fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() || tokio::fs::try_exists(dir).await? {
        return Ok(());
    }
    tokio::fs::create_dir_all(dir).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        tokio::fs::set_permissions(dir, perms).await?;
    }

    Ok(())
}

async fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => ensure_private_dir(parent).await,
        None => Ok(()),
    }
}

/// Load the store's salt, creating it on first use.
///
/// An existing vault without a salt is an error: a new salt would derive a
/// different key and every record would silently read as absent.
pub(crate) async fn load_or_create_salt(
    salt_path: &Path,
    vault_exists: bool,
) -> Result<[u8; SALT_SIZE]> {
    if tokio::fs::try_exists(salt_path).await? {
        let bytes = tokio::fs::read(salt_path).await?;
        let salt: [u8; SALT_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            SecretError::Storage(format!(
                "salt file {} must hold {SALT_SIZE} bytes, found {}",
                salt_path.display(),
                bytes.len()
            ))
        })?;
        return Ok(salt);
    }

    if vault_exists {
        return Err(SecretError::SaltMissing(salt_path.to_path_buf()));
    }

    let salt = crypto::generate_salt();
    ensure_parent_dir(salt_path).await?;
    write_private_file(salt_path, &salt).await?;
    debug!(path = %salt_path.display(), "generated new vault salt");
    Ok(salt)
}

/// Exclusive advisory lock on `<vault>.lock`, released on drop.
pub(crate) struct VaultLock {
    file: Option<std::fs::File>,
}

impl VaultLock {
    /// Block (off the async runtime) until the lock is held.
    pub async fn acquire(path: &Path) -> Result<Self> {
        ensure_parent_dir(path).await?;
        let path = path.to_path_buf();
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            let file = StdOpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(|e| SecretError::Storage(format!("lock task failed: {e}")))??;

        Ok(Self { file: Some(file) })
    }

    /// A no-op lock for stores configured without file locking.
    pub fn disabled() -> Self {
        Self { file: None }
    }
}

impl Drop for VaultLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = fs2::FileExt::unlock(&file);
        }
    }
}

//! Encrypted, file-backed secret store.
//!
//! All records live in a single vault file (see [`persist`] for the format),
//! each value sealed with AES-256-GCM under a key derived from the master
//! passphrase via PBKDF2-HMAC-SHA256 and a per-store salt kept in
//! `<vault>.salt`.
//!
//! Every mutation runs the same cycle while holding the in-process mutex and,
//! when `fileLock` is enabled, an exclusive lock on `<vault>.lock`:
//!
//! 1. reload the vault file from disk (another process may have written it)
//!    and refuse to go on if its `keyCheck` names a different key
//! 2. apply the change to a copy of the records
//! 3. back up the current vault file (best effort)
//! 4. write the copy to disk via temp file + rename
//! 5. swap the copy in as the live state
//!
//! A failure in step 1, 2 or 4 leaves the vault file untouched.

mod backup;
mod persist;

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use vaultkeep_core::config::LocalStoreConfig;
use vaultkeep_core::{paths, SecretString};

use crate::crypto::{DerivedKey, SALT_SIZE};
use crate::error::{Result, SecretError};
use crate::passphrase::{self, PassphraseSource, ResolvedPassphrase};
use crate::provider::{validate_key, SecretProvider};
use crate::types::{BackupInfo, DecryptedSecret, SecretMetadata};

use persist::{EncryptedRecord, VaultFile, VaultLock};

/// Key written and removed again by [`LocalSecretStore::health_check`].
/// Reserved: `set` and `import` reject it.
const HEALTH_CHECK_KEY: &str = "__vaultkeep_health_check__";

fn check_not_reserved(key: &str) -> Result<()> {
    if key == HEALTH_CHECK_KEY {
        return Err(SecretError::InvalidKey(format!(
            "'{HEALTH_CHECK_KEY}' is reserved for the store health check"
        )));
    }
    Ok(())
}

/// Live state guarded by the store mutex.
struct Inner {
    vault: VaultFile,
    key: DerivedKey,
}

/// Encrypted secret store persisted to a single vault file.
pub struct LocalSecretStore {
    store_path: PathBuf,
    backup_path: PathBuf,
    lock_path: PathBuf,
    salt: [u8; SALT_SIZE],
    kdf_iterations: u32,
    auto_backup: bool,
    max_backups: usize,
    file_lock: bool,
    passphrase_source: PassphraseSource,
    backup_seq: AtomicU64,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for LocalSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSecretStore")
            .field("store_path", &self.store_path)
            .field("backup_path", &self.backup_path)
            .field("passphrase_source", &self.passphrase_source)
            .finish_non_exhaustive()
    }
}

impl LocalSecretStore {
    /// Open (or create) the store described by `config`.
    ///
    /// The master passphrase is resolved from the config, then the
    /// environment, then generated (see [`passphrase::resolve`]).
    pub async fn open(config: &LocalStoreConfig) -> Result<Self> {
        let resolved = passphrase::resolve(config.master_passphrase.as_ref());
        Self::open_resolved(config, resolved).await
    }

    /// Open the store with an explicit passphrase, ignoring the config's.
    pub async fn open_with_passphrase(
        config: &LocalStoreConfig,
        passphrase: SecretString,
    ) -> Result<Self> {
        let resolved = ResolvedPassphrase {
            passphrase,
            source: PassphraseSource::Config,
        };
        Self::open_resolved(config, resolved).await
    }

    async fn open_resolved(config: &LocalStoreConfig, resolved: ResolvedPassphrase) -> Result<Self> {
        if config.max_backups == 0 {
            return Err(SecretError::Config("maxBackups must be at least 1".to_string()));
        }

        let store_path = config.store_path.clone();
        let salt_path = paths::salt_file_for(&store_path);
        let lock_path = paths::lock_file_for(&store_path);

        let vault_exists = tokio::fs::try_exists(&store_path).await?;
        let salt = persist::load_or_create_salt(&salt_path, vault_exists).await?;
        let key = derive_key(&resolved.passphrase, salt, config.kdf_iterations).await?;

        let vault = if vault_exists {
            persist::read_vault(&store_path).await?
        } else {
            VaultFile::empty(Utc::now())
        };

        let unreadable = vault.undecryptable(&key);
        if !unreadable.is_empty() {
            warn!(
                path = %store_path.display(),
                unreadable = unreadable.len(),
                total = vault.secrets.len(),
                "some vault records do not decrypt with the active master passphrase"
            );
        }

        info!(
            path = %store_path.display(),
            records = vault.secrets.len(),
            source = ?resolved.source,
            "opened encrypted local store"
        );

        Ok(Self {
            store_path,
            backup_path: config.backup_path.clone(),
            lock_path,
            salt,
            kdf_iterations: config.kdf_iterations,
            auto_backup: config.auto_backup,
            max_backups: config.max_backups,
            file_lock: config.file_lock,
            passphrase_source: resolved.source,
            backup_seq: AtomicU64::new(0),
            inner: Mutex::new(Inner { vault, key }),
        })
    }

    /// Path of the vault file.
    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Directory holding backups.
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Where the active master passphrase came from.
    pub fn passphrase_source(&self) -> PassphraseSource {
        self.passphrase_source
    }

    async fn acquire_file_lock(&self) -> Result<VaultLock> {
        if self.file_lock {
            VaultLock::acquire(&self.lock_path).await
        } else {
            Ok(VaultLock::disabled())
        }
    }

    /// Pick up writes made by other processes. Only meaningful under the file lock.
    async fn reload(&self, inner: &mut Inner) -> Result<()> {
        if self.file_lock && tokio::fs::try_exists(&self.store_path).await? {
            inner.vault = persist::read_vault(&self.store_path).await?;
        }
        Ok(())
    }

    /// Fail if the vault on disk is sealed under a key other than ours,
    /// e.g. after another handle re-encrypted it.
    fn ensure_key_matches(&self, inner: &Inner) -> Result<()> {
        if inner.vault.sealed_with(&inner.key) {
            return Ok(());
        }
        error!(
            path = %self.store_path.display(),
            "vault is sealed under a different master key"
        );
        Err(SecretError::DecryptionFailed(
            "vault is sealed under a different master passphrase; reopen the store with the current one"
                .to_string(),
        ))
    }

    /// Back up, persist `next` stamped with `key_check`, then make it the
    /// live state.
    async fn commit(
        &self,
        inner: &mut Inner,
        mut next: VaultFile,
        key_check: String,
        backup: bool,
    ) -> Result<()> {
        if backup && self.auto_backup {
            self.backup_best_effort().await;
        }
        next.updated_at = Utc::now();
        next.key_check = Some(key_check);
        persist::write_vault(&self.store_path, &next).await?;
        inner.vault = next;
        Ok(())
    }

    /// Run one read-modify-persist cycle. `apply` returns whether it changed
    /// anything; unchanged vaults are not rewritten.
    async fn mutate<F>(&self, backup: bool, apply: F) -> Result<bool>
    where
        F: FnOnce(&mut VaultFile, &DerivedKey) -> Result<bool>,
    {
        let mut inner = self.inner.lock().await;
        let _file_lock = self.acquire_file_lock().await?;
        self.reload(&mut inner).await?;
        self.ensure_key_matches(&inner)?;

        let mut next = inner.vault.clone();
        if !apply(&mut next, &inner.key)? {
            return Ok(false);
        }
        let key_check = inner.key.fingerprint();
        self.commit(&mut inner, next, key_check, backup).await?;
        Ok(true)
    }

    async fn backup_best_effort(&self) {
        match tokio::fs::try_exists(&self.store_path).await {
            Ok(true) => {
                if let Err(e) = self.create_backup().await {
                    warn!(path = %self.store_path.display(), error = %e, "vault backup failed");
                }
            }
            Ok(false) => {}
            Err(e) => warn!(path = %self.store_path.display(), error = %e, "vault backup failed"),
        }
    }

    async fn create_backup(&self) -> Result<PathBuf> {
        let seq = self.backup_seq.fetch_add(1, Ordering::Relaxed);
        let path = backup::create(&self.store_path, &self.backup_path, seq).await?;
        if let Err(e) = backup::prune(&self.backup_path, self.max_backups).await {
            warn!(dir = %self.backup_path.display(), error = %e, "backup pruning failed");
        }
        Ok(path)
    }

    /// Re-encrypt every record under a key derived from `new_passphrase`.
    ///
    /// Every record is decrypted before anything is written. If one fails,
    /// the call returns [`SecretError::DecryptionFailed`] and both the vault
    /// file and the active key stay as they were. The salt is kept.
    ///
    /// Returns the number of re-encrypted records.
    pub async fn re_encrypt(&self, new_passphrase: &SecretString) -> Result<usize> {
        if new_passphrase.is_empty() {
            return Err(SecretError::Config(
                "new master passphrase must not be empty".to_string(),
            ));
        }

        let mut inner = self.inner.lock().await;
        let _file_lock = self.acquire_file_lock().await?;
        self.reload(&mut inner).await?;
        self.ensure_key_matches(&inner)?;

        let mut plaintexts = Vec::with_capacity(inner.vault.secrets.len());
        for record in &inner.vault.secrets {
            match record.open(&inner.key) {
                Ok(value) => plaintexts.push((record.metadata.clone(), value)),
                Err(e) => {
                    error!(key = %record.key, op = "reencrypt", error = %e, "aborting re-encryption");
                    return Err(SecretError::DecryptionFailed(format!(
                        "record '{}' does not decrypt with the current key; nothing was changed",
                        record.key
                    )));
                }
            }
        }

        let new_key = derive_key(new_passphrase, self.salt, self.kdf_iterations).await?;

        let mut next = inner.vault.clone();
        next.secrets = plaintexts
            .into_iter()
            .map(|(metadata, value)| EncryptedRecord::seal(&new_key, metadata, value.as_bytes()))
            .collect::<Result<Vec<_>>>()?;
        let count = next.secrets.len();

        let key_check = new_key.fingerprint();
        self.commit(&mut inner, next, key_check, true).await?;
        inner.key = new_key;

        info!(records = count, "re-encrypted vault under new master passphrase");
        Ok(count)
    }

    /// Serialize the vault (values stay encrypted).
    pub async fn export(&self) -> Result<String> {
        let mut inner = self.inner.lock().await;
        let _file_lock = self.acquire_file_lock().await?;
        self.reload(&mut inner).await?;
        let data = serde_json::to_string_pretty(&inner.vault)?;
        debug!(records = inner.vault.secrets.len(), "exported vault");
        Ok(data)
    }

    /// Replace the whole vault with an exported payload.
    ///
    /// The payload is shape-checked, must not carry the reserved health-check
    /// key, and every record must decrypt under the active key; otherwise
    /// nothing is changed. Returns the record count.
    pub async fn import(&self, data: &str) -> Result<usize> {
        let imported = persist::parse_vault(data)?;
        self.replace_vault(imported, "import").await
    }

    async fn replace_vault(&self, replacement: VaultFile, op: &'static str) -> Result<usize> {
        if replacement.contains(HEALTH_CHECK_KEY) {
            return Err(SecretError::InvalidImport(format!(
                "payload contains the reserved key '{HEALTH_CHECK_KEY}'"
            )));
        }

        let mut inner = self.inner.lock().await;

        let unreadable = replacement.undecryptable(&inner.key);
        if !unreadable.is_empty() {
            error!(op, unreadable = ?unreadable, "payload does not decrypt with the current key");
            return Err(SecretError::DecryptionFailed(format!(
                "{} record(s) do not decrypt with the current key: {}",
                unreadable.len(),
                unreadable.join(", ")
            )));
        }

        let _file_lock = self.acquire_file_lock().await?;
        self.reload(&mut inner).await?;
        self.ensure_key_matches(&inner)?;

        let count = replacement.secrets.len();
        let key_check = inner.key.fingerprint();
        self.commit(&mut inner, replacement, key_check, true).await?;
        info!(op, records = count, "replaced vault contents");
        Ok(count)
    }

    /// Back up the current vault file now, regardless of `autoBackup`.
    pub async fn backup_now(&self) -> Result<PathBuf> {
        let _inner = self.inner.lock().await;
        let _file_lock = self.acquire_file_lock().await?;
        if !tokio::fs::try_exists(&self.store_path).await? {
            return Err(SecretError::Storage(format!(
                "nothing to back up: {} does not exist",
                self.store_path.display()
            )));
        }
        self.create_backup().await
    }

    /// Backups on disk, newest first.
    pub async fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        backup::list(&self.backup_path).await
    }

    /// Replace the vault with a backup file. Same checks as [`import`](Self::import).
    pub async fn restore_backup(&self, path: &Path) -> Result<usize> {
        let data = tokio::fs::read_to_string(path).await?;
        let restored = persist::parse_vault(&data)?;
        self.replace_vault(restored, "restore").await
    }

    /// Keys whose records do not decrypt under the active key.
    pub async fn verify(&self) -> Result<Vec<String>> {
        let mut inner = self.inner.lock().await;
        let _file_lock = self.acquire_file_lock().await?;
        self.reload(&mut inner).await?;
        Ok(inner.vault.undecryptable(&inner.key))
    }

    /// Write, read back and delete a sentinel record.
    async fn round_trip(&self) -> Result<()> {
        let sentinel = passphrase::generate();
        let now = Utc::now();

        self.mutate(false, |vault, key| {
            let metadata = SecretMetadata::new(HEALTH_CHECK_KEY, now, None);
            vault.upsert(EncryptedRecord::seal(key, metadata, sentinel.as_bytes())?);
            Ok(true)
        })
        .await?;

        let read_back = {
            let inner = self.inner.lock().await;
            inner.vault.find(HEALTH_CHECK_KEY).map(|record| record.open(&inner.key))
        };

        self.mutate(false, |vault, _| Ok(vault.remove(HEALTH_CHECK_KEY)))
            .await?;

        match read_back {
            Some(Ok(value)) if value == sentinel => Ok(()),
            Some(Ok(_)) => Err(SecretError::Storage(
                "health check value did not round-trip".to_string(),
            )),
            Some(Err(e)) => Err(e),
            None => Err(SecretError::Storage(
                "health check record vanished before read-back".to_string(),
            )),
        }
    }
}

async fn derive_key(passphrase: &SecretString, salt: [u8; SALT_SIZE], iterations: u32) -> Result<DerivedKey> {
    let passphrase = passphrase.clone();
    tokio::task::spawn_blocking(move || DerivedKey::derive(passphrase.as_bytes(), &salt, iterations))
        .await
        .map_err(|e| SecretError::KeyDerivation(format!("derivation task failed: {e}")))?
}

#[async_trait]
impl SecretProvider for LocalSecretStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn get(&self, key: &str) -> Option<DecryptedSecret> {
        let inner = self.inner.lock().await;
        let record = inner.vault.find(key)?;
        match record.open(&inner.key) {
            Ok(value) => Some(DecryptedSecret::new(value.expose_secret())),
            Err(e) => {
                warn!(key, op = "get", error = %e, "record could not be decrypted");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str, expires_at: Option<DateTime<Utc>>) -> Result<()> {
        validate_key(key)?;
        check_not_reserved(key)?;
        let now = Utc::now();
        self.mutate(true, |vault, dk| {
            let metadata = match vault.find(key) {
                Some(current) => current.metadata.next_version(now, expires_at),
                None => SecretMetadata::new(key, now, expires_at),
            };
            debug!(key, version = metadata.version, "storing secret");
            vault.upsert(EncryptedRecord::seal(dk, metadata, value.as_bytes())?);
            Ok(true)
        })
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let removed = self.mutate(true, |vault, _| Ok(vault.remove(key))).await?;
        if removed {
            debug!(key, "deleted secret");
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self.inner.lock().await.vault.keys())
    }

    async fn exists(&self, key: &str) -> bool {
        self.inner.lock().await.vault.contains(key)
    }

    async fn get_metadata(&self, key: &str) -> Option<SecretMetadata> {
        let inner = self.inner.lock().await;
        let record = inner.vault.find(key)?;
        match record.open(&inner.key) {
            Ok(_) => Some(record.metadata.clone()),
            Err(e) => {
                warn!(key, op = "get_metadata", error = %e, "record could not be decrypted");
                None
            }
        }
    }

    async fn rotate(&self, key: &str, new_value: &str) -> Result<()> {
        check_not_reserved(key)?;
        let now = Utc::now();
        self.mutate(true, |vault, dk| {
            let current = vault
                .find(key)
                .ok_or_else(|| SecretError::KeyNotFound(key.to_string()))?;
            let metadata = current.metadata.rotated(now);
            debug!(key, version = metadata.version, "rotating secret");
            vault.upsert(EncryptedRecord::seal(dk, metadata, new_value.as_bytes())?);
            Ok(true)
        })
        .await?;
        Ok(())
    }

    async fn health_check(&self) -> bool {
        match self.round_trip().await {
            Ok(()) => true,
            Err(e) => {
                error!(path = %self.store_path.display(), error = %e, "local store health check failed");
                false
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

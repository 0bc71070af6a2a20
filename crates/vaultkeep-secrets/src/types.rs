//! Core types for secret management.
//!
//! Metadata and batch-result types shared by every provider and the manager,
//! plus the in-memory wrapper for decrypted values.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use vaultkeep_core::SecretString;

/// Bookkeeping attached to every stored secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretMetadata {
    /// Key the metadata belongs to.
    pub key: String,

    /// When the key was first written.
    pub created_at: DateTime<Utc>,

    /// When the key was last written.
    pub updated_at: DateTime<Utc>,

    /// Write counter; 1 after the first write, +1 on every set or rotate.
    pub version: u64,

    /// Optional expiry, checked by `SecretManager::validate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Set only by rotate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_date: Option<DateTime<Utc>>,
}

impl SecretMetadata {
    /// Metadata for a key written for the first time.
    pub fn new(key: impl Into<String>, now: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            key: key.into(),
            created_at: now,
            updated_at: now,
            version: 1,
            expires_at,
            rotation_date: None,
        }
    }

    /// Metadata after an overwrite: version +1, fresh `updated_at`.
    pub fn next_version(&self, now: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            key: self.key.clone(),
            created_at: self.created_at,
            updated_at: now,
            version: self.version + 1,
            expires_at,
            rotation_date: self.rotation_date,
        }
    }

    /// Metadata after a rotation: like an overwrite, keeping the expiry and
    /// stamping `rotation_date`.
    pub fn rotated(&self, now: DateTime<Utc>) -> Self {
        let mut next = self.next_version(now, self.expires_at);
        next.rotation_date = Some(now);
        next
    }

    /// Whether `expires_at` lies in the past.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }

    /// When the next rotation is due: `rotation_date + interval_days`. Keys
    /// never rotated count from `created_at`; overwrites do not reset it.
    pub fn rotation_due_at(&self, interval_days: u32) -> DateTime<Utc> {
        self.rotation_date.unwrap_or(self.created_at) + Duration::days(i64::from(interval_days))
    }
}

/// A decrypted secret held in memory.
///
/// Wraps `SecretString` so the plaintext is zeroed on drop. Debug and Display
/// both emit `[REDACTED]` to prevent accidental logging.
#[derive(Clone)]
pub struct DecryptedSecret {
    inner: SecretString,
}

impl DecryptedSecret {
    /// Create a new decrypted secret from raw plaintext.
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: SecretString::new(value),
        }
    }

    /// Expose the plaintext value. Use sparingly.
    pub fn expose(&self) -> &str {
        self.inner.expose_secret()
    }
}

impl fmt::Debug for DecryptedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for DecryptedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for DecryptedSecret {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Outcome of checking a set of required keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// `missing` and `expired` are both empty.
    pub valid: bool,
    /// Keys with no readable value.
    pub missing: Vec<String>,
    /// Keys whose `expires_at` has passed.
    pub expired: Vec<String>,
    /// Keys overdue for rotation. Advisory only.
    pub requires_rotation: Vec<String>,
}

/// A key that could not be migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFailure {
    pub key: String,
    pub error: String,
}

/// Outcome of copying keys between providers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationResult {
    pub total: usize,
    pub migrated: Vec<String>,
    pub failed: Vec<MigrationFailure>,
    pub success: bool,
}

/// A backup file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupInfo {
    pub path: PathBuf,
    pub created_at: Option<DateTime<Utc>>,
    pub size_bytes: u64,
}

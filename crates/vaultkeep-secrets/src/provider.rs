//! The contract every secret backend implements.
//!
//! Operations split into two classes:
//!
//! - **Fail-closed**: [`get`](SecretProvider::get),
//!   [`exists`](SecretProvider::exists) and
//!   [`get_metadata`](SecretProvider::get_metadata) never return errors.
//!   Absence, a wrong master key, a tampered record and an unreachable backend
//!   all read as `None`/`false`; the provider logs the underlying cause.
//!   Callers that must tell these apart use
//!   [`health_check`](SecretProvider::health_check) or a store-specific
//!   maintenance operation.
//! - **Fail-loud**: [`set`](SecretProvider::set),
//!   [`delete`](SecretProvider::delete), [`list`](SecretProvider::list) and
//!   [`rotate`](SecretProvider::rotate) return a [`Result`].

use std::any::Any;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Result, SecretError};
use crate::types::{DecryptedSecret, SecretMetadata};

/// Maximum allowed length for a secret key, in bytes.
pub const MAX_KEY_LEN: usize = 256;

/// Async trait for secret storage backends.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Short backend name used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Read and decrypt a value. `None` when absent or unreadable.
    async fn get(&self, key: &str) -> Option<DecryptedSecret>;

    /// Upsert a value. Always bumps the version, even for an unchanged value.
    async fn set(&self, key: &str, value: &str, expires_at: Option<DateTime<Utc>>) -> Result<()>;

    /// Remove a key. Removing an absent key is a no-op.
    async fn delete(&self, key: &str) -> Result<()>;

    /// All stored keys, sorted.
    async fn list(&self) -> Result<Vec<String>>;

    /// Whether a key is present.
    async fn exists(&self, key: &str) -> bool;

    /// Metadata without the value. `None` when absent or unreadable.
    async fn get_metadata(&self, key: &str) -> Option<SecretMetadata>;

    /// Replace the value of an existing key and stamp its rotation date.
    ///
    /// Fails with [`SecretError::KeyNotFound`] when the key was never set.
    async fn rotate(&self, key: &str, new_value: &str) -> Result<()>;

    /// Self-test of the backend. Never errors.
    async fn health_check(&self) -> bool;

    /// Get the provider as Any for downcasting to backend-specific APIs.
    fn as_any(&self) -> &dyn Any;
}

/// Validate a secret key.
///
/// Keys must be non-empty, at most [`MAX_KEY_LEN`] bytes, and free of control
/// characters.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(SecretError::InvalidKey("key must not be empty".to_string()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(SecretError::InvalidKey(format!(
            "key exceeds maximum length of {MAX_KEY_LEN} bytes"
        )));
    }
    if key.chars().any(char::is_control) {
        return Err(SecretError::InvalidKey(
            "key contains control characters".to_string(),
        ));
    }
    Ok(())
}

//! Error types for secret management.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during secret operations.
#[derive(Debug, Error)]
pub enum SecretError {
    /// Operation requires an existing key (rotate).
    #[error("Secret not found: {0}")]
    KeyNotFound(String),

    /// Required secret is absent or unreadable (`get_or_throw`).
    #[error("Missing required secret: {0}")]
    MissingSecret(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// The vault exists but its salt file does not; deriving with a fresh
    /// salt would silently produce the wrong key.
    #[error("Salt file missing for existing vault: {0}")]
    SaltMissing(PathBuf),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid secret key: {0}")]
    InvalidKey(String),

    /// Malformed import or backup payload, rejected before any mutation.
    #[error("Invalid vault payload: {0}")]
    InvalidImport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider '{0}' is not compiled into this build")]
    NotCompiledIn(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Operation not supported by provider '{provider}': {operation}")]
    Unsupported {
        provider: String,
        operation: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SecretError {
    /// Errors that make the manager fall back to the environment provider
    /// instead of failing startup.
    pub fn is_configuration(&self) -> bool {
        matches!(self, SecretError::Config(_) | SecretError::NotCompiledIn(_))
    }
}

impl From<vaultkeep_core::ConfigError> for SecretError {
    fn from(err: vaultkeep_core::ConfigError) -> Self {
        SecretError::Config(err.to_string())
    }
}

/// Convenience result alias for secret operations.
pub type Result<T> = std::result::Result<T, SecretError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_classification() {
        assert!(SecretError::Config("bad".into()).is_configuration());
        assert!(SecretError::NotCompiledIn("aws".into()).is_configuration());
        assert!(!SecretError::Storage("disk full".into()).is_configuration());
        assert!(!SecretError::DecryptionFailed("tag".into()).is_configuration());
    }

    #[test]
    fn test_config_error_conversion() {
        let err: SecretError = vaultkeep_core::ConfigError::UnknownProvider("x".into()).into();
        assert!(matches!(err, SecretError::Config(msg) if msg.contains("x")));
    }
}

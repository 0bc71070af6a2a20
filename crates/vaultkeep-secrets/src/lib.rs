//! Secret providers and the secret manager for VaultKeep.
//!
//! - [`SecretProvider`]: the contract every backend implements
//! - [`EnvProvider`]: process environment variables, the universal fallback
//! - [`LocalSecretStore`]: AES-256-GCM encrypted vault file with PBKDF2 key
//!   derivation, versioning, rolling backups, re-encryption and export/import
//! - [`MemoryProvider`]: process memory
//! - [`SecretManager`]: one active provider plus validation, rotation policy
//!   and migration
//!
//! ```no_run
//! use vaultkeep_core::Config;
//! use vaultkeep_secrets::SecretManager;
//!
//! # async fn run() -> vaultkeep_secrets::Result<()> {
//! let config = Config::load_or_default();
//! let manager = SecretManager::from_config(&config.secrets).await?;
//! let jwt = manager.get_or_throw("JWT_SECRET").await?;
//! # let _ = jwt;
//! # Ok(())
//! # }
//! ```

pub mod crypto;
pub mod env;
pub mod error;
pub mod local;
pub mod manager;
pub mod memory;
pub mod passphrase;
pub mod provider;
pub mod registry;
pub mod types;

pub use env::EnvProvider;
pub use error::{Result, SecretError};
pub use local::LocalSecretStore;
pub use manager::{Fallback, RotationNotice, SecretManager};
pub use memory::MemoryProvider;
pub use passphrase::PassphraseSource;
pub use provider::SecretProvider;
pub use registry::{ProviderFactory, ProviderRegistry};
pub use types::{
    BackupInfo, DecryptedSecret, MigrationFailure, MigrationResult, SecretMetadata,
    ValidationResult,
};

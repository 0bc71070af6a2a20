//! # vaultkeep-core
//!
//! Shared functionality used across all VaultKeep crates:
//!
//! - **Configuration**: Loading, validation, and persistence of the config file
//! - **Paths**: Resolution of the VaultKeep home, vault, and backup locations
//! - **Utilities**: Environment variable helpers and the zeroizing [`SecretString`]

pub mod config;
pub mod env;
pub mod error;
pub mod paths;
pub mod secret;

// Re-exports for convenience
pub use config::Config;
pub use error::ConfigError;
pub use secret::SecretString;

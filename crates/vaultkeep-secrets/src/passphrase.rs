//! Master passphrase resolution for the encrypted local store.
//!
//! The passphrase is resolved in priority order:
//! 1. `secrets.local.masterPassphrase` from the config file
//! 2. `VAULTKEEP_MASTER_PASSPHRASE` environment variable
//! 3. A freshly generated random passphrase, announced once via `warn!`
//!
//! A generated passphrase is never written anywhere. Unless the operator
//! captures it from the warning, data written with it cannot be read after
//! the process exits.

use rand::RngCore;
use tracing::{debug, warn};
use vaultkeep_core::env::{get_var, vars};
use vaultkeep_core::SecretString;

/// Bytes of randomness in a generated passphrase (hex-encoded on output).
const GENERATED_BYTES: usize = 32;

/// Where the active passphrase came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassphraseSource {
    Config,
    Environment,
    Generated,
}

/// A resolved master passphrase.
#[derive(Debug, Clone)]
pub struct ResolvedPassphrase {
    pub passphrase: SecretString,
    pub source: PassphraseSource,
}

/// Resolve the master passphrase.
pub fn resolve(configured: Option<&SecretString>) -> ResolvedPassphrase {
    resolve_with(configured, || get_var(vars::VAULTKEEP_MASTER_PASSPHRASE))
}

/// Resolve using an explicit environment lookup.
pub fn resolve_with<F>(configured: Option<&SecretString>, from_env: F) -> ResolvedPassphrase
where
    F: FnOnce() -> Option<String>,
{
    if let Some(passphrase) = configured.filter(|p| !p.is_empty()) {
        debug!("using master passphrase from configuration");
        return ResolvedPassphrase {
            passphrase: passphrase.clone(),
            source: PassphraseSource::Config,
        };
    }

    if let Some(passphrase) = from_env() {
        debug!("using master passphrase from {}", vars::VAULTKEEP_MASTER_PASSPHRASE);
        return ResolvedPassphrase {
            passphrase: SecretString::new(passphrase),
            source: PassphraseSource::Environment,
        };
    }

    let passphrase = generate();
    warn!(
        "no master passphrase configured; generated one for this process only. \
         Secrets written now are unreadable after restart unless you set \
         {}={}",
        vars::VAULTKEEP_MASTER_PASSPHRASE,
        passphrase.expose_secret()
    );
    ResolvedPassphrase {
        passphrase,
        source: PassphraseSource::Generated,
    }
}

/// Generate a random hex passphrase.
pub fn generate() -> SecretString {
    let mut bytes = [0u8; GENERATED_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    SecretString::new(hex::encode(bytes))
}

//! Provider factories keyed by [`ProviderKind`].
//!
//! Backends are known at compile time. The built-in registry knows `env`,
//! `local` and `memory`; remote kinds (`vault`, `aws`, `azure`, `gcp`) resolve
//! to [`SecretError::NotCompiledIn`] unless an embedding application
//! registers a factory for them. This keeps "not available in this build"
//! distinct from "available but misconfigured" ([`SecretError::Config`]).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use vaultkeep_core::config::{ProviderKind, SecretsConfig};

use crate::env::EnvProvider;
use crate::error::{Result, SecretError};
use crate::local::LocalSecretStore;
use crate::memory::MemoryProvider;
use crate::provider::SecretProvider;

/// Builds a provider from configuration.
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    /// The kind this factory builds.
    fn kind(&self) -> ProviderKind;

    /// Construct the provider.
    async fn create(&self, config: &SecretsConfig) -> Result<Arc<dyn SecretProvider>>;
}

/// Factory for [`EnvProvider`].
pub struct EnvProviderFactory;

#[async_trait]
impl ProviderFactory for EnvProviderFactory {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Env
    }

    async fn create(&self, config: &SecretsConfig) -> Result<Arc<dyn SecretProvider>> {
        Ok(Arc::new(EnvProvider::from_config(&config.env)))
    }
}

/// Factory for [`LocalSecretStore`].
pub struct LocalStoreFactory;

#[async_trait]
impl ProviderFactory for LocalStoreFactory {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    async fn create(&self, config: &SecretsConfig) -> Result<Arc<dyn SecretProvider>> {
        Ok(Arc::new(LocalSecretStore::open(&config.local).await?))
    }
}

/// Factory for [`MemoryProvider`].
pub struct MemoryProviderFactory;

#[async_trait]
impl ProviderFactory for MemoryProviderFactory {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Memory
    }

    async fn create(&self, _config: &SecretsConfig) -> Result<Arc<dyn SecretProvider>> {
        Ok(Arc::new(MemoryProvider::new()))
    }
}

/// Registry of provider factories.
pub struct ProviderRegistry {
    factories: HashMap<ProviderKind, Arc<dyn ProviderFactory>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with the `env`, `local` and `memory` factories.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(EnvProviderFactory));
        registry.register(Arc::new(LocalStoreFactory));
        registry.register(Arc::new(MemoryProviderFactory));
        registry
    }

    /// Register a factory, replacing any previous one for the same kind.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        let kind = factory.kind();
        debug!(provider = %kind, "registering provider factory");
        self.factories.insert(kind, factory);
    }

    /// Whether a factory exists for `kind`.
    pub fn is_registered(&self, kind: ProviderKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Kinds with a registered factory, in declaration order.
    pub fn kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .iter()
            .copied()
            .filter(|kind| self.is_registered(*kind))
            .collect()
    }

    /// Build the provider for `kind`.
    pub async fn create(
        &self,
        kind: ProviderKind,
        config: &SecretsConfig,
    ) -> Result<Arc<dyn SecretProvider>> {
        let factory = self
            .factories
            .get(&kind)
            .ok_or_else(|| SecretError::NotCompiledIn(kind.to_string()))?;
        let provider = factory.create(config).await?;
        info!(provider = %kind, "created secret provider");
        Ok(provider)
    }
}

//! Secret manager scenarios: provider selection, validation and migration.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;
use vaultkeep_core::config::{ProviderKind, SecretsConfig};
use vaultkeep_integration_tests::{local_config, RejectingProvider};
use vaultkeep_secrets::{
    MemoryProvider, ProviderRegistry, SecretError, SecretManager, SecretProvider,
};

fn local_secrets_config(dir: &TempDir) -> SecretsConfig {
    SecretsConfig {
        provider: ProviderKind::Local,
        local: local_config(dir.path(), "correct-horse-battery"),
        ..SecretsConfig::default()
    }
}

#[tokio::test]
async fn test_validate_reports_missing_and_expired() {
    let dir = TempDir::new().unwrap();
    let mut config = local_secrets_config(&dir);
    config.required = vec!["A".into(), "B".into(), "C".into()];
    let manager = SecretManager::from_config(&config).await.unwrap();
    assert_eq!(manager.provider_name(), "local");

    manager
        .set("B", "stale", Some(Utc::now() - Duration::days(1)))
        .await
        .unwrap();
    manager
        .set("C", "fresh", Some(Utc::now() + Duration::days(30)))
        .await
        .unwrap();

    let result = manager.validate().await;
    assert!(!result.valid);
    assert_eq!(result.missing, vec!["A"]);
    assert_eq!(result.expired, vec!["B"]);
    assert!(result.requires_rotation.is_empty());
}

#[tokio::test]
async fn test_required_list_changes_take_effect() {
    let dir = TempDir::new().unwrap();
    let manager = SecretManager::from_config(&local_secrets_config(&dir))
        .await
        .unwrap();
    assert!(manager.validate().await.valid);

    assert!(manager.add_required_key("DB_URL").await.unwrap());
    assert!(!manager.add_required_key("DB_URL").await.unwrap());
    assert_eq!(manager.validate().await.missing, vec!["DB_URL"]);

    manager.set("DB_URL", "postgres://", None).await.unwrap();
    assert!(manager.validate().await.valid);

    assert!(manager.remove_required_key("DB_URL").await);
    assert!(manager.required_keys().await.is_empty());
}

#[tokio::test]
async fn test_get_or_throw() {
    let dir = TempDir::new().unwrap();
    let manager = SecretManager::from_config(&local_secrets_config(&dir))
        .await
        .unwrap();

    let result = manager.get_or_throw("JWT_SECRET").await;
    assert!(matches!(result, Err(SecretError::MissingSecret(key)) if key == "JWT_SECRET"));

    manager.set("JWT_SECRET", "s3cret", None).await.unwrap();
    assert_eq!(manager.get_or_throw("JWT_SECRET").await.unwrap().expose(), "s3cret");
}

#[tokio::test]
async fn test_migration_with_one_failing_key() {
    let dir = TempDir::new().unwrap();
    let manager = SecretManager::from_config(&local_secrets_config(&dir))
        .await
        .unwrap();
    for key in ["ONE", "TWO", "THREE"] {
        manager.set(key, &key.to_lowercase(), None).await.unwrap();
    }

    let target = RejectingProvider::rejecting(["TWO"]);
    let result = manager.migrate(&target, None).await.unwrap();

    assert_eq!(result.total, 3);
    assert_eq!(result.migrated.len(), 2);
    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].key, "TWO");
    assert!(!result.success);

    assert_eq!(target.get("ONE").await.unwrap().expose(), "one");
    assert!(target.get("TWO").await.is_none());
    // The source is untouched.
    assert_eq!(manager.get("TWO").await.unwrap().expose(), "two");
}

#[tokio::test]
async fn test_migration_from_memory_into_local() {
    let dir = TempDir::new().unwrap();
    let source: Arc<dyn SecretProvider> = Arc::new(MemoryProvider::new());
    let expires = Utc::now() + Duration::days(10);
    source.set("TOKEN", "abc", Some(expires)).await.unwrap();
    source.set("OTHER", "xyz", None).await.unwrap();

    let manager = SecretManager::new(source, &SecretsConfig::default());
    let target = ProviderRegistry::with_builtins()
        .create(ProviderKind::Local, &local_secrets_config(&dir))
        .await
        .unwrap();

    let result = manager.migrate(target.as_ref(), None).await.unwrap();
    assert!(result.success);
    assert_eq!(result.migrated.len(), 2);

    assert_eq!(target.get("TOKEN").await.unwrap().expose(), "abc");
    let metadata = target.get_metadata("TOKEN").await.unwrap();
    assert_eq!(metadata.expires_at, Some(expires));
    assert_eq!(metadata.version, 1);
}

#[tokio::test]
async fn test_remote_provider_falls_back_to_env() {
    let config = SecretsConfig {
        provider: ProviderKind::Vault,
        ..SecretsConfig::default()
    };
    let manager = SecretManager::from_config(&config).await.unwrap();

    assert_eq!(manager.provider_name(), "env");
    let fallback = manager.fallback().unwrap();
    assert_eq!(fallback.requested, ProviderKind::Vault);
    assert!(manager.local_store().is_none());

    let result = manager.export().await;
    assert!(matches!(result, Err(SecretError::Unsupported { .. })));
}

#[tokio::test]
async fn test_local_store_errors_are_not_masked() {
    let dir = TempDir::new().unwrap();
    let config = local_secrets_config(&dir);
    {
        let manager = SecretManager::from_config(&config).await.unwrap();
        manager.set("A", "1", None).await.unwrap();
    }
    std::fs::remove_file(dir.path().join("secrets.vault.json.salt")).unwrap();

    let result = SecretManager::from_config(&config).await;
    assert!(matches!(result, Err(SecretError::SaltMissing(_))));
}

#[tokio::test]
async fn test_local_maintenance_through_manager() {
    let dir = TempDir::new().unwrap();
    let manager = SecretManager::from_config(&local_secrets_config(&dir))
        .await
        .unwrap();
    manager.set("A", "1", None).await.unwrap();
    let exported = manager.export().await.unwrap();

    manager.delete("A").await.unwrap();
    assert_eq!(manager.import(&exported).await.unwrap(), 1);
    assert_eq!(manager.get("A").await.unwrap().expose(), "1");
    assert!(manager.verify().await.unwrap().is_empty());
    assert!(manager.health_check().await);
}

//! Config save/load roundtrip integration tests.

use tempfile::TempDir;
use vaultkeep_core::config::{Config, ProviderKind};
use vaultkeep_core::ConfigError;
use vaultkeep_secrets::SecretManager;

#[test]
fn test_config_save_and_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let config = Config::default();
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.secrets.provider, config.secrets.provider);
    assert_eq!(loaded.secrets.local.max_backups, 10);
    assert_eq!(loaded.secrets.local.kdf_iterations, 100_000);
    assert_eq!(
        loaded.secrets.rotation.interval_days,
        config.secrets.rotation.interval_days
    );
    // No passphrase is written unless one was configured.
    assert!(loaded.secrets.local.master_passphrase.is_none());
}

#[test]
fn test_config_modify_and_reload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let mut config = Config::default();
    config.secrets.provider = ProviderKind::Memory;
    config.secrets.required = vec!["DB_URL".into(), "JWT_SECRET".into()];
    config.secrets.rotation.enabled = true;
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.secrets.provider, ProviderKind::Memory);
    assert_eq!(loaded.secrets.required, vec!["DB_URL", "JWT_SECRET"]);
    assert!(loaded.secrets.rotation.enabled);
}

#[test]
fn test_json5_config_with_comments() {
    let config = Config::parse(
        r#"{
            // hand-written config
            secrets: {
                provider: "local",
                required: ["API_KEY"],
                local: { maxBackups: 3, autoBackup: false },
            },
        }"#,
    )
    .unwrap();

    assert_eq!(config.secrets.provider, ProviderKind::Local);
    assert_eq!(config.secrets.required, vec!["API_KEY"]);
    assert_eq!(config.secrets.local.max_backups, 3);
    assert!(!config.secrets.local.auto_backup);
    assert!(config.secrets.local.file_lock);
}

#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = Config::load(&dir.path().join("absent.json"));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[tokio::test]
async fn test_saved_config_drives_manager() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let mut config = Config::default();
    config.secrets.provider = ProviderKind::Memory;
    config.secrets.required = vec!["A".into()];
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    let manager = SecretManager::from_config(&loaded.secrets).await.unwrap();
    assert_eq!(manager.provider_name(), "memory");
    assert_eq!(manager.validate().await.missing, vec!["A"]);
}

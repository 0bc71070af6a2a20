//! Encrypted local store scenarios driven through the public API.

use chrono::Utc;
use tempfile::TempDir;
use vaultkeep_core::SecretString;
use vaultkeep_integration_tests::{corrupt_field, local_config, read_vault_json};
use vaultkeep_secrets::{LocalSecretStore, SecretError, SecretProvider};

#[tokio::test]
async fn test_reopen_with_same_and_wrong_passphrase() {
    let dir = TempDir::new().unwrap();

    let store = LocalSecretStore::open(&local_config(dir.path(), "correct-horse-battery"))
        .await
        .unwrap();
    store.set("API_KEY", "sk-12345", None).await.unwrap();
    drop(store);

    let same = LocalSecretStore::open(&local_config(dir.path(), "correct-horse-battery"))
        .await
        .unwrap();
    assert_eq!(same.get("API_KEY").await.unwrap().expose(), "sk-12345");
    drop(same);

    let wrong = LocalSecretStore::open(&local_config(dir.path(), "wrong-password"))
        .await
        .unwrap();
    assert!(wrong.get("API_KEY").await.is_none());
    assert!(wrong.get_metadata("API_KEY").await.is_none());
    assert_eq!(wrong.verify().await.unwrap(), vec!["API_KEY"]);
}

#[tokio::test]
async fn test_every_key_unreadable_under_other_passphrase() {
    let dir = TempDir::new().unwrap();
    let store = LocalSecretStore::open(&local_config(dir.path(), "first")).await.unwrap();
    for key in ["A", "B", "C"] {
        store.set(key, &format!("value of {key}"), None).await.unwrap();
    }
    drop(store);

    let other = LocalSecretStore::open(&local_config(dir.path(), "second")).await.unwrap();
    for key in ["A", "B", "C"] {
        assert!(other.get(key).await.is_none(), "{key} should not decrypt");
    }
    // Keys stay listable without the key.
    assert_eq!(other.list().await.unwrap(), vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_tampered_records_read_as_absent() {
    let dir = TempDir::new().unwrap();
    let config = local_config(dir.path(), "pw");
    let store = LocalSecretStore::open(&config).await.unwrap();
    store.set("TAG", "t", None).await.unwrap();
    store.set("CIPHER", "c", None).await.unwrap();
    store.set("CLEAN", "ok", None).await.unwrap();
    drop(store);

    corrupt_field(&config.store_path, "TAG", "authTag");
    corrupt_field(&config.store_path, "CIPHER", "encryptedValue");

    let store = LocalSecretStore::open(&config).await.unwrap();
    assert!(store.get("TAG").await.is_none());
    assert!(store.get("CIPHER").await.is_none());
    assert_eq!(store.get("CLEAN").await.unwrap().expose(), "ok");

    let mut unreadable = store.verify().await.unwrap();
    unreadable.sort();
    assert_eq!(unreadable, vec!["CIPHER", "TAG"]);
}

#[tokio::test]
async fn test_version_and_rotation_lifecycle() {
    let dir = TempDir::new().unwrap();
    let store = LocalSecretStore::open(&local_config(dir.path(), "pw")).await.unwrap();

    store.set("X", "1", None).await.unwrap();
    assert_eq!(store.get_metadata("X").await.unwrap().version, 1);

    store.set("X", "2", None).await.unwrap();
    assert_eq!(store.get_metadata("X").await.unwrap().version, 2);

    let started = Utc::now();
    store.rotate("X", "3").await.unwrap();
    let metadata = store.get_metadata("X").await.unwrap();
    assert_eq!(metadata.version, 3);
    assert!(metadata.rotation_date.unwrap() >= started);
    assert_eq!(store.get("X").await.unwrap().expose(), "3");

    let result = store.rotate("NEVER_SET", "v").await;
    assert!(matches!(result, Err(SecretError::KeyNotFound(_))));
}

#[tokio::test]
async fn test_delete_absent_key_is_noop() {
    let dir = TempDir::new().unwrap();
    let config = local_config(dir.path(), "pw");
    let store = LocalSecretStore::open(&config).await.unwrap();
    store.set("KEEP", "v", None).await.unwrap();
    let before = std::fs::read_to_string(&config.store_path).unwrap();

    assert!(!store.exists("GHOST").await);
    store.delete("GHOST").await.unwrap();
    assert!(!store.exists("GHOST").await);

    assert_eq!(std::fs::read_to_string(&config.store_path).unwrap(), before);
}

#[tokio::test]
async fn test_retention_keeps_ten_newest_backups() {
    let dir = TempDir::new().unwrap();
    let config = local_config(dir.path(), "pw");
    assert_eq!(config.max_backups, 10);
    let store = LocalSecretStore::open(&config).await.unwrap();

    for i in 0..25 {
        store.set(&format!("K{}", i % 3), &i.to_string(), None).await.unwrap();
    }

    let backups = store.list_backups().await.unwrap();
    assert_eq!(backups.len(), 10);
    let on_disk = std::fs::read_dir(&config.backup_path).unwrap().count();
    assert_eq!(on_disk, 10);

    // Newest first, and the newest is the state before the final write.
    let times: Vec<_> = backups.iter().map(|b| b.created_at.unwrap()).collect();
    assert!(times.windows(2).all(|w| w[0] >= w[1]));
    let newest = read_vault_json(&backups[0].path);
    assert_eq!(newest["secrets"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_reencrypt_failure_keeps_old_key() {
    let dir = TempDir::new().unwrap();
    let config = local_config(dir.path(), "old");
    let store = LocalSecretStore::open(&config).await.unwrap();
    store.set("GOOD", "g", None).await.unwrap();
    store.set("BAD", "b", None).await.unwrap();
    drop(store);
    corrupt_field(&config.store_path, "BAD", "authTag");

    let store = LocalSecretStore::open(&config).await.unwrap();
    let result = store.re_encrypt(&SecretString::new("new")).await;
    assert!(matches!(result, Err(SecretError::DecryptionFailed(_))));
    drop(store);

    let old = LocalSecretStore::open(&config).await.unwrap();
    assert_eq!(old.get("GOOD").await.unwrap().expose(), "g");

    let new = LocalSecretStore::open(&local_config(dir.path(), "new")).await.unwrap();
    assert!(new.get("GOOD").await.is_none());
}

#[tokio::test]
async fn test_reencrypt_then_reopen_with_new_passphrase() {
    let dir = TempDir::new().unwrap();
    let store = LocalSecretStore::open(&local_config(dir.path(), "old")).await.unwrap();
    store.set("A", "1", None).await.unwrap();
    store.set("A", "2", None).await.unwrap();

    assert_eq!(store.re_encrypt(&SecretString::new("new")).await.unwrap(), 1);
    drop(store);

    let reopened = LocalSecretStore::open(&local_config(dir.path(), "new")).await.unwrap();
    assert_eq!(reopened.get("A").await.unwrap().expose(), "2");
    assert_eq!(reopened.get_metadata("A").await.unwrap().version, 2);
}

#[tokio::test]
async fn test_backup_restore_roundtrip() {
    let dir = TempDir::new().unwrap();
    let store = LocalSecretStore::open(&local_config(dir.path(), "pw")).await.unwrap();
    store.set("A", "before", None).await.unwrap();
    let backup = store.backup_now().await.unwrap();

    store.set("A", "after", None).await.unwrap();
    store.set("B", "new", None).await.unwrap();

    assert_eq!(store.restore_backup(&backup).await.unwrap(), 1);
    assert_eq!(store.get("A").await.unwrap().expose(), "before");
    assert!(!store.exists("B").await);
}

#[tokio::test]
async fn test_import_from_other_vault_is_rejected() {
    let ours = TempDir::new().unwrap();
    let theirs = TempDir::new().unwrap();

    let source = LocalSecretStore::open(&local_config(theirs.path(), "pw")).await.unwrap();
    source.set("A", "1", None).await.unwrap();
    let exported = source.export().await.unwrap();

    // Same passphrase, different salt.
    let target = LocalSecretStore::open(&local_config(ours.path(), "pw")).await.unwrap();
    target.set("MINE", "m", None).await.unwrap();
    let result = target.import(&exported).await;
    assert!(matches!(result, Err(SecretError::DecryptionFailed(_))));
    assert_eq!(target.list().await.unwrap(), vec!["MINE"]);
}

#[tokio::test]
async fn test_health_check_leaves_vault_unchanged() {
    let dir = TempDir::new().unwrap();
    let config = local_config(dir.path(), "pw");
    let store = LocalSecretStore::open(&config).await.unwrap();
    store.set("A", "1", None).await.unwrap();
    let backups_before = store.list_backups().await.unwrap().len();

    assert!(store.health_check().await);
    assert_eq!(store.list().await.unwrap(), vec!["A"]);
    assert_eq!(store.list_backups().await.unwrap().len(), backups_before);
}

#[tokio::test]
async fn test_stale_handle_write_after_reencrypt_is_refused() {
    let dir = TempDir::new().unwrap();
    let config = local_config(dir.path(), "old");
    let a = LocalSecretStore::open(&config).await.unwrap();
    let b = LocalSecretStore::open(&config).await.unwrap();

    a.set("A", "1", None).await.unwrap();
    a.re_encrypt(&SecretString::new("new")).await.unwrap();

    let result = b.set("B", "2", None).await;
    assert!(matches!(result, Err(SecretError::DecryptionFailed(_))));
    drop((a, b));

    let reopened = LocalSecretStore::open(&local_config(dir.path(), "new")).await.unwrap();
    assert_eq!(reopened.get("A").await.unwrap().expose(), "1");
    assert!(reopened.get("B").await.is_none());
    assert!(reopened.verify().await.unwrap().is_empty());
    assert!(read_vault_json(&config.store_path)["keyCheck"].is_string());
}

//! End-to-end tests of the `vaultkeep` binary against a throwaway vault.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

const OVERRIDES: &[&str] = &[
    "VAULTKEEP_CONFIG",
    "VAULTKEEP_PROVIDER",
    "VAULTKEEP_MASTER_PASSPHRASE",
    "VAULTKEEP_STORE_PATH",
    "VAULTKEEP_BACKUP_PATH",
    "VAULTKEEP_AUTO_BACKUP",
    "VAULTKEEP_NEW_PASSPHRASE",
    "VAULTKEEP_LOG",
];

struct Sandbox {
    dir: TempDir,
    config: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("vaultkeep.json5");
        let body = serde_json::json!({
            "secrets": {
                "provider": "local",
                "local": {
                    "masterPassphrase": "correct-horse-battery",
                    "storePath": dir.path().join("vault.json"),
                    "backupPath": dir.path().join("backups"),
                    "kdfIterations": 1000
                }
            },
            "logging": { "level": "warn" }
        });
        std::fs::write(&config, serde_json::to_string_pretty(&body).unwrap()).unwrap();
        Self { dir, config }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_vaultkeep"));
        for var in OVERRIDES {
            cmd.env_remove(var);
        }
        cmd.env("VAULTKEEP_HOME", self.path())
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&self.config);
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.cmd().args(args).output().expect("failed to run vaultkeep")
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_cli_version() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["version"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("vaultkeep"));
}

#[test]
fn test_cli_help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_vaultkeep"))
        .arg("--help")
        .output()
        .unwrap();
    assert!(output.status.success());
    let help = stdout(&output);
    for command in ["get", "set", "rotate", "validate", "migrate", "reencrypt", "backups"] {
        assert!(help.contains(command), "help should mention '{command}': {help}");
    }
}

#[test]
fn test_cli_unknown_command() {
    let sandbox = Sandbox::new();
    assert!(!sandbox.run(&["nonexistent-command"]).status.success());
}

#[test]
fn test_set_get_list_metadata() {
    let sandbox = Sandbox::new();

    let set = sandbox.run(&["set", "API_KEY", "--value", "sk-12345"]);
    assert!(set.status.success(), "set failed: {}", stderr(&set));

    let get = sandbox.run(&["get", "API_KEY"]);
    assert!(get.status.success());
    assert_eq!(stdout(&get).trim(), "sk-12345");

    let list = sandbox.run(&["list", "--json"]);
    let keys: Vec<String> = serde_json::from_str(&stdout(&list)).unwrap();
    assert_eq!(keys, vec!["API_KEY"]);

    let meta = sandbox.run(&["metadata", "API_KEY"]);
    let meta: serde_json::Value = serde_json::from_str(&stdout(&meta)).unwrap();
    assert_eq!(meta["version"], 1);

    let raw = std::fs::read_to_string(sandbox.path().join("vault.json")).unwrap();
    assert!(!raw.contains("sk-12345"));
}

#[test]
fn test_get_missing_fails() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["get", "NOPE"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("NOPE"));
}

#[test]
fn test_exists_exit_code() {
    let sandbox = Sandbox::new();
    let missing = sandbox.run(&["exists", "K"]);
    assert!(!missing.status.success());
    assert_eq!(stdout(&missing).trim(), "false");

    sandbox.run(&["set", "K", "--value", "v"]);
    let present = sandbox.run(&["exists", "K"]);
    assert!(present.status.success());
    assert_eq!(stdout(&present).trim(), "true");
}

#[test]
fn test_rotate() {
    let sandbox = Sandbox::new();
    assert!(!sandbox.run(&["rotate", "X", "--value", "1"]).status.success());

    sandbox.run(&["set", "X", "--value", "1"]);
    sandbox.run(&["set", "X", "--value", "2"]);
    let rotate = sandbox.run(&["rotate", "X", "--value", "3"]);
    assert!(rotate.status.success(), "rotate failed: {}", stderr(&rotate));

    let meta = sandbox.run(&["metadata", "X"]);
    let meta: serde_json::Value = serde_json::from_str(&stdout(&meta)).unwrap();
    assert_eq!(meta["version"], 3);
    assert!(meta["rotationDate"].is_string());
    assert_eq!(stdout(&sandbox.run(&["get", "X"])).trim(), "3");
}

#[test]
fn test_required_and_validate() {
    let sandbox = Sandbox::new();
    assert!(sandbox.run(&["required", "add", "JWT_SECRET"]).status.success());

    let listed = sandbox.run(&["required", "list"]);
    assert_eq!(stdout(&listed).trim(), "JWT_SECRET");

    let failing = sandbox.run(&["validate", "--json"]);
    assert!(!failing.status.success());
    let result: serde_json::Value = serde_json::from_str(&stdout(&failing)).unwrap();
    assert_eq!(result["missing"], serde_json::json!(["JWT_SECRET"]));

    sandbox.run(&["set", "JWT_SECRET", "--value", "s3cret"]);
    assert!(sandbox.run(&["validate"]).status.success());

    // The passphrase in the file is untouched by the edit.
    let config = std::fs::read_to_string(&sandbox.config).unwrap();
    assert!(config.contains("correct-horse-battery"));
}

#[test]
fn test_export_import() {
    let sandbox = Sandbox::new();
    sandbox.run(&["set", "A", "--value", "1"]);
    let export_path = sandbox.path().join("export.json");

    let export = sandbox.run(&["export", "--output", export_path.to_str().unwrap()]);
    assert!(export.status.success(), "export failed: {}", stderr(&export));

    sandbox.run(&["delete", "A"]);
    assert!(!sandbox.run(&["get", "A"]).status.success());

    let import = sandbox.run(&["import", export_path.to_str().unwrap()]);
    assert!(import.status.success(), "import failed: {}", stderr(&import));
    assert_eq!(stdout(&sandbox.run(&["get", "A"])).trim(), "1");
}

#[test]
fn test_import_rejects_garbage() {
    let sandbox = Sandbox::new();
    sandbox.run(&["set", "A", "--value", "1"]);
    let bad = sandbox.path().join("bad.json");
    std::fs::write(&bad, r#"{"hello": "world"}"#).unwrap();

    assert!(!sandbox.run(&["import", bad.to_str().unwrap()]).status.success());
    assert_eq!(stdout(&sandbox.run(&["get", "A"])).trim(), "1");
}

#[test]
fn test_reencrypt() {
    let sandbox = Sandbox::new();
    sandbox.run(&["set", "A", "--value", "1"]);

    let reencrypt = sandbox.run(&["reencrypt", "--new-passphrase", "new-passphrase"]);
    assert!(reencrypt.status.success(), "reencrypt failed: {}", stderr(&reencrypt));

    // The config still names the old passphrase.
    assert!(!sandbox.run(&["get", "A"]).status.success());

    let output = sandbox
        .cmd()
        .env("VAULTKEEP_MASTER_PASSPHRASE", "new-passphrase")
        .args(["get", "A"])
        .output()
        .unwrap();
    assert_eq!(stdout(&output).trim(), "1");
}

#[test]
fn test_backups() {
    let sandbox = Sandbox::new();
    for value in ["1", "2", "3"] {
        sandbox.run(&["set", "A", "--value", value]);
    }
    let created = sandbox.run(&["backups", "create"]);
    assert!(created.status.success(), "backup failed: {}", stderr(&created));

    let listed = sandbox.run(&["backups", "list"]);
    assert!(listed.status.success());
    let lines = stdout(&listed).lines().filter(|l| l.contains("vault-")).count();
    assert_eq!(lines, 3);
}

#[test]
fn test_migrate_from_env_to_local() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .cmd()
        .env("VAULTKEEP_PROVIDER", "env")
        .env("VK_SMOKE_TOKEN", "from-env")
        .args(["migrate", "--to", "local", "VK_SMOKE_TOKEN"])
        .output()
        .unwrap();
    assert!(output.status.success(), "migrate failed: {}", stderr(&output));

    assert_eq!(stdout(&sandbox.run(&["get", "VK_SMOKE_TOKEN"])).trim(), "from-env");
}

#[test]
fn test_remote_provider_falls_back_to_env() {
    let sandbox = Sandbox::new();
    let output = sandbox
        .cmd()
        .env("VAULTKEEP_PROVIDER", "aws")
        .env("VK_SMOKE_FALLBACK", "yes")
        .args(["get", "VK_SMOKE_FALLBACK"])
        .output()
        .unwrap();
    assert!(output.status.success(), "get failed: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "yes");
    assert!(stderr(&output).contains("aws"));
}

#[test]
fn test_health() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["health"]);
    assert!(output.status.success(), "health failed: {}", stderr(&output));
}

#[test]
fn test_config_show_redacts_passphrase() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["config", "show"]);
    assert!(output.status.success());
    let shown = stdout(&output);
    assert!(shown.contains("[REDACTED]"));
    assert!(!shown.contains("correct-horse-battery"));
}

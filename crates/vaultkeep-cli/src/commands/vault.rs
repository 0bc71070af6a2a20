//! Encrypted vault maintenance: export, import, re-encryption and backups.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use console::style;
use vaultkeep_core::{Config, SecretString};

use crate::context::{self, CHECK, WARN};

/// Backups command arguments.
#[derive(Args)]
pub struct BackupsArgs {
    #[command(subcommand)]
    pub command: BackupsCommand,
}

#[derive(clap::Subcommand)]
pub enum BackupsCommand {
    /// List backups, newest first
    List,

    /// Back up the vault now
    Create,

    /// Replace the vault with a backup
    Restore {
        /// Backup file
        path: PathBuf,
    },
}

pub async fn export(config: &Config, output: Option<&Path>) -> anyhow::Result<()> {
    let manager = context::open_manager(config).await?;
    let data = manager.export().await?;

    match output {
        Some(path) => {
            write_private(path, data.as_bytes())
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("{} Exported vault to {}", style(CHECK).green(), path.display());
        }
        None => println!("{data}"),
    }
    Ok(())
}

/// Exports stay encrypted but are still written owner-only. The file is
/// created with mode 0600, never briefly readable by others.
fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        // Overwriting a pre-existing file: tighten before writing.
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

pub async fn import(config: &Config, file: &Path) -> anyhow::Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let manager = context::open_manager(config).await?;
    let count = manager.import(&data).await?;
    println!("{} Imported {} secret(s)", style(CHECK).green(), count);
    Ok(())
}

pub async fn reencrypt(config: &Config, new_passphrase: Option<String>) -> anyhow::Result<()> {
    let manager = context::open_manager(config).await?;
    context::require_local(&manager, "reencrypt")?;

    let new_passphrase = match new_passphrase {
        Some(p) if !p.is_empty() => p,
        Some(_) => anyhow::bail!("New passphrase must not be empty"),
        None => {
            let first = context::prompt_secret("New master passphrase: ")?;
            let second = context::prompt_secret("Repeat new master passphrase: ")?;
            if first != second {
                anyhow::bail!("Passphrases do not match");
            }
            first
        }
    };

    let count = manager.re_encrypt(&SecretString::new(new_passphrase)).await?;
    println!("{} Re-encrypted {} secret(s)", style(CHECK).green(), count);
    println!(
        "  {} Update secrets.local.masterPassphrase or VAULTKEEP_MASTER_PASSPHRASE before the next run",
        style(WARN).yellow()
    );
    Ok(())
}

pub async fn backups(config: &Config, args: BackupsArgs) -> anyhow::Result<()> {
    let manager = context::open_manager(config).await?;
    let store = context::require_local(&manager, "backups")?;

    match args.command {
        BackupsCommand::List => {
            let backups = manager.list_backups().await?;
            if backups.is_empty() {
                println!("No backups in {}", store.backup_path().display());
                return Ok(());
            }
            println!("{:<24} {:>9}  {}", "CREATED", "BYTES", "PATH");
            for backup in &backups {
                let created = backup
                    .created_at
                    .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<24} {:>9}  {}", created, backup.size_bytes, backup.path.display());
            }
        }

        BackupsCommand::Create => {
            let path = manager.backup_now().await?;
            println!("{} Created backup {}", style(CHECK).green(), path.display());
        }

        BackupsCommand::Restore { path } => {
            let count = manager.restore_backup(&path).await?;
            println!(
                "{} Restored {} secret(s) from {}",
                style(CHECK).green(),
                count,
                path.display()
            );
        }
    }

    Ok(())
}

//! Required-key validation, the required-key list, and migration.

use std::path::Path;

use clap::Args;
use console::style;
use vaultkeep_core::config::ProviderKind;
use vaultkeep_core::Config;
use vaultkeep_secrets::provider::validate_key;
use vaultkeep_secrets::ProviderRegistry;

use crate::context::{self, CHECK, CROSS, WARN};

/// Required command arguments.
#[derive(Args)]
pub struct RequiredArgs {
    #[command(subcommand)]
    pub command: RequiredCommand,
}

#[derive(clap::Subcommand)]
pub enum RequiredCommand {
    /// Add a key to `secrets.required`
    Add {
        /// Secret key
        key: String,
    },

    /// Remove a key from `secrets.required`
    Remove {
        /// Secret key
        key: String,
    },

    /// Show `secrets.required`
    List,
}

pub async fn validate(config: &Config, keys: Vec<String>, json: bool) -> anyhow::Result<()> {
    let manager = context::open_manager(config).await?;
    let keys = if keys.is_empty() {
        manager.required_keys().await
    } else {
        keys
    };

    let result = manager.validate_keys(&keys).await;
    let upcoming = manager.upcoming_rotations(&keys).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        if keys.is_empty() {
            println!("No required secrets configured.");
        }
        for key in &keys {
            if result.missing.contains(key) {
                println!("  {} {} missing", style(CROSS).red(), key);
            } else if result.expired.contains(key) {
                println!("  {} {} expired", style(CROSS).red(), key);
            } else if result.requires_rotation.contains(key) {
                println!("  {} {} due for rotation", style(WARN).yellow(), key);
            } else {
                println!("  {} {}", style(CHECK).green(), key);
            }
        }
        for notice in &upcoming {
            println!(
                "  {} {} rotation due {}",
                style(WARN).yellow(),
                notice.key,
                notice.due_at.format("%Y-%m-%d")
            );
        }
    }

    if !result.valid {
        anyhow::bail!(
            "validation failed: {} missing, {} expired",
            result.missing.len(),
            result.expired.len()
        );
    }
    Ok(())
}

/// Edit `secrets.required` in the config file.
///
/// Works on the file as written so environment overrides (a passphrase from
/// `VAULTKEEP_MASTER_PASSPHRASE`, say) are never saved into it.
pub fn required(config_path: Option<&Path>, args: RequiredArgs) -> anyhow::Result<()> {
    let path = context::config_path(config_path)?;
    let mut config = context::load_file_config(config_path)?;

    match args.command {
        RequiredCommand::Add { key } => {
            validate_key(&key)?;
            if config.secrets.required.contains(&key) {
                println!("'{key}' is already required");
                return Ok(());
            }
            config.secrets.required.push(key.clone());
            config.save(&path)?;
            println!("{} '{}' added to required secrets", style(CHECK).green(), key);
        }

        RequiredCommand::Remove { key } => {
            let before = config.secrets.required.len();
            config.secrets.required.retain(|k| k != &key);
            if config.secrets.required.len() == before {
                anyhow::bail!("'{key}' is not in the required list");
            }
            config.save(&path)?;
            println!("{} '{}' removed from required secrets", style(CHECK).green(), key);
        }

        RequiredCommand::List => {
            if config.secrets.required.is_empty() {
                println!("No required secrets configured.");
            }
            for key in &config.secrets.required {
                println!("{key}");
            }
        }
    }

    Ok(())
}

pub async fn migrate(config: &Config, to: &str, keys: Vec<String>) -> anyhow::Result<()> {
    let target_kind: ProviderKind = to.parse()?;
    let manager = context::open_manager(config).await?;

    if target_kind.as_str() == manager.provider_name() {
        anyhow::bail!("source and target are both '{target_kind}'");
    }

    let target = ProviderRegistry::with_builtins()
        .create(target_kind, &config.secrets)
        .await?;

    let keys = (!keys.is_empty()).then_some(keys);
    let result = manager.migrate(target.as_ref(), keys.as_deref()).await?;

    for key in &result.migrated {
        println!("  {} {}", style(CHECK).green(), key);
    }
    for failure in &result.failed {
        println!("  {} {}: {}", style(CROSS).red(), failure.key, failure.error);
    }
    println!(
        "\nMigrated {}/{} secret(s) from '{}' to '{}'",
        result.migrated.len(),
        result.total,
        manager.provider_name(),
        target.name()
    );

    if !result.success {
        anyhow::bail!("{} secret(s) failed to migrate", result.failed.len());
    }
    Ok(())
}

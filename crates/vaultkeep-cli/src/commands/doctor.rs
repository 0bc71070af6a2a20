//! Diagnostic commands.

use std::path::Path;

use clap::Args;
use console::style;
use vaultkeep_core::error::ConfigError;
use vaultkeep_core::{paths, Config};
use vaultkeep_secrets::PassphraseSource;

use crate::context::{self, CHECK, CROSS, WARN};

/// Doctor command arguments.
#[derive(Args)]
pub struct DoctorArgs {
    /// Also decrypt every record and run the provider self-test
    #[arg(long)]
    pub full: bool,
}

/// Run the provider self-test.
pub async fn health(config: &Config) -> anyhow::Result<()> {
    let manager = context::open_manager(config).await?;
    if manager.health_check().await {
        println!("{} Provider '{}' is healthy", style(CHECK).green(), manager.provider_name());
        Ok(())
    } else {
        anyhow::bail!("provider '{}' failed its health check", manager.provider_name())
    }
}

/// Run the doctor command.
pub async fn run(config_path: Option<&Path>, config: &Config, args: DoctorArgs) -> anyhow::Result<()> {
    println!("VaultKeep Doctor\n");

    let mut errors = 0;
    let mut warnings = 0;

    // Check directories
    println!("Checking directories...");

    match paths::base_dir() {
        Ok(dir) if dir.exists() => {
            println!("  {} Base directory exists: {:?}", style(CHECK).green(), dir);
        }
        Ok(dir) => {
            println!("  {} Base directory missing: {:?}", style(WARN).yellow(), dir);
            warnings += 1;
        }
        Err(e) => {
            println!("  {} Failed to determine base directory: {}", style(CROSS).red(), e);
            errors += 1;
        }
    }

    // Check config
    println!("\nChecking configuration...");

    let path = context::config_path(config_path)?;
    match Config::load(&path) {
        Ok(_) => println!("  {} Configuration loaded from {:?}", style(CHECK).green(), path),
        Err(ConfigError::NotFound(_)) => {
            println!("  {} Configuration file not found, using defaults", style(WARN).yellow());
            println!("    Run 'vaultkeep config init' to create one");
            warnings += 1;
        }
        Err(e) => {
            println!("  {} Configuration error: {}", style(CROSS).red(), e);
            errors += 1;
        }
    }
    match config.validate() {
        Ok(()) => println!("  {} Configuration valid", style(CHECK).green()),
        Err(e) => {
            println!("  {} Configuration invalid: {}", style(CROSS).red(), e);
            errors += 1;
        }
    }

    // Check provider
    println!("\nChecking secret provider...");

    let manager = match context::open_manager(config).await {
        Ok(manager) => manager,
        Err(e) => {
            println!("  {} Provider failed to start: {:#}", style(CROSS).red(), e);
            return summarize(errors + 1, warnings);
        }
    };

    match manager.fallback() {
        Some(fallback) => {
            println!(
                "  {} Configured provider '{}' unavailable, using '{}'",
                style(WARN).yellow(),
                fallback.requested,
                manager.provider_name()
            );
            warnings += 1;
        }
        None => println!("  {} Active provider: {}", style(CHECK).green(), manager.provider_name()),
    }

    if let Some(store) = manager.local_store() {
        println!("  {} Vault file: {:?}", style(CHECK).green(), store.store_path());
        if store.passphrase_source() == PassphraseSource::Generated {
            println!(
                "  {} No master passphrase configured; secrets will be unreadable after exit",
                style(CROSS).red()
            );
            errors += 1;
        }

        match manager.list_backups().await {
            Ok(backups) => println!(
                "  {} {} backup(s) in {:?}",
                style(CHECK).green(),
                backups.len(),
                store.backup_path()
            ),
            Err(e) => {
                println!("  {} Cannot read backups: {}", style(WARN).yellow(), e);
                warnings += 1;
            }
        }
    }

    // Check required secrets
    println!("\nChecking required secrets...");

    let result = manager.validate().await;
    let required = manager.required_keys().await;
    if required.is_empty() {
        println!("  {} No required secrets configured", style(CHECK).green());
    } else if result.valid {
        println!("  {} All {} required secret(s) present", style(CHECK).green(), required.len());
    } else {
        for key in &result.missing {
            println!("  {} Missing: {}", style(CROSS).red(), key);
        }
        for key in &result.expired {
            println!("  {} Expired: {}", style(CROSS).red(), key);
        }
        errors += result.missing.len() + result.expired.len();
    }
    for key in &result.requires_rotation {
        println!("  {} Due for rotation: {}", style(WARN).yellow(), key);
        warnings += 1;
    }

    if args.full {
        println!("\nRunning provider self-test...");
        if manager.health_check().await {
            println!("  {} Health check passed", style(CHECK).green());
        } else {
            println!("  {} Health check failed", style(CROSS).red());
            errors += 1;
        }

        if manager.local_store().is_some() {
            match manager.verify().await {
                Ok(unreadable) if unreadable.is_empty() => {
                    println!("  {} Every record decrypts with the active key", style(CHECK).green());
                }
                Ok(unreadable) => {
                    for key in &unreadable {
                        println!("  {} Cannot decrypt: {}", style(CROSS).red(), key);
                    }
                    errors += unreadable.len();
                }
                Err(e) => {
                    println!("  {} Verification failed: {}", style(CROSS).red(), e);
                    errors += 1;
                }
            }
        }
    }

    summarize(errors, warnings)
}

fn summarize(errors: usize, warnings: usize) -> anyhow::Result<()> {
    println!("\n{}", style("Summary").bold());
    println!("  Errors: {}", if errors > 0 { style(errors).red() } else { style(errors).green() });
    println!("  Warnings: {}", if warnings > 0 { style(warnings).yellow() } else { style(warnings).green() });

    if errors > 0 {
        anyhow::bail!("{} error(s) found", errors);
    }

    Ok(())
}

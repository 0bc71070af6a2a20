//! Configuration management commands.

use std::path::Path;

use clap::Args;
use console::style;
use serde_json::Value;
use vaultkeep_core::config::Config;

use crate::context::{self, CHECK};

const REDACTED: &str = "[REDACTED]";

/// Config command arguments.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(clap::Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (passphrase redacted)
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key (dot-separated camelCase path, e.g. secrets.local.storePath)
        key: String,
    },

    /// Set a configuration value in the config file
    Set {
        /// Configuration key
        key: String,

        /// Value to set (parsed as JSON, else taken as a string)
        value: String,
    },

    /// Write a default config file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

/// Run the config command.
pub fn run(config_path: Option<&Path>, args: ConfigArgs) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = context::load_config(config_path)?;
            let json = redacted(&config)?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }

        ConfigCommand::Get { key } => {
            let config = context::load_config(config_path)?;
            let json = redacted(&config)?;
            match lookup(&json, &key) {
                Some(v) => println!("{}", serde_json::to_string_pretty(v)?),
                None => anyhow::bail!("Key not found: {}", key),
            }
        }

        ConfigCommand::Set { key, value } => {
            let path = context::config_path(config_path)?;
            let config = context::load_file_config(config_path)?;
            let mut json = serde_json::to_value(&config)?;
            assign(&mut json, &key, &value);

            // Deserialize back to Config to validate the shape is still correct
            let updated: Config = serde_json::from_value(json)
                .map_err(|e| anyhow::anyhow!("Invalid configuration after set: {}", e))?;
            updated.validate()?;
            updated.save(&path)?;

            println!("{} Set {}", style(CHECK).green(), key);
        }

        ConfigCommand::Init { force } => {
            let path = context::config_path(config_path)?;
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists: {:?}. Use --force to overwrite.",
                    path
                );
            }

            Config::default().save(&path)?;
            println!("{} Created config file: {:?}", style(CHECK).green(), path);
            println!("  Set VAULTKEEP_MASTER_PASSPHRASE (or secrets.local.masterPassphrase) before storing secrets.");
        }

        ConfigCommand::Path => {
            let path = context::config_path(config_path)?;
            println!("{}", path.display());
        }

        ConfigCommand::Validate => {
            let config = context::load_config(config_path)?;
            match config.validate() {
                Ok(()) => println!("{} Configuration is valid", style(CHECK).green()),
                Err(e) => anyhow::bail!("Configuration error: {}", e),
            }
        }
    }

    Ok(())
}

/// The config as JSON with the master passphrase masked.
fn redacted(config: &Config) -> anyhow::Result<Value> {
    let mut json = serde_json::to_value(config)?;
    if let Some(passphrase) = json.pointer_mut("/secrets/local/masterPassphrase") {
        *passphrase = Value::String(REDACTED.to_string());
    }
    Ok(json)
}

/// Walk a dot-separated path.
fn lookup<'a>(json: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(json, |acc, k| acc.get(k))
}

/// Set a dot-separated path, creating intermediate objects as needed.
fn assign(json: &mut Value, key: &str, raw: &str) {
    // Parse value as JSON first (numbers, bools, arrays), fall back to a string.
    let parsed: Value =
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));

    let parts: Vec<&str> = key.split('.').collect();
    let mut current = json;
    for (i, part) in parts.iter().enumerate() {
        if i == parts.len() - 1 {
            current[*part] = parsed;
            return;
        }
        if !current.get(*part).is_some_and(Value::is_object) {
            current[*part] = serde_json::json!({});
        }
        current = &mut current[*part];
    }
}

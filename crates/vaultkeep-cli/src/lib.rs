//! VaultKeep command-line interface.

pub mod commands;
pub mod context;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vaultkeep_core::Config;

/// VaultKeep - encrypted secret storage and policy checks
#[derive(Parser)]
#[command(name = "vaultkeep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "VAULTKEEP_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Print a secret value
    Get {
        /// Secret key
        key: String,
    },

    /// Store a secret (prompts for the value if omitted)
    Set {
        /// Secret key
        key: String,

        /// Secret value (if omitted, prompts for hidden input)
        #[arg(long)]
        value: Option<String>,

        /// Mark the secret as expiring after this many days
        #[arg(long)]
        expires_in_days: Option<u32>,
    },

    /// Delete a secret
    Delete {
        /// Secret key
        key: String,
    },

    /// List stored keys
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether a key exists (exit code 1 if not)
    Exists {
        /// Secret key
        key: String,
    },

    /// Show a secret's metadata
    Metadata {
        /// Secret key
        key: String,
    },

    /// Replace an existing secret's value and stamp its rotation date
    Rotate {
        /// Secret key
        key: String,

        /// New value (if omitted, prompts for hidden input)
        #[arg(long)]
        value: Option<String>,
    },

    /// Check required secrets (defaults to the configured list)
    Validate {
        /// Keys to check instead of `secrets.required`
        keys: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the required-key list in the config file
    Required(commands::policy::RequiredArgs),

    /// Copy secrets from the active provider to another provider
    Migrate {
        /// Target provider kind
        #[arg(long)]
        to: String,

        /// Keys to migrate (defaults to all)
        keys: Vec<String>,
    },

    /// Export the encrypted vault
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace the vault with an exported file
    Import {
        /// Exported vault file
        file: PathBuf,
    },

    /// Re-encrypt the vault under a new master passphrase
    Reencrypt {
        /// New passphrase (if omitted, prompts twice for hidden input)
        #[arg(long, env = "VAULTKEEP_NEW_PASSPHRASE", hide_env_values = true)]
        new_passphrase: Option<String>,
    },

    /// Manage vault backups
    Backups(commands::vault::BackupsArgs),

    /// Run the provider self-test
    Health,

    /// Configuration management
    Config(commands::config::ConfigArgs),

    /// Run diagnostics
    Doctor(commands::doctor::DoctorArgs),

    /// Show version information
    Version,
}

/// Run the CLI with the given arguments and loaded configuration.
pub async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    let config_path = cli.config;
    match cli.command {
        Commands::Get { key } => commands::secrets::get(&config, &key).await,
        Commands::Set {
            key,
            value,
            expires_in_days,
        } => commands::secrets::set(&config, &key, value, expires_in_days).await,
        Commands::Delete { key } => commands::secrets::delete(&config, &key).await,
        Commands::List { json } => commands::secrets::list(&config, json).await,
        Commands::Exists { key } => commands::secrets::exists(&config, &key).await,
        Commands::Metadata { key } => commands::secrets::metadata(&config, &key).await,
        Commands::Rotate { key, value } => commands::secrets::rotate(&config, &key, value).await,
        Commands::Validate { keys, json } => commands::policy::validate(&config, keys, json).await,
        Commands::Required(args) => commands::policy::required(config_path.as_deref(), args),
        Commands::Migrate { to, keys } => commands::policy::migrate(&config, &to, keys).await,
        Commands::Export { output } => commands::vault::export(&config, output.as_deref()).await,
        Commands::Import { file } => commands::vault::import(&config, &file).await,
        Commands::Reencrypt { new_passphrase } => {
            commands::vault::reencrypt(&config, new_passphrase).await
        }
        Commands::Backups(args) => commands::vault::backups(&config, args).await,
        Commands::Health => commands::doctor::health(&config).await,
        Commands::Config(args) => commands::config::run(config_path.as_deref(), args),
        Commands::Doctor(args) => commands::doctor::run(config_path.as_deref(), &config, args).await,
        Commands::Version => {
            println!("vaultkeep {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

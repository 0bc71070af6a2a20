//! VaultKeep CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vaultkeep_cli::{context, run, Cli, Commands};
use vaultkeep_core::config::LoggingConfig;
use vaultkeep_core::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Logging settings come from the config, so load it first. A broken
    // config must not lock the operator out of the commands that repair it.
    let config = match context::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) if matches!(cli.command, Commands::Config(_) | Commands::Doctor(_) | Commands::Version) => {
            eprintln!("warning: {e:#}; continuing with defaults");
            Config::default()
        }
        Err(e) => return Err(e),
    };
    init_logging(&config.logging, cli.verbose, cli.log_json);

    // Run the command
    run(cli, config).await
}

fn init_logging(logging: &LoggingConfig, verbose: u8, force_json: bool) {
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vaultkeep={level}")));

    // Logs go to stderr so command output on stdout stays pipeable
    let registry = tracing_subscriber::registry().with(filter);
    if force_json || logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

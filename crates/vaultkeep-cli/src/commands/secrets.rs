//! Secret read/write commands.
//!
//! `vaultkeep get|set|delete|list|exists|metadata|rotate`, all routed through
//! the [`SecretManager`](vaultkeep_secrets::SecretManager) so provider
//! selection and fallback match what applications see.

use chrono::{Duration, Utc};
use console::style;
use vaultkeep_core::Config;

use crate::context::{self, CHECK};

pub async fn get(config: &Config, key: &str) -> anyhow::Result<()> {
    let manager = context::open_manager(config).await?;
    let secret = manager.get_or_throw(key).await?;
    println!("{}", secret.expose());
    Ok(())
}

pub async fn set(
    config: &Config,
    key: &str,
    value: Option<String>,
    expires_in_days: Option<u32>,
) -> anyhow::Result<()> {
    let value = match value {
        Some(v) if !v.is_empty() => v,
        Some(_) => anyhow::bail!("Secret value must not be empty"),
        None => context::prompt_secret(&format!("Enter value for '{key}': "))?,
    };
    let expires_at = expires_in_days.map(|days| Utc::now() + Duration::days(i64::from(days)));

    let manager = context::open_manager(config).await?;
    manager.set(key, &value, expires_at).await?;

    let version = manager
        .get_metadata(key)
        .await
        .map(|m| m.version)
        .unwrap_or_default();
    println!("{} Stored '{}' (version {})", style(CHECK).green(), key, version);
    Ok(())
}

pub async fn delete(config: &Config, key: &str) -> anyhow::Result<()> {
    let manager = context::open_manager(config).await?;
    manager.delete(key).await?;
    println!("{} Deleted '{}'", style(CHECK).green(), key);
    Ok(())
}

pub async fn list(config: &Config, json: bool) -> anyhow::Result<()> {
    let manager = context::open_manager(config).await?;
    let keys = manager.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&keys)?);
        return Ok(());
    }

    if keys.is_empty() {
        println!("No secrets stored.");
        return Ok(());
    }

    println!("{:<40} {:>7}  {}", "KEY", "VERSION", "UPDATED");
    println!("{}", "-".repeat(72));
    for key in &keys {
        match manager.get_metadata(key).await {
            Some(meta) => println!(
                "{:<40} {:>7}  {}",
                key,
                meta.version,
                meta.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            None => println!("{:<40} {:>7}  -", key, "-"),
        }
    }
    println!("\n{} secret(s) total.", keys.len());
    Ok(())
}

pub async fn exists(config: &Config, key: &str) -> anyhow::Result<()> {
    let manager = context::open_manager(config).await?;
    let present = manager.exists(key).await;
    println!("{present}");
    if !present {
        anyhow::bail!("Secret '{key}' does not exist");
    }
    Ok(())
}

pub async fn metadata(config: &Config, key: &str) -> anyhow::Result<()> {
    let manager = context::open_manager(config).await?;
    match manager.get_metadata(key).await {
        Some(meta) => {
            println!("{}", serde_json::to_string_pretty(&meta)?);
            Ok(())
        }
        None => anyhow::bail!("Secret not found: {key}"),
    }
}

pub async fn rotate(config: &Config, key: &str, value: Option<String>) -> anyhow::Result<()> {
    let manager = context::open_manager(config).await?;
    if !manager.exists(key).await {
        anyhow::bail!("Secret not found: {key}");
    }

    let value = match value {
        Some(v) if !v.is_empty() => v,
        Some(_) => anyhow::bail!("Secret value must not be empty"),
        None => context::prompt_secret(&format!("Enter new value for '{key}': "))?,
    };

    manager.rotate(key, &value).await?;
    let version = manager
        .get_metadata(key)
        .await
        .map(|m| m.version)
        .unwrap_or_default();
    println!("{} Rotated '{}' (version {})", style(CHECK).green(), key, version);
    Ok(())
}

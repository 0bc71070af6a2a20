//! Rolling vault backups.
//!
//! Backups are named `vault-<UTC timestamp>-<seq>.json`. Both parts are fixed
//! width, so lexical order is creation order and pruning removes from the
//! front of the sorted listing.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, warn};

use super::persist::{ensure_private_dir, write_private_file};
use crate::error::Result;
use crate::types::BackupInfo;

const PREFIX: &str = "vault-";
const SUFFIX: &str = ".json";
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.9fZ";

fn backup_file_name(now: DateTime<Utc>, seq: u64) -> String {
    format!("{PREFIX}{}-{seq:06}{SUFFIX}", now.format(TIMESTAMP_FORMAT))
}

fn parse_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let stem = name.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;
    let (timestamp, _seq) = stem.rsplit_once('-')?;
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

fn is_backup_name(name: &str) -> bool {
    name.starts_with(PREFIX) && name.ends_with(SUFFIX)
}

/// Copy the current vault file into `dir`.
pub(crate) async fn create(vault_path: &Path, dir: &Path, seq: u64) -> Result<PathBuf> {
    ensure_private_dir(dir).await?;
    let data = tokio::fs::read(vault_path).await?;
    let path = dir.join(backup_file_name(Utc::now(), seq));
    write_private_file(&path, &data).await?;
    debug!(path = %path.display(), "created vault backup");
    Ok(path)
}

/// Backups in `dir`, newest first. A missing directory has no backups.
pub(crate) async fn list(dir: &Path) -> Result<Vec<BackupInfo>> {
    if !tokio::fs::try_exists(dir).await? {
        return Ok(Vec::new());
    }

    let mut backups = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_backup_name(&name) {
            continue;
        }
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        backups.push(BackupInfo {
            created_at: parse_timestamp(&name),
            path: entry.path(),
            size_bytes: metadata.len(),
        });
    }

    backups.sort_by(|a, b| b.path.file_name().cmp(&a.path.file_name()));
    Ok(backups)
}

/// Delete all but the newest `keep` backups. Returns how many were removed.
///
/// Individual delete failures are logged and skipped.
pub(crate) async fn prune(dir: &Path, keep: usize) -> Result<usize> {
    let backups = list(dir).await?;
    let mut removed = 0;
    for stale in backups.iter().skip(keep) {
        match tokio::fs::remove_file(&stale.path).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %stale.path.display(), error = %e, "failed to prune backup"),
        }
    }
    if removed > 0 {
        debug!(removed, keep, "pruned vault backups");
    }
    Ok(removed)
}

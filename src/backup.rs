//! Database snapshots.
//!
//! Each backup is a standalone SQLite file named
//! `board-backup-<UTC timestamp>.db`. Retention is decided from the timestamp
//! in the name, so copying a backup directory around keeps its ages intact.

use crate::config::BackupConfig;
use crate::db::Database;
use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PREFIX: &str = "board-backup-";
const SUFFIX: &str = ".db";
const STAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%SZ";

pub fn backup_file_name(now: DateTime<Utc>) -> String {
    format!("{}{}{}", PREFIX, now.format(STAMP_FORMAT), SUFFIX)
}

/// Timestamp encoded in a backup file name, `None` for foreign files.
pub fn parse_backup_time(file_name: &str) -> Option<DateTime<Utc>> {
    let stamp = file_name.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;
    NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Snapshot the database into `dir`.
pub fn create_backup(db: &Database, dir: &Path, now: DateTime<Utc>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let target = dir.join(backup_file_name(now));

    // VACUUM INTO refuses to overwrite; a rerun within the same second replaces.
    if target.exists() {
        std::fs::remove_file(&target)?;
    }

    db.snapshot_to(&target)?;
    info!(path = %target.display(), "backup created");
    Ok(target)
}

/// Remove backups older than `keep_days`. Returns the removed paths.
pub fn prune_backups(dir: &Path, keep_days: u32, now: DateTime<Utc>) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let cutoff = now - Duration::days(i64::from(keep_days));
    let mut removed = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(taken_at) = name.to_str().and_then(parse_backup_time) else {
            continue;
        };

        if taken_at < cutoff {
            let path = entry.path();
            std::fs::remove_file(&path)?;
            debug!(path = %path.display(), "old backup removed");
            removed.push(path);
        }
    }

    if !removed.is_empty() {
        info!(count = removed.len(), "cleaned up old backups");
    }
    Ok(removed)
}

/// Create a backup then prune according to `config`.
pub fn run_backup(db: &Database, config: &BackupConfig, now: DateTime<Utc>) -> Result<PathBuf> {
    let path = create_backup(db, &config.dir, now)?;
    prune_backups(&config.dir, config.keep_days, now)?;
    Ok(path)
}

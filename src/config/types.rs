//! Configuration types.

use crate::types::{Column, ColumnRole};
use anyhow::{Result, anyhow, bail};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub board: BoardConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub backup: BackupConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

/// HTTP server and storage location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("kanbe/board.db")
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// One column seeded onto a fresh board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSeed {
    pub id: String,
    pub title: String,
    /// Inferred from the title and position when omitted.
    #[serde(default)]
    pub role: Option<ColumnRole>,
    #[serde(default)]
    pub wip_limit: u32,
}

impl ColumnSeed {
    fn new(id: &str, title: &str, role: ColumnRole) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            role: Some(role),
            wip_limit: 0,
        }
    }
}

/// Board shape and per-task limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(default = "default_columns")]
    pub default_columns: Vec<ColumnSeed>,

    #[serde(default = "default_item_limit")]
    pub max_tags: usize,

    #[serde(default = "default_item_limit")]
    pub max_subtasks: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            default_columns: default_columns(),
            max_tags: default_item_limit(),
            max_subtasks: default_item_limit(),
        }
    }
}

impl BoardConfig {
    /// Seeds resolved into columns, roles inferred where missing.
    pub fn column_templates(&self) -> Vec<Column> {
        self.default_columns
            .iter()
            .enumerate()
            .map(|(idx, seed)| Column {
                id: seed.id.clone(),
                title: seed.title.clone(),
                role: seed
                    .role
                    .unwrap_or_else(|| ColumnRole::infer(&seed.title, idx == 0)),
                position: idx as i64,
                wip_limit: seed.wip_limit,
            })
            .collect()
    }
}

fn default_columns() -> Vec<ColumnSeed> {
    vec![
        ColumnSeed::new("todo", "To Do", ColumnRole::Backlog),
        ColumnSeed::new("in-progress", "In Progress", ColumnRole::Active),
        ColumnSeed::new("done", "Done", ColumnRole::Done),
    ]
}

fn default_item_limit() -> usize {
    10
}

/// Daily job schedule (recurrence sweep and backup).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time of day in UTC, `HH:MM`.
    #[serde(default = "default_run_at")]
    pub run_at: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_at: default_run_at(),
        }
    }
}

impl ScheduleConfig {
    pub fn run_at_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.run_at.trim(), "%H:%M")
            .map_err(|e| anyhow!("schedule.run_at '{}' is not HH:MM: {}", self.run_at, e))
    }
}

fn default_run_at() -> String {
    "00:00".to_string()
}

fn default_true() -> bool {
    true
}

/// Nightly database snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_backup_dir")]
    pub dir: PathBuf,

    /// Snapshots older than this many days are removed.
    #[serde(default = "default_keep_days")]
    pub keep_days: u32,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_backup_dir(),
            keep_days: default_keep_days(),
        }
    }
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("kanbe/backups")
}

fn default_keep_days() -> u32 {
    7
}

/// History retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Events kept per task, 0 = unbounded.
    #[serde(default = "default_max_events")]
    pub max_events: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
        }
    }
}

fn default_max_events() -> usize {
    crate::db::DEFAULT_HISTORY_LIMIT
}

impl Config {
    /// Load configuration from a single file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.board.default_columns.is_empty() {
            bail!("board.default_columns must name at least one column");
        }

        let mut ids = HashSet::new();
        for seed in &self.board.default_columns {
            if seed.id.trim().is_empty() || seed.title.trim().is_empty() {
                bail!("board.default_columns entries need an id and a title");
            }
            if !ids.insert(seed.id.as_str()) {
                bail!("board.default_columns has duplicate id '{}'", seed.id);
            }
        }

        self.schedule.run_at_time()?;
        Ok(())
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.board.max_tags, 10);
        assert_eq!(config.backup.keep_days, 7);
        assert_eq!(config.history.max_events, 500);
    }

    #[test]
    fn default_columns_carry_roles() {
        let columns = BoardConfig::default().column_templates();
        let roles: Vec<_> = columns.iter().map(|c| c.role).collect();
        assert_eq!(
            roles,
            vec![ColumnRole::Backlog, ColumnRole::Active, ColumnRole::Done]
        );
        assert_eq!(columns[1].id, "in-progress");
    }

    #[test]
    fn seeds_without_role_are_inferred() {
        let yaml = r#"
default_columns:
  - id: ideas
    title: Ideas
  - id: doing
    title: Doing
  - id: shipped
    title: Done and dusted
"#;
        let board: BoardConfig = serde_yaml::from_str(yaml).unwrap();
        let roles: Vec<_> = board.column_templates().iter().map(|c| c.role).collect();
        assert_eq!(
            roles,
            vec![ColumnRole::Backlog, ColumnRole::Active, ColumnRole::Done]
        );
    }

    #[test]
    fn rejects_bad_run_at_and_duplicate_columns() {
        let mut config = Config::default();
        config.schedule.run_at = "25:99".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.board.default_columns.push(ColumnSeed::new("todo", "Again", ColumnRole::Active));
        assert!(config.validate().is_err());
    }
}

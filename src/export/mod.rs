//! Board export.
//!
//! Writes one user's board as a self-contained JSON document: columns in
//! order, then every task (archived ones included) with its full history and
//! comments.

use crate::board::BoardService;
use crate::error::BoardResult;
use crate::types::{Column, Comment, HistoryEvent, Task};
use anyhow::Result;
use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Export format version (semver).
pub const EXPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskExport {
    #[serde(flatten)]
    pub task: Task,
    pub history: Vec<HistoryEvent>,
    pub comments: Vec<Comment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardExport {
    pub export_version: String,
    pub exported_at: DateTime<Utc>,
    pub exported_by: String,
    pub user_id: String,
    pub columns: Vec<Column>,
    pub tasks: Vec<TaskExport>,
}

impl BoardExport {
    /// Snapshot a user's board.
    pub fn collect(service: &BoardService, user_id: &str) -> BoardResult<Self> {
        let columns = service.columns(user_id)?;
        let tasks = service
            .list_tasks(user_id, true)?
            .into_iter()
            .map(|task| {
                let history = service.history(user_id, &task.id, false)?;
                let comments = service.comments(user_id, &task.id)?;
                Ok(TaskExport {
                    task,
                    history,
                    comments,
                })
            })
            .collect::<BoardResult<Vec<_>>>()?;

        Ok(Self {
            export_version: EXPORT_VERSION.to_string(),
            exported_at: service.now(),
            exported_by: format!("kanbe v{}", env!("CARGO_PKG_VERSION")),
            user_id: user_id.to_string(),
            columns,
            tasks,
        })
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Serialize into `writer`, gzip-compressed when `compress` is set.
    pub fn write_to<W: Write>(&self, mut writer: W, compress: bool) -> Result<()> {
        let json = self.to_json_pretty()?;
        if compress {
            let mut encoder = GzEncoder::new(writer, Compression::default());
            encoder.write_all(json.as_bytes())?;
            encoder.finish()?;
        } else {
            writer.write_all(json.as_bytes())?;
            writer.flush()?;
        }
        Ok(())
    }
}

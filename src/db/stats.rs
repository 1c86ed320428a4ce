//! Aggregation queries for board statistics.

use super::{Database, to_ms};
use crate::types::{BoardStats, Column, ColumnCount};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use std::collections::HashMap;

impl Database {
    /// Aggregate statistics for one user's board.
    pub fn board_stats(
        &self,
        user_id: &str,
        columns: &[Column],
        now: DateTime<Utc>,
    ) -> Result<BoardStats> {
        self.with_conn(|conn| {
            let (total_tasks, archived_tasks): (i64, i64) = conn.query_row(
                "SELECT
                    COALESCE(SUM(CASE WHEN archived = 0 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN archived = 1 THEN 1 ELSE 0 END), 0)
                 FROM tasks WHERE user_id = ?1",
                params![user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;

            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM tasks
                 WHERE user_id = ?1 AND archived = 0 GROUP BY status",
            )?;
            let per_status: HashMap<String, i64> = stmt
                .query_map(params![user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<_>>()?;

            let tasks_by_column = columns
                .iter()
                .map(|column| {
                    let count = per_status.get(&column.id).copied().unwrap_or(0);
                    ColumnCount {
                        column_id: column.id.clone(),
                        title: column.title.clone(),
                        count,
                        over_wip_limit: column.is_over_limit(count as usize),
                    }
                })
                .collect();

            let overdue_tasks: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tasks
                 WHERE user_id = ?1 AND archived = 0 AND completed_at IS NULL
                   AND due_date IS NOT NULL AND due_date < ?2",
                params![user_id, to_ms(now)],
                |row| row.get(0),
            )?;

            let completed_last_7_days: i64 = conn.query_row(
                "SELECT COUNT(*) FROM tasks
                 WHERE user_id = ?1 AND completed_at IS NOT NULL AND completed_at >= ?2",
                params![user_id, to_ms(now - Duration::days(7))],
                |row| row.get(0),
            )?;

            let avg_cycle: Option<f64> = conn.query_row(
                "SELECT AVG(completed_at - started_at) FROM tasks
                 WHERE user_id = ?1 AND completed_at IS NOT NULL AND started_at IS NOT NULL",
                params![user_id],
                |row| row.get(0),
            )?;

            Ok(BoardStats {
                total_tasks,
                archived_tasks,
                tasks_by_column,
                overdue_tasks,
                completed_last_7_days,
                avg_cycle_time_ms: avg_cycle.map(|ms| ms.round() as i64),
            })
        })
    }
}

//! Append-only task history.

use super::to_ms;
use crate::types::HistoryEvent;
use anyhow::Result;
use rusqlite::{Connection, params};

/// Append events for a task, then evict the oldest rows beyond `limit`.
///
/// A `limit` of 0 keeps everything.
pub(crate) fn append_events(
    conn: &Connection,
    task_id: &str,
    events: &[HistoryEvent],
    limit: usize,
) -> Result<()> {
    if events.is_empty() {
        return Ok(());
    }

    let mut stmt = conn.prepare_cached(
        "INSERT INTO task_history (task_id, event, timestamp) VALUES (?1, ?2, ?3)",
    )?;
    for event in events {
        stmt.execute(params![
            task_id,
            serde_json::to_string(event)?,
            to_ms(event.timestamp)
        ])?;
    }

    if limit > 0 {
        conn.execute(
            "DELETE FROM task_history
             WHERE task_id = ?1 AND id NOT IN (
                 SELECT id FROM task_history WHERE task_id = ?1 ORDER BY id DESC LIMIT ?2
             )",
            params![task_id, limit as i64],
        )?;
    }

    Ok(())
}

/// Events of one task in insertion order.
pub(crate) fn read_events(conn: &Connection, task_id: &str) -> Result<Vec<HistoryEvent>> {
    let mut stmt =
        conn.prepare("SELECT event FROM task_history WHERE task_id = ?1 ORDER BY id ASC")?;
    let raw = stmt
        .query_map(params![task_id], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    raw.iter()
        .map(|s| serde_json::from_str(s).map_err(Into::into))
        .collect()
}

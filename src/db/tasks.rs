//! Task rows and the SQLite implementation of [`TaskStore`].

use super::history::{append_events, read_events};
use super::{Database, from_ms, from_opt_ms, to_ms};
use crate::error::BoardError;
use crate::store::{TaskChange, TaskStore};
use crate::types::{Column, HistoryEvent, Priority, Task};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::de::DeserializeOwned;

const TASK_SELECT: &str = "SELECT t.*,
        (SELECT COUNT(*) FROM comments c WHERE c.task_id = t.id) AS comment_count
     FROM tasks t";

/// Decode a JSON text column, reporting bad payloads as conversion failures.
fn json_column<T: DeserializeOwned>(row: &Row, name: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(name)?;
    serde_json::from_str(&raw).map_err(|e| {
        let idx = row.as_ref().column_index(name).unwrap_or(0);
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
    })
}

pub fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let priority: String = row.get("priority")?;
    let recurring: Option<String> = row.get("recurring")?;
    let recurring = match recurring {
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
            let idx = row.as_ref().column_index("recurring").unwrap_or(0);
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        })?),
        None => None,
    };

    Ok(Task {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: row.get("status")?,
        position: row.get("position")?,
        priority: Priority::from_str(&priority).unwrap_or_default(),
        tags: json_column(row, "tags")?,
        subtasks: json_column(row, "subtasks")?,
        dependencies: json_column(row, "dependencies")?,
        due_date: from_opt_ms(row.get("due_date")?)?,
        started_at: from_opt_ms(row.get("started_at")?)?,
        completed_at: from_opt_ms(row.get("completed_at")?)?,
        last_moved_at: from_opt_ms(row.get("last_moved_at")?)?,
        recurring,
        archived: row.get::<_, i64>("archived")? != 0,
        comment_count: row.get("comment_count")?,
        created_at: from_ms(row.get("created_at")?)?,
        updated_at: from_ms(row.get("updated_at")?)?,
    })
}

/// Load a task using an existing connection (avoids re-locking).
pub(crate) fn get_task_internal(
    conn: &Connection,
    user_id: &str,
    task_id: &str,
) -> Result<Option<Task>> {
    let sql = format!("{} WHERE t.id = ?1 AND t.user_id = ?2", TASK_SELECT);
    let task = conn
        .query_row(&sql, params![task_id, user_id], parse_task_row)
        .optional()?;
    Ok(task)
}

fn insert_row(conn: &Connection, task: &Task) -> Result<()> {
    conn.execute(
        "INSERT INTO tasks (id, user_id, title, description, status, position, priority,
                            tags, subtasks, dependencies, due_date, started_at, completed_at,
                            last_moved_at, recurring, archived, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            task.id,
            task.user_id,
            task.title,
            task.description,
            task.status,
            task.position,
            task.priority.as_str(),
            serde_json::to_string(&task.tags)?,
            serde_json::to_string(&task.subtasks)?,
            serde_json::to_string(&task.dependencies)?,
            task.due_date.map(to_ms),
            task.started_at.map(to_ms),
            task.completed_at.map(to_ms),
            task.last_moved_at.map(to_ms),
            task.recurring.as_ref().map(serde_json::to_string).transpose()?,
            task.archived as i64,
            to_ms(task.created_at),
            to_ms(task.updated_at),
        ],
    )?;
    Ok(())
}

fn update_row(conn: &Connection, task: &Task) -> Result<()> {
    let updated = conn.execute(
        "UPDATE tasks SET title = ?3, description = ?4, status = ?5, position = ?6,
                priority = ?7, tags = ?8, subtasks = ?9, dependencies = ?10, due_date = ?11,
                started_at = ?12, completed_at = ?13, last_moved_at = ?14, recurring = ?15,
                archived = ?16, updated_at = ?17
         WHERE id = ?1 AND user_id = ?2",
        params![
            task.id,
            task.user_id,
            task.title,
            task.description,
            task.status,
            task.position,
            task.priority.as_str(),
            serde_json::to_string(&task.tags)?,
            serde_json::to_string(&task.subtasks)?,
            serde_json::to_string(&task.dependencies)?,
            task.due_date.map(to_ms),
            task.started_at.map(to_ms),
            task.completed_at.map(to_ms),
            task.last_moved_at.map(to_ms),
            task.recurring.as_ref().map(serde_json::to_string).transpose()?,
            task.archived as i64,
            to_ms(task.updated_at),
        ],
    )?;

    if updated == 0 {
        // Deleted underneath us; the whole batch rolls back.
        return Err(BoardError::task_not_found(&task.id).into());
    }
    Ok(())
}

/// Set `recurring.lastRun` in place, leaving the rest of the row as stored.
fn advance_recurrence(
    conn: &Connection,
    task_id: &str,
    user_id: &str,
    last_run: NaiveDate,
    updated_at: DateTime<Utc>,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE tasks SET recurring = json_set(recurring, '$.lastRun', ?3), updated_at = ?4
         WHERE id = ?1 AND user_id = ?2 AND recurring IS NOT NULL",
        params![
            task_id,
            user_id,
            last_run.format("%Y-%m-%d").to_string(),
            to_ms(updated_at)
        ],
    )?;

    if updated == 0 {
        return Err(BoardError::task_not_found(task_id).into());
    }
    Ok(())
}

impl TaskStore for Database {
    fn columns(&self, user_id: &str) -> Result<Vec<Column>> {
        self.with_conn(|conn| super::columns::list_columns_internal(conn, user_id))
    }

    fn find_task(&self, user_id: &str, task_id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| get_task_internal(conn, user_id, task_id))
    }

    fn list_tasks(&self, user_id: &str, include_archived: bool) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE t.user_id = ?1 AND (?2 OR t.archived = 0)
                 ORDER BY t.status, t.position, t.created_at, t.id",
                TASK_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map(params![user_id, include_archived], parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
    }

    fn column_positions(&self, user_id: &str, status: &str) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT position FROM tasks WHERE user_id = ?1 AND status = ?2")?;
            let positions = stmt
                .query_map(params![user_id, status], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<i64>>>()?;
            Ok(positions)
        })
    }

    fn recurring_templates(&self) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE t.archived = 0 AND t.recurring IS NOT NULL
                 ORDER BY t.user_id, t.created_at, t.id",
                TASK_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let tasks = stmt
                .query_map([], parse_task_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks.into_iter().filter(Task::is_template).collect())
        })
    }

    fn apply(&self, changes: Vec<TaskChange>) -> Result<()> {
        let limit = self.history_limit();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            for change in &changes {
                match change {
                    TaskChange::Insert { task, events } => {
                        insert_row(&tx, task)?;
                        append_events(&tx, &task.id, events, limit)?;
                    }
                    TaskChange::Update { task, events } => {
                        update_row(&tx, task)?;
                        append_events(&tx, &task.id, events, limit)?;
                    }
                    TaskChange::AdvanceRecurrence {
                        task_id,
                        user_id,
                        last_run,
                        updated_at,
                    } => advance_recurrence(&tx, task_id, user_id, *last_run, *updated_at)?,
                }
            }
            tx.commit()?;
            Ok(())
        })
    }

    fn delete_task(&self, user_id: &str, task_id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let deleted = tx.execute(
                "DELETE FROM tasks WHERE id = ?1 AND user_id = ?2",
                params![task_id, user_id],
            )?;
            if deleted > 0 {
                // Drop dangling blocker references on the user's other tasks.
                let needle = serde_json::to_string(task_id)?;
                let blocked: Vec<(String, String)> = {
                    let mut stmt = tx.prepare(
                        "SELECT id, dependencies FROM tasks
                         WHERE user_id = ?1 AND instr(dependencies, ?2) > 0",
                    )?;
                    stmt.query_map(params![user_id, needle], |row| {
                        Ok((row.get(0)?, row.get(1)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?
                };
                for (id, raw) in blocked {
                    let mut deps: Vec<String> = serde_json::from_str(&raw)?;
                    deps.retain(|d| d != task_id);
                    tx.execute(
                        "UPDATE tasks SET dependencies = ?2 WHERE id = ?1",
                        params![id, serde_json::to_string(&deps)?],
                    )?;
                }
            }
            tx.commit()?;
            Ok(deleted > 0)
        })
    }

    fn history(&self, user_id: &str, task_id: &str) -> Result<Vec<HistoryEvent>> {
        self.with_conn(|conn| {
            if get_task_internal(conn, user_id, task_id)?.is_none() {
                return Ok(Vec::new());
            }
            read_events(conn, task_id)
        })
    }
}

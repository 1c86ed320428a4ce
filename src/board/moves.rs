//! Move reconciliation.
//!
//! A move rewrites `(status, position)` and derives the lifecycle timestamps
//! from the roles of the source and target columns. Only a change of column
//! touches `startedAt`/`completedAt` or appends a `move` event; a same-column
//! reorder updates the position, `lastMovedAt` and `updatedAt` and nothing
//! else.

use super::position::allocate;
use crate::error::{BoardError, BoardResult};
use crate::store::{TaskChange, TaskStore};
use crate::types::{Column, ColumnRole, HistoryEvent, HistoryKind, Task};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Raw body of `PATCH /api/tasks/{id}/position`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoveRequest {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub position: Option<Value>,
}

/// A validated move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveCommand {
    pub task_id: String,
    pub user_id: String,
    pub target_status: String,
    pub target_position: i64,
}

impl MoveRequest {
    pub fn into_command(self, task_id: &str, user_id: &str) -> BoardResult<MoveCommand> {
        let target_status = match self.status {
            Some(s) if !s.trim().is_empty() => s,
            _ => return Err(BoardError::missing_field("status")),
        };
        let raw = match self.position {
            Some(Value::Null) | None => return Err(BoardError::missing_field("position")),
            Some(v) => v,
        };

        Ok(MoveCommand {
            task_id: task_id.to_string(),
            user_id: user_id.to_string(),
            target_status,
            target_position: parse_position(&raw)?,
        })
    }
}

/// Accept non-negative integers, integral floats and integer strings.
fn parse_position(raw: &Value) -> BoardResult<i64> {
    let parsed = match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match parsed {
        Some(p) if p >= 0 => Ok(p),
        Some(_) => Err(BoardError::invalid_value(
            "position",
            "position must not be negative",
        )),
        None => Err(BoardError::invalid_value(
            "position",
            "position must be an integer",
        )),
    }
}

/// Result of reconciling one task against a move.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub task: Task,
    /// Present only when the task changed column.
    pub event: Option<HistoryEvent>,
}

impl MoveOutcome {
    fn into_change(self) -> TaskChange {
        TaskChange::Update {
            task: self.task,
            events: self.event.into_iter().collect(),
        }
    }
}

/// Apply a move to an in-memory task. Pure; persistence is the caller's job.
pub fn reconcile(
    mut task: Task,
    target_status: &str,
    target_position: i64,
    columns: &[Column],
    now: DateTime<Utc>,
) -> BoardResult<MoveOutcome> {
    let target = columns
        .iter()
        .find(|c| c.id == target_status)
        .ok_or_else(|| BoardError::column_not_found(target_status))?;

    let mut event = None;
    if task.status != target.id {
        let source_title = columns
            .iter()
            .find(|c| c.id == task.status)
            .map_or_else(|| task.status.clone(), |c| c.title.clone());

        if task.started_at.is_none() && target.role != ColumnRole::Backlog {
            task.started_at = Some(now);
        }
        task.completed_at = match target.role {
            ColumnRole::Done => Some(now),
            _ => None,
        };

        event = Some(HistoryEvent::new(
            HistoryKind::Move {
                from: source_title,
                to: target.title.clone(),
            },
            now,
        ));
    }

    task.status = target.id.clone();
    task.position = target_position;
    task.last_moved_at = Some(now);
    task.updated_at = now;

    Ok(MoveOutcome { task, event })
}

fn load_task<S: TaskStore + ?Sized>(store: &S, user_id: &str, task_id: &str) -> BoardResult<Task> {
    store
        .find_task(user_id, task_id)?
        .ok_or_else(|| BoardError::task_not_found(task_id))
}

/// Move a task to an explicit `(status, position)`.
pub fn move_task<S: TaskStore + ?Sized>(
    store: &S,
    cmd: &MoveCommand,
    now: DateTime<Utc>,
) -> BoardResult<Task> {
    let task = load_task(store, &cmd.user_id, &cmd.task_id)?;
    let columns = store.columns(&cmd.user_id)?;

    let outcome = reconcile(task, &cmd.target_status, cmd.target_position, &columns, now)?;
    let task = outcome.task.clone();
    store.apply(vec![outcome.into_change()])?;

    debug!(
        task_id = %cmd.task_id,
        status = %cmd.target_status,
        position = cmd.target_position,
        "task moved"
    );
    Ok(task)
}

/// Drop a task at the end of a column.
pub fn move_to_column<S: TaskStore + ?Sized>(
    store: &S,
    user_id: &str,
    task_id: &str,
    target_status: &str,
    now: DateTime<Utc>,
) -> BoardResult<Task> {
    let task = load_task(store, user_id, task_id)?;
    let columns = store.columns(user_id)?;
    if !columns.iter().any(|c| c.id == target_status) {
        return Err(BoardError::column_not_found(target_status));
    }

    let position = allocate(store.column_positions(user_id, target_status)?);
    let cmd = MoveCommand {
        task_id: task.id.clone(),
        user_id: user_id.to_string(),
        target_status: target_status.to_string(),
        target_position: position,
    };

    let outcome = reconcile(task, &cmd.target_status, cmd.target_position, &columns, now)?;
    let task = outcome.task.clone();
    store.apply(vec![outcome.into_change()])?;
    Ok(task)
}

/// Rewrite a column to exactly the given order, positions `0..n`.
///
/// Tasks coming from other columns are reconciled as column moves. Either
/// every task is written or none is.
pub fn reorder_column<S: TaskStore + ?Sized>(
    store: &S,
    user_id: &str,
    column_id: &str,
    task_ids: &[String],
    now: DateTime<Utc>,
) -> BoardResult<Vec<Task>> {
    let columns = store.columns(user_id)?;
    if !columns.iter().any(|c| c.id == column_id) {
        return Err(BoardError::column_not_found(column_id));
    }

    let mut seen = HashSet::new();
    if let Some(dup) = task_ids.iter().find(|id| !seen.insert(id.as_str())) {
        return Err(BoardError::invalid_value(
            "taskIds",
            &format!("task {} listed more than once", dup),
        ));
    }

    let mut changes = Vec::with_capacity(task_ids.len());
    let mut tasks = Vec::with_capacity(task_ids.len());
    for (idx, task_id) in task_ids.iter().enumerate() {
        let task = load_task(store, user_id, task_id)?;
        let outcome = reconcile(task, column_id, idx as i64, &columns, now)?;
        tasks.push(outcome.task.clone());
        changes.push(outcome.into_change());
    }

    store.apply(changes)?;
    debug!(column_id, count = tasks.len(), "column reordered");
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;
    use serde_json::json;

    fn column(id: &str, title: &str, role: ColumnRole, position: i64) -> Column {
        Column {
            id: id.into(),
            title: title.into(),
            role,
            position,
            wip_limit: 0,
        }
    }

    fn board() -> Vec<Column> {
        vec![
            column("todo", "To Do", ColumnRole::Backlog, 0),
            column("doing", "In Progress", ColumnRole::Active, 1),
            column("review", "Review", ColumnRole::Active, 2),
            column("done", "Done", ColumnRole::Done, 3),
        ]
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_750_000_000 + secs, 0).unwrap()
    }

    fn task_in(status: &str) -> Task {
        Task {
            id: "t1".into(),
            user_id: "u1".into(),
            title: "Write report".into(),
            description: String::new(),
            status: status.into(),
            position: 0,
            priority: Priority::Medium,
            tags: vec![],
            subtasks: vec![],
            dependencies: vec![],
            due_date: None,
            started_at: None,
            completed_at: None,
            last_moved_at: None,
            recurring: None,
            archived: false,
            comment_count: 0,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    #[test]
    fn request_requires_status_and_position() {
        let err = MoveRequest {
            status: None,
            position: Some(json!(1)),
        }
        .into_command("t1", "u1")
        .unwrap_err();
        assert_eq!(err.field.as_deref(), Some("status"));

        let err = MoveRequest {
            status: Some("done".into()),
            position: None,
        }
        .into_command("t1", "u1")
        .unwrap_err();
        assert_eq!(err.field.as_deref(), Some("position"));
    }

    #[test]
    fn request_rejects_non_numeric_and_negative_positions() {
        for bad in [json!("abc"), json!(-1), json!(1.5), json!(true), json!([1])] {
            let err = MoveRequest {
                status: Some("done".into()),
                position: Some(bad.clone()),
            }
            .into_command("t1", "u1")
            .unwrap_err();
            assert_eq!(err.code, crate::error::ErrorCode::InvalidFieldValue, "{bad}");
        }
    }

    #[test]
    fn request_accepts_integral_numbers() {
        for (raw, expected) in [(json!(3), 3), (json!(2.0), 2), (json!("7"), 7)] {
            let cmd = MoveRequest {
                status: Some("done".into()),
                position: Some(raw),
            }
            .into_command("t1", "u1")
            .unwrap();
            assert_eq!(cmd.target_position, expected);
        }
    }

    #[test]
    fn leaving_backlog_starts_the_clock() {
        let out = reconcile(task_in("todo"), "doing", 4, &board(), at(10)).unwrap();
        assert_eq!(out.task.status, "doing");
        assert_eq!(out.task.position, 4);
        assert_eq!(out.task.started_at, Some(at(10)));
        assert_eq!(out.task.completed_at, None);
        assert_eq!(out.task.last_moved_at, Some(at(10)));
        assert_eq!(
            out.event.map(|e| e.kind),
            Some(HistoryKind::Move {
                from: "To Do".into(),
                to: "In Progress".into()
            })
        );
    }

    #[test]
    fn done_role_toggles_completion() {
        let done = reconcile(task_in("doing"), "done", 0, &board(), at(5)).unwrap().task;
        assert_eq!(done.completed_at, Some(at(5)));

        let back = reconcile(done, "review", 0, &board(), at(9)).unwrap().task;
        assert_eq!(back.completed_at, None);
        assert_eq!(back.started_at, Some(at(5)));
    }

    #[test]
    fn started_at_survives_return_to_backlog() {
        let started = reconcile(task_in("todo"), "doing", 0, &board(), at(1)).unwrap().task;
        let back = reconcile(started, "todo", 0, &board(), at(2)).unwrap().task;
        assert_eq!(back.started_at, Some(at(1)));
        let again = reconcile(back, "review", 0, &board(), at(3)).unwrap().task;
        assert_eq!(again.started_at, Some(at(1)));
    }

    #[test]
    fn same_column_reorder_is_not_a_column_move() {
        let mut task = task_in("done");
        task.completed_at = Some(at(1));
        task.started_at = Some(at(0));

        let out = reconcile(task, "done", 9, &board(), at(7)).unwrap();
        assert!(out.event.is_none());
        assert_eq!(out.task.position, 9);
        assert_eq!(out.task.completed_at, Some(at(1)));
        assert_eq!(out.task.started_at, Some(at(0)));
        assert_eq!(out.task.last_moved_at, Some(at(7)));
        assert_eq!(out.task.updated_at, at(7));
    }

    #[test]
    fn unknown_target_column_is_not_found() {
        let err = reconcile(task_in("todo"), "nowhere", 0, &board(), at(1)).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ColumnNotFound);
    }
}

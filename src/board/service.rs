//! Board operations for one process.
//!
//! [`BoardService`] owns the store handle, the clock and the board settings,
//! and is what the HTTP layer and the CLI call into. Every operation is
//! scoped to a user id; tasks owned by someone else are reported as absent.

use super::deps::would_create_cycle;
use super::moves::{self, MoveRequest};
use super::position::allocate;
use super::recurrence::{self, SweepReport};
use crate::clock::SharedClock;
use crate::config::BoardConfig;
use crate::db::Database;
use crate::error::{BoardError, BoardResult};
use crate::store::TaskStore;
use crate::types::{
    BoardStats, BoardView, Column, ColumnInput, ColumnRole, ColumnView, Comment, HistoryEvent,
    HistoryKind, NewTask, Subtask, SubtaskPatch, Tag, Task, TaskPatch,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct BoardService {
    db: Database,
    clock: SharedClock,
    config: Arc<BoardConfig>,
}

fn required_text(field: &str, value: Option<&str>) -> BoardResult<String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(BoardError::missing_field(field)),
    }
}

impl BoardService {
    pub fn new(db: Database, clock: SharedClock, config: BoardConfig) -> Self {
        Self {
            db,
            clock,
            config: Arc::new(config),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.utc()
    }

    fn check_tags(&self, tags: &[Tag]) -> BoardResult<()> {
        if tags.len() > self.config.max_tags {
            return Err(BoardError::limit_exceeded("tags", self.config.max_tags));
        }
        if tags.iter().any(|t| t.label.trim().is_empty()) {
            return Err(BoardError::invalid_value("tags", "tag labels must not be empty"));
        }
        Ok(())
    }

    fn load_task(&self, user_id: &str, task_id: &str) -> BoardResult<Task> {
        self.db
            .find_task(user_id, task_id)?
            .ok_or_else(|| BoardError::task_not_found(task_id))
    }

    // Columns

    /// The user's columns, seeding the defaults on first access.
    pub fn columns(&self, user_id: &str) -> BoardResult<Vec<Column>> {
        let columns = self
            .db
            .ensure_board(user_id, &self.config.column_templates(), self.now())?;
        Ok(columns)
    }

    /// Columns in order, each with its ordered non-archived tasks.
    pub fn board(&self, user_id: &str) -> BoardResult<BoardView> {
        let columns = self.columns(user_id)?;
        let mut by_status: HashMap<String, Vec<Task>> = HashMap::new();
        for task in self.db.list_tasks(user_id, false)? {
            by_status.entry(task.status.clone()).or_default().push(task);
        }

        let columns = columns
            .into_iter()
            .map(|column| {
                let tasks = by_status.remove(&column.id).unwrap_or_default();
                let over_wip_limit = column.is_over_limit(tasks.len());
                ColumnView {
                    column,
                    tasks,
                    over_wip_limit,
                }
            })
            .collect();

        Ok(BoardView { columns })
    }

    pub fn create_column(&self, user_id: &str, input: ColumnInput) -> BoardResult<Column> {
        let title = required_text("title", input.title.as_deref())?;
        self.columns(user_id)?;
        let column = self.db.create_column(
            user_id,
            &title,
            input.role,
            input.wip_limit.unwrap_or(0),
            self.now(),
        )?;
        info!(user_id, column_id = %column.id, "column created");
        Ok(column)
    }

    pub fn update_column(
        &self,
        user_id: &str,
        column_id: &str,
        input: ColumnInput,
    ) -> BoardResult<Column> {
        if input.title.is_some() {
            required_text("title", input.title.as_deref())?;
        }
        let input = ColumnInput {
            title: input.title.map(|t| t.trim().to_string()),
            ..input
        };
        self.columns(user_id)?;
        self.db
            .update_column(user_id, column_id, &input)?
            .ok_or_else(|| BoardError::column_not_found(column_id))
    }

    pub fn delete_column(&self, user_id: &str, column_id: &str) -> BoardResult<()> {
        self.columns(user_id)?;
        self.db.delete_column(user_id, column_id)?;
        info!(user_id, column_id, "column deleted");
        Ok(())
    }

    // Tasks

    /// Tasks ordered by `(status, position, createdAt, id)`.
    pub fn list_tasks(&self, user_id: &str, include_archived: bool) -> BoardResult<Vec<Task>> {
        Ok(self.db.list_tasks(user_id, include_archived)?)
    }

    pub fn get_task(&self, user_id: &str, task_id: &str) -> BoardResult<Task> {
        self.load_task(user_id, task_id)
    }

    /// Create a task at the end of its column (the first column by default).
    pub fn create_task(&self, user_id: &str, input: NewTask) -> BoardResult<Task> {
        let title = required_text("title", input.title.as_deref())?;
        self.check_tags(&input.tags)?;
        if input.subtasks.len() > self.config.max_subtasks {
            return Err(BoardError::limit_exceeded("subtasks", self.config.max_subtasks));
        }

        let columns = self.columns(user_id)?;
        let column = match input.status.as_deref() {
            Some(status) => columns
                .iter()
                .find(|c| c.id == status)
                .ok_or_else(|| BoardError::column_not_found(status))?,
            None => columns
                .first()
                .ok_or_else(|| BoardError::column_not_found("(first column)"))?,
        };

        let now = self.now();
        let subtasks = input
            .subtasks
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(|t| Subtask {
                id: Uuid::now_v7().to_string(),
                title: t.to_string(),
                completed: false,
                created_at: now,
            })
            .collect();

        let task = Task {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            title,
            description: input.description.unwrap_or_default(),
            status: column.id.clone(),
            position: allocate(self.db.column_positions(user_id, &column.id)?),
            priority: input.priority.unwrap_or_default(),
            tags: input.tags,
            subtasks,
            dependencies: Vec::new(),
            due_date: input.due_date,
            // Created straight into a later column counts as already started.
            started_at: (column.role != ColumnRole::Backlog).then_some(now),
            completed_at: (column.role == ColumnRole::Done).then_some(now),
            last_moved_at: None,
            recurring: input.recurring,
            archived: false,
            comment_count: 0,
            created_at: now,
            updated_at: now,
        };

        let created = HistoryEvent::new(
            HistoryKind::Create {
                column_title: column.title.clone(),
                recurring_from: None,
            },
            now,
        );
        self.db.insert_task(task.clone(), vec![created])?;

        info!(user_id, task_id = %task.id, status = %task.status, position = task.position, "task created");
        Ok(task)
    }

    /// Edit descriptive fields. Column and position changes go through moves.
    pub fn update_task(&self, user_id: &str, task_id: &str, patch: TaskPatch) -> BoardResult<Task> {
        let mut task = self.load_task(user_id, task_id)?;

        if patch.title.is_some() {
            task.title = required_text("title", patch.title.as_deref())?;
        }
        if let Some(description) = patch.description {
            task.description = description;
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(tags) = patch.tags {
            self.check_tags(&tags)?;
            task.tags = tags;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        if let Some(recurring) = patch.recurring {
            task.recurring = recurring;
        }
        task.updated_at = self.now();

        self.db.update_task(task.clone(), Vec::new())?;
        Ok(task)
    }

    /// Delete a task together with its history and comments.
    pub fn delete_task(&self, user_id: &str, task_id: &str) -> BoardResult<()> {
        if !self.db.delete_task(user_id, task_id)? {
            return Err(BoardError::task_not_found(task_id));
        }
        info!(user_id, task_id, "task deleted");
        Ok(())
    }

    /// Move to an explicit `(status, position)`.
    pub fn move_task(&self, user_id: &str, task_id: &str, request: MoveRequest) -> BoardResult<Task> {
        let cmd = request.into_command(task_id, user_id)?;
        self.columns(user_id)?;
        moves::move_task(&self.db, &cmd, self.now())
    }

    /// Drop a task at the end of another column.
    pub fn move_to_column(
        &self,
        user_id: &str,
        task_id: &str,
        target_column_id: Option<&str>,
    ) -> BoardResult<Task> {
        let target = required_text("targetColumnId", target_column_id)?;
        self.columns(user_id)?;
        moves::move_to_column(&self.db, user_id, task_id, &target, self.now())
    }

    /// Rewrite one column's order.
    pub fn reorder_column(
        &self,
        user_id: &str,
        column_id: &str,
        task_ids: &[String],
    ) -> BoardResult<Vec<Task>> {
        self.columns(user_id)?;
        moves::reorder_column(&self.db, user_id, column_id, task_ids, self.now())
    }

    /// Archive or restore. Setting the current value again records nothing.
    pub fn set_archived(&self, user_id: &str, task_id: &str, archived: bool) -> BoardResult<Task> {
        let mut task = self.load_task(user_id, task_id)?;
        if task.archived == archived {
            return Ok(task);
        }

        let now = self.now();
        task.archived = archived;
        task.updated_at = now;
        let kind = if archived {
            HistoryKind::Archive
        } else {
            HistoryKind::Restore
        };

        self.db
            .update_task(task.clone(), vec![HistoryEvent::new(kind, now)])?;
        info!(user_id, task_id, archived, "task archive state changed");
        Ok(task)
    }

    /// History of a task, oldest first unless `newest_first`.
    pub fn history(
        &self,
        user_id: &str,
        task_id: &str,
        newest_first: bool,
    ) -> BoardResult<Vec<HistoryEvent>> {
        self.load_task(user_id, task_id)?;
        let mut events = self.db.history(user_id, task_id)?;
        if newest_first {
            events.reverse();
        }
        Ok(events)
    }

    // Subtasks

    pub fn add_subtask(&self, user_id: &str, task_id: &str, title: Option<&str>) -> BoardResult<Task> {
        let title = required_text("title", title)?;
        let mut task = self.load_task(user_id, task_id)?;
        if task.subtasks.len() >= self.config.max_subtasks {
            return Err(BoardError::limit_exceeded("subtasks", self.config.max_subtasks));
        }

        let now = self.now();
        task.subtasks.push(Subtask {
            id: Uuid::now_v7().to_string(),
            title,
            completed: false,
            created_at: now,
        });
        task.updated_at = now;

        self.db.update_task(task.clone(), Vec::new())?;
        Ok(task)
    }

    /// Rename and/or toggle a subtask, recording each change.
    pub fn update_subtask(
        &self,
        user_id: &str,
        task_id: &str,
        subtask_id: &str,
        patch: SubtaskPatch,
    ) -> BoardResult<Task> {
        let new_title = match patch.title.as_deref() {
            Some(_) => Some(required_text("title", patch.title.as_deref())?),
            None => None,
        };

        let mut task = self.load_task(user_id, task_id)?;
        let now = self.now();
        let subtask = task
            .subtask_mut(subtask_id)
            .ok_or_else(|| BoardError::subtask_not_found(subtask_id))?;

        let mut events = Vec::new();
        if let Some(title) = new_title
            && title != subtask.title
        {
            events.push(HistoryEvent::new(
                HistoryKind::SubtaskRename {
                    from: std::mem::replace(&mut subtask.title, title.clone()),
                    to: title,
                },
                now,
            ));
        }
        if let Some(completed) = patch.completed
            && completed != subtask.completed
        {
            subtask.completed = completed;
            let subtask_title = subtask.title.clone();
            let kind = if completed {
                HistoryKind::SubtaskDone { subtask_title }
            } else {
                HistoryKind::SubtaskUndone { subtask_title }
            };
            events.push(HistoryEvent::new(kind, now));
        }

        task.updated_at = now;
        self.db.update_task(task.clone(), events)?;
        Ok(task)
    }

    pub fn delete_subtask(&self, user_id: &str, task_id: &str, subtask_id: &str) -> BoardResult<Task> {
        let mut task = self.load_task(user_id, task_id)?;
        let before = task.subtasks.len();
        task.subtasks.retain(|s| s.id != subtask_id);
        if task.subtasks.len() == before {
            return Err(BoardError::subtask_not_found(subtask_id));
        }

        task.updated_at = self.now();
        self.db.update_task(task.clone(), Vec::new())?;
        Ok(task)
    }

    // Comments

    pub fn comments(&self, user_id: &str, task_id: &str) -> BoardResult<Vec<Comment>> {
        self.load_task(user_id, task_id)?;
        Ok(self.db.list_comments(user_id, task_id)?)
    }

    pub fn add_comment(
        &self,
        user_id: &str,
        task_id: &str,
        content: Option<&str>,
    ) -> BoardResult<Comment> {
        let content = required_text("content", content)?;
        self.load_task(user_id, task_id)?;
        Ok(self.db.add_comment(user_id, task_id, &content, self.now())?)
    }

    pub fn update_comment(
        &self,
        user_id: &str,
        comment_id: &str,
        content: Option<&str>,
    ) -> BoardResult<Comment> {
        let content = required_text("content", content)?;
        self.db
            .update_comment(user_id, comment_id, &content, self.now())?
            .ok_or_else(|| BoardError::comment_not_found(comment_id))
    }

    pub fn delete_comment(&self, user_id: &str, comment_id: &str) -> BoardResult<()> {
        if !self.db.delete_comment(user_id, comment_id)? {
            return Err(BoardError::comment_not_found(comment_id));
        }
        Ok(())
    }

    // Dependencies

    /// Make `task_id` wait on `blocker_id`. Rejects cycles.
    pub fn add_dependency(
        &self,
        user_id: &str,
        task_id: &str,
        blocker_id: Option<&str>,
    ) -> BoardResult<Task> {
        let blocker_id = required_text("blockerId", blocker_id)?;
        let mut task = self.load_task(user_id, task_id)?;
        self.load_task(user_id, &blocker_id)?;

        if task.dependencies.contains(&blocker_id) {
            return Ok(task);
        }

        let all = self.db.list_tasks(user_id, true)?;
        if would_create_cycle(&all, task_id, &blocker_id) {
            return Err(BoardError::dependency_cycle(task_id, &blocker_id));
        }

        task.dependencies.push(blocker_id);
        task.updated_at = self.now();
        self.db.update_task(task.clone(), Vec::new())?;
        Ok(task)
    }

    pub fn remove_dependency(
        &self,
        user_id: &str,
        task_id: &str,
        blocker_id: &str,
    ) -> BoardResult<Task> {
        let mut task = self.load_task(user_id, task_id)?;
        let before = task.dependencies.len();
        task.dependencies.retain(|d| d != blocker_id);
        if task.dependencies.len() == before {
            return Err(BoardError::task_not_found(blocker_id));
        }

        task.updated_at = self.now();
        self.db.update_task(task.clone(), Vec::new())?;
        Ok(task)
    }

    // Reporting and scheduled work

    pub fn stats(&self, user_id: &str) -> BoardResult<BoardStats> {
        let columns = self.columns(user_id)?;
        Ok(self.db.board_stats(user_id, &columns, self.now())?)
    }

    /// One recurrence sweep across all users.
    pub fn run_recurrence(&self) -> BoardResult<SweepReport> {
        recurrence::run_sweep(&self.db, self.now())
    }
}

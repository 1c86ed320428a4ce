//! Persistence port consumed by the board core.
//!
//! The move reconciler and the recurrence trigger only see this trait; the
//! SQLite implementation lives in [`crate::db`].

use crate::types::{Column, HistoryEvent, Task};
use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};

/// One row-level write, committed together with its history events.
#[derive(Debug, Clone)]
pub enum TaskChange {
    Insert { task: Task, events: Vec<HistoryEvent> },
    Update { task: Task, events: Vec<HistoryEvent> },
    /// Stamp a template's `lastRun` without touching any other column.
    AdvanceRecurrence {
        task_id: String,
        user_id: String,
        last_run: NaiveDate,
        updated_at: DateTime<Utc>,
    },
}

impl TaskChange {
    pub fn task_id(&self) -> &str {
        match self {
            TaskChange::Insert { task, .. } | TaskChange::Update { task, .. } => &task.id,
            TaskChange::AdvanceRecurrence { task_id, .. } => task_id,
        }
    }
}

/// Task persistence contract. All reads are scoped to one user.
pub trait TaskStore {
    /// Columns of the user's board, ordered by column position.
    fn columns(&self, user_id: &str) -> Result<Vec<Column>>;

    /// Load a task owned by `user_id`; foreign tasks are reported as absent.
    fn find_task(&self, user_id: &str, task_id: &str) -> Result<Option<Task>>;

    /// The user's tasks ordered by `(status, position, created_at, id)`.
    fn list_tasks(&self, user_id: &str, include_archived: bool) -> Result<Vec<Task>>;

    /// Positions currently used in one column, archived tasks included.
    fn column_positions(&self, user_id: &str, status: &str) -> Result<Vec<i64>>;

    /// Non-archived tasks of every user that carry an active recurrence rule.
    fn recurring_templates(&self) -> Result<Vec<Task>>;

    /// Commit every change or none of them.
    fn apply(&self, changes: Vec<TaskChange>) -> Result<()>;

    /// Remove a task with its history and comments. Returns whether it existed.
    fn delete_task(&self, user_id: &str, task_id: &str) -> Result<bool>;

    /// History in insertion order.
    fn history(&self, user_id: &str, task_id: &str) -> Result<Vec<HistoryEvent>>;

    fn insert_task(&self, task: Task, events: Vec<HistoryEvent>) -> Result<()> {
        self.apply(vec![TaskChange::Insert { task, events }])
    }

    fn update_task(&self, task: Task, events: Vec<HistoryEvent>) -> Result<()> {
        self.apply(vec![TaskChange::Update { task, events }])
    }
}

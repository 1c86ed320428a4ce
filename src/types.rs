//! Core types for the kanban board.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Task priority, ordered from least to most pressing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

/// Tag palette offered by the board UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagColor {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
    Pink,
    Gray,
}

/// A colored label attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub color: TagColor,
    pub label: String,
}

/// A checklist item owned by a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

/// How often a template task spawns a fresh instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    None,
    Daily,
    Weekly,
}

impl Frequency {
    /// Minimum whole days between two spawns, `None` when inactive.
    pub fn interval_days(&self) -> Option<i64> {
        match self {
            Frequency::None => None,
            Frequency::Daily => Some(1),
            Frequency::Weekly => Some(7),
        }
    }
}

/// Recurrence rule carried by template tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recurring {
    pub frequency: Frequency,
    #[serde(default)]
    pub last_run: Option<NaiveDate>,
}

impl Recurring {
    pub fn is_active(&self) -> bool {
        self.frequency.interval_days().is_some()
    }
}

/// A task on a user's board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    /// Column id the task currently sits in.
    pub status: String,
    /// Sort key within `(user_id, status)`; duplicates are tolerated.
    pub position: i64,
    pub priority: Priority,
    pub tags: Vec<Tag>,
    pub subtasks: Vec<Subtask>,
    /// Ids of tasks that block this one.
    pub dependencies: Vec<String>,
    pub due_date: Option<DateTime<Utc>>,
    /// Set once when the task first leaves the backlog; never cleared.
    pub started_at: Option<DateTime<Utc>>,
    /// Set while the task sits in a done column.
    pub completed_at: Option<DateTime<Utc>>,
    pub last_moved_at: Option<DateTime<Utc>>,
    pub recurring: Option<Recurring>,
    pub archived: bool,
    #[serde(default)]
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Whether this task acts as a recurrence template.
    pub fn is_template(&self) -> bool {
        self.recurring.is_some_and(|r| r.is_active())
    }

    pub fn subtask_mut(&mut self, subtask_id: &str) -> Option<&mut Subtask> {
        self.subtasks.iter_mut().find(|s| s.id == subtask_id)
    }
}

/// Semantic role of a column, consulted instead of its title.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    /// Initial column; leaving it starts the task clock.
    Backlog,
    #[default]
    Active,
    /// Terminal column; entering it completes the task.
    Done,
}

impl ColumnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnRole::Backlog => "backlog",
            ColumnRole::Active => "active",
            ColumnRole::Done => "done",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "backlog" => Some(ColumnRole::Backlog),
            "active" => Some(ColumnRole::Active),
            "done" => Some(ColumnRole::Done),
            _ => None,
        }
    }

    /// Role for a column created without an explicit one.
    pub fn infer(title: &str, is_first_column: bool) -> Self {
        if title.to_lowercase().contains("done") {
            ColumnRole::Done
        } else if is_first_column {
            ColumnRole::Backlog
        } else {
            ColumnRole::Active
        }
    }
}

/// A status column on a user's board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub title: String,
    pub role: ColumnRole,
    /// Order among columns; independent of task positions.
    pub position: i64,
    /// Advisory WIP limit, 0 = unlimited.
    pub wip_limit: u32,
}

impl Column {
    pub fn is_over_limit(&self, task_count: usize) -> bool {
        self.wip_limit > 0 && task_count > self.wip_limit as usize
    }
}

/// A column together with its ordered, non-archived tasks.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnView {
    #[serde(flatten)]
    pub column: Column,
    pub tasks: Vec<Task>,
    pub over_wip_limit: bool,
}

/// A user's full board.
#[derive(Debug, Clone, Serialize)]
pub struct BoardView {
    pub columns: Vec<ColumnView>,
}

/// Domain-level change recorded in a task's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryKind {
    Create {
        #[serde(rename = "columnTitle")]
        column_title: String,
        /// Template id when the task was spawned by recurrence.
        #[serde(rename = "recurringFrom", default, skip_serializing_if = "Option::is_none")]
        recurring_from: Option<String>,
    },
    Move {
        from: String,
        to: String,
    },
    Archive,
    Restore,
    SubtaskDone {
        #[serde(rename = "subtaskTitle")]
        subtask_title: String,
    },
    SubtaskUndone {
        #[serde(rename = "subtaskTitle")]
        subtask_title: String,
    },
    SubtaskRename {
        from: String,
        to: String,
    },
}

/// Immutable audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: HistoryKind,
}

impl HistoryEvent {
    pub fn new(kind: HistoryKind, timestamp: DateTime<Utc>) -> Self {
        Self { timestamp, kind }
    }
}

/// A comment left on a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub task_id: String,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Target column; defaults to the first column of the board.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Subtask titles.
    #[serde(default)]
    pub subtasks: Vec<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recurring: Option<Recurring>,
}

/// Partial task update. Column and position changes go through moves.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags: Option<Vec<Tag>>,
    #[serde(default, deserialize_with = "double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub recurring: Option<Option<Recurring>>,
}

/// Partial subtask update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubtaskPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
}

/// Input for creating or updating a column.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub role: Option<ColumnRole>,
    #[serde(default)]
    pub wip_limit: Option<u32>,
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Aggregate board statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardStats {
    pub total_tasks: i64,
    pub archived_tasks: i64,
    pub tasks_by_column: Vec<ColumnCount>,
    pub overdue_tasks: i64,
    pub completed_last_7_days: i64,
    /// Mean of `completedAt - startedAt` over completed tasks.
    pub avg_cycle_time_ms: Option<i64>,
}

/// Open task count for one column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnCount {
    pub column_id: String,
    pub title: String,
    pub count: i64,
    pub over_wip_limit: bool,
}

//! Structured error types for board operations.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (4xx-like)
    MissingRequiredField,
    InvalidFieldValue,
    LimitExceeded,
    DependencyCycle,
    ColumnNotEmpty,

    // Not found errors
    TaskNotFound,
    ColumnNotFound,
    SubtaskNotFound,
    CommentNotFound,

    // Caller identity missing
    Unauthenticated,

    // Storage failures
    DatabaseError,
}

/// Coarse error taxonomy used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Absent, or owned by another user. Never retried.
    NotFound,
    /// Malformed command. Never retried, never partially applied.
    Validation,
    /// No caller identity supplied by the auth layer.
    Unauthenticated,
    /// Storage failure, surfaced verbatim.
    Persistence,
}

impl ErrorCode {
    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFieldValue
            | ErrorCode::LimitExceeded
            | ErrorCode::DependencyCycle
            | ErrorCode::ColumnNotEmpty => ErrorCategory::Validation,
            ErrorCode::TaskNotFound
            | ErrorCode::ColumnNotFound
            | ErrorCode::SubtaskNotFound
            | ErrorCode::CommentNotFound => ErrorCategory::NotFound,
            ErrorCode::Unauthenticated => ErrorCategory::Unauthenticated,
            ErrorCode::DatabaseError => ErrorCategory::Persistence,
        }
    }
}

/// Structured error for board operations.
#[derive(Debug, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct BoardError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl BoardError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn limit_exceeded(field: &str, limit: usize) -> Self {
        Self::new(
            ErrorCode::LimitExceeded,
            format!("{} may hold at most {} entries", field, limit),
        )
        .with_field(field)
    }

    pub fn dependency_cycle(task_id: &str, blocker_id: &str) -> Self {
        Self::new(
            ErrorCode::DependencyCycle,
            format!(
                "Blocking {} on {} would create a cycle",
                task_id, blocker_id
            ),
        )
        .with_field("blockerId")
    }

    pub fn column_not_empty(column_id: &str, count: i64) -> Self {
        Self::new(
            ErrorCode::ColumnNotEmpty,
            format!("Column {} still holds {} task(s)", column_id, count),
        )
    }

    pub fn task_not_found(task_id: &str) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn column_not_found(column_id: &str) -> Self {
        Self::new(
            ErrorCode::ColumnNotFound,
            format!("Column not found: {}", column_id),
        )
    }

    pub fn subtask_not_found(subtask_id: &str) -> Self {
        Self::new(
            ErrorCode::SubtaskNotFound,
            format!("Subtask not found: {}", subtask_id),
        )
    }

    pub fn comment_not_found(comment_id: &str) -> Self {
        Self::new(
            ErrorCode::CommentNotFound,
            format!("Comment not found: {}", comment_id),
        )
    }

    pub fn unauthenticated() -> Self {
        Self::new(ErrorCode::Unauthenticated, "Missing user identity")
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }
}

// Domain errors raised inside a transaction travel through anyhow; recover them here.
impl From<anyhow::Error> for BoardError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<BoardError>() {
            Ok(board_err) => board_err,
            Err(err) => BoardError::database(err),
        }
    }
}

/// Result type for board operations.
pub type BoardResult<T> = std::result::Result<T, BoardError>;

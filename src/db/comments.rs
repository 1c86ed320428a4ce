//! Task comments.

use super::{Database, from_ms, to_ms};
use crate::types::Comment;
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, Row, params};
use uuid::Uuid;

fn parse_comment_row(row: &Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get("id")?,
        task_id: row.get("task_id")?,
        user_id: row.get("user_id")?,
        content: row.get("content")?,
        created_at: from_ms(row.get("created_at")?)?,
        updated_at: from_ms(row.get("updated_at")?)?,
    })
}

impl Database {
    /// Comments on a task, newest first.
    pub fn list_comments(&self, user_id: &str, task_id: &str) -> Result<Vec<Comment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM comments WHERE task_id = ?1 AND user_id = ?2
                 ORDER BY created_at DESC, id DESC",
            )?;
            let comments = stmt
                .query_map(params![task_id, user_id], parse_comment_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(comments)
        })
    }

    /// Add a comment. The caller has already checked task ownership.
    pub fn add_comment(
        &self,
        user_id: &str,
        task_id: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Comment> {
        let comment = Comment {
            id: Uuid::now_v7().to_string(),
            task_id: task_id.to_string(),
            user_id: user_id.to_string(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, task_id, user_id, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    comment.id,
                    comment.task_id,
                    comment.user_id,
                    comment.content,
                    to_ms(comment.created_at),
                    to_ms(comment.updated_at),
                ],
            )?;
            Ok(())
        })?;

        Ok(comment)
    }

    /// Replace a comment's text. Returns `None` when absent or foreign.
    pub fn update_comment(
        &self,
        user_id: &str,
        comment_id: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Comment>> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE comments SET content = ?3, updated_at = ?4
                 WHERE id = ?1 AND user_id = ?2",
                params![comment_id, user_id, content, to_ms(now)],
            )?;
            if updated == 0 {
                return Ok(None);
            }

            let comment = conn
                .query_row(
                    "SELECT * FROM comments WHERE id = ?1",
                    params![comment_id],
                    parse_comment_row,
                )
                .optional()?;
            Ok(comment)
        })
    }

    /// Delete a comment. Returns whether it existed.
    pub fn delete_comment(&self, user_id: &str, comment_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM comments WHERE id = ?1 AND user_id = ?2",
                params![comment_id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }
}

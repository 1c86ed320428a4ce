//! Per-user board columns.

use super::{Database, to_ms};
use crate::board::position::allocate;
use crate::error::BoardError;
use crate::types::{Column, ColumnInput, ColumnRole};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;
use uuid::Uuid;

fn parse_column_row(row: &Row) -> rusqlite::Result<Column> {
    let role: String = row.get("role")?;
    Ok(Column {
        id: row.get("id")?,
        title: row.get("title")?,
        role: ColumnRole::from_str(&role).unwrap_or_default(),
        position: row.get("position")?,
        wip_limit: row.get("wip_limit")?,
    })
}

pub(crate) fn list_columns_internal(conn: &Connection, user_id: &str) -> Result<Vec<Column>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, role, position, wip_limit FROM columns
         WHERE user_id = ?1 ORDER BY position, created_at, id",
    )?;
    let columns = stmt
        .query_map(params![user_id], parse_column_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

fn get_column_internal(conn: &Connection, user_id: &str, column_id: &str) -> Result<Option<Column>> {
    let column = conn
        .query_row(
            "SELECT id, title, role, position, wip_limit FROM columns
             WHERE user_id = ?1 AND id = ?2",
            params![user_id, column_id],
            parse_column_row,
        )
        .optional()?;
    Ok(column)
}

fn insert_column(
    conn: &Connection,
    user_id: &str,
    column: &Column,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO columns (user_id, id, title, role, position, wip_limit, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            user_id,
            column.id,
            column.title,
            column.role.as_str(),
            column.position,
            column.wip_limit,
            to_ms(now),
        ],
    )?;
    Ok(())
}

impl Database {
    /// Seed the default columns the first time a user touches their board.
    pub fn ensure_board(
        &self,
        user_id: &str,
        defaults: &[Column],
        now: DateTime<Utc>,
    ) -> Result<Vec<Column>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let existing = list_columns_internal(&tx, user_id)?;
            if !existing.is_empty() {
                return Ok(existing);
            }

            for (idx, column) in defaults.iter().enumerate() {
                let seeded = Column {
                    position: idx as i64,
                    ..column.clone()
                };
                insert_column(&tx, user_id, &seeded, now)?;
            }
            let columns = list_columns_internal(&tx, user_id)?;
            tx.commit()?;

            debug!(user_id, count = columns.len(), "seeded default columns");
            Ok(columns)
        })
    }

    /// Append a column to the end of the board.
    pub fn create_column(
        &self,
        user_id: &str,
        title: &str,
        role: Option<ColumnRole>,
        wip_limit: u32,
        now: DateTime<Utc>,
    ) -> Result<Column> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let existing = list_columns_internal(&tx, user_id)?;
            let column = Column {
                id: Uuid::now_v7().to_string(),
                title: title.to_string(),
                role: role.unwrap_or_else(|| ColumnRole::infer(title, existing.is_empty())),
                position: allocate(existing.iter().map(|c| c.position)),
                wip_limit,
            };
            insert_column(&tx, user_id, &column, now)?;
            tx.commit()?;
            Ok(column)
        })
    }

    /// Update title, role or WIP limit. Returns `None` when the column is unknown.
    pub fn update_column(
        &self,
        user_id: &str,
        column_id: &str,
        input: &ColumnInput,
    ) -> Result<Option<Column>> {
        self.with_conn(|conn| {
            let Some(mut column) = get_column_internal(conn, user_id, column_id)? else {
                return Ok(None);
            };

            if let Some(title) = &input.title {
                column.title = title.clone();
            }
            if let Some(role) = input.role {
                column.role = role;
            }
            if let Some(limit) = input.wip_limit {
                column.wip_limit = limit;
            }

            conn.execute(
                "UPDATE columns SET title = ?3, role = ?4, wip_limit = ?5
                 WHERE user_id = ?1 AND id = ?2",
                params![
                    user_id,
                    column_id,
                    column.title,
                    column.role.as_str(),
                    column.wip_limit
                ],
            )?;
            Ok(Some(column))
        })
    }

    /// Remove an empty column. The board always keeps at least one.
    pub fn delete_column(&self, user_id: &str, column_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if get_column_internal(&tx, user_id, column_id)?.is_none() {
                return Err(BoardError::column_not_found(column_id).into());
            }

            let held: i64 = tx.query_row(
                "SELECT COUNT(*) FROM tasks WHERE user_id = ?1 AND status = ?2",
                params![user_id, column_id],
                |row| row.get(0),
            )?;
            if held > 0 {
                return Err(BoardError::column_not_empty(column_id, held).into());
            }

            let total: i64 = tx.query_row(
                "SELECT COUNT(*) FROM columns WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )?;
            if total <= 1 {
                return Err(BoardError::invalid_value(
                    "columnId",
                    "A board needs at least one column",
                )
                .into());
            }

            tx.execute(
                "DELETE FROM columns WHERE user_id = ?1 AND id = ?2",
                params![user_id, column_id],
            )?;
            tx.commit()?;
            Ok(())
        })
    }
}

//! Recurring task generation.
//!
//! A template is any non-archived task with a daily or weekly rule. Each
//! sweep clones every template that is due into the first column of its
//! owner's board and stamps the template's `lastRun` in the same commit, so
//! a second sweep on the same day spawns nothing.

use super::position::allocate;
use crate::error::{BoardError, BoardResult};
use crate::store::{TaskChange, TaskStore};
use crate::types::{HistoryEvent, HistoryKind, Recurring, Subtask, Task};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome counters of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Ids of the tasks created by this sweep.
    pub spawned: Vec<String>,
    pub skipped: usize,
    pub failed: usize,
}

/// Whole calendar days from `from` to `to`; negative when `from` is later.
pub fn whole_days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Whether a rule is due on `today`. A rule that never ran counts from the epoch.
pub fn is_due(rule: &Recurring, today: NaiveDate) -> bool {
    let Some(interval) = rule.frequency.interval_days() else {
        return false;
    };
    let last = rule
        .last_run
        .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH.date_naive());
    whole_days_between(last, today) >= interval
}

/// Build the plain task spawned from a template.
fn spawn_instance(template: &Task, status: &str, position: i64, now: DateTime<Utc>) -> Task {
    let subtasks = template
        .subtasks
        .iter()
        .map(|s| Subtask {
            id: Uuid::now_v7().to_string(),
            title: s.title.clone(),
            completed: false,
            created_at: now,
        })
        .collect();

    Task {
        id: Uuid::now_v7().to_string(),
        user_id: template.user_id.clone(),
        title: template.title.clone(),
        description: template.description.clone(),
        status: status.to_string(),
        position,
        priority: template.priority,
        tags: template.tags.clone(),
        subtasks,
        dependencies: Vec::new(),
        due_date: None,
        started_at: None,
        completed_at: None,
        last_moved_at: None,
        recurring: None,
        archived: false,
        comment_count: 0,
        created_at: now,
        updated_at: now,
    }
}

/// Clone one due template. Returns the new task id.
fn spawn_from<S: TaskStore + ?Sized>(
    store: &S,
    template: &Task,
    now: DateTime<Utc>,
) -> BoardResult<String> {
    let columns = store.columns(&template.user_id)?;
    let first = columns
        .iter()
        .min_by_key(|c| c.position)
        .ok_or_else(|| BoardError::column_not_found("(first column)"))?;

    let position = allocate(store.column_positions(&template.user_id, &first.id)?);
    let instance = spawn_instance(template, &first.id, position, now);
    let created = HistoryEvent::new(
        HistoryKind::Create {
            column_title: first.title.clone(),
            recurring_from: Some(template.id.clone()),
        },
        now,
    );

    // Only lastRun is written back to the template row.
    let id = instance.id.clone();
    store.apply(vec![
        TaskChange::Insert {
            task: instance,
            events: vec![created],
        },
        TaskChange::AdvanceRecurrence {
            task_id: template.id.clone(),
            user_id: template.user_id.clone(),
            last_run: now.date_naive(),
            updated_at: now,
        },
    ])?;
    Ok(id)
}

/// Run one sweep over every user's templates.
///
/// A failure on one template is logged and counted; the sweep carries on.
pub fn run_sweep<S: TaskStore + ?Sized>(store: &S, now: DateTime<Utc>) -> BoardResult<SweepReport> {
    let today = now.date_naive();
    let templates = store.recurring_templates()?;
    let mut report = SweepReport::default();

    for template in &templates {
        let Some(rule) = template.recurring else {
            continue;
        };
        if !is_due(&rule, today) {
            report.skipped += 1;
            continue;
        }

        match spawn_from(store, template, now) {
            Ok(id) => {
                debug!(template_id = %template.id, task_id = %id, "recurring task spawned");
                report.spawned.push(id);
            }
            Err(e) => {
                warn!(template_id = %template.id, error = %e, "failed to spawn recurring task");
                report.failed += 1;
            }
        }
    }

    info!(
        spawned = report.spawned.len(),
        skipped = report.skipped,
        failed = report.failed,
        "recurrence sweep finished"
    );
    Ok(report)
}

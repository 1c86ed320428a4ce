//! Integration tests for the recurrence sweep.

use anyhow::{Result, bail};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use kanbe::board::{BoardService, run_sweep};
use kanbe::clock::ManualClock;
use kanbe::config::BoardConfig;
use kanbe::db::Database;
use kanbe::store::{TaskChange, TaskStore};
use kanbe::types::{Column, Frequency, HistoryEvent, HistoryKind, NewTask, Recurring, Task};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const USER: &str = "user-1";

fn day_one() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-06-02T00:30:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn setup() -> (BoardService, Arc<ManualClock>) {
    let db = Database::open_in_memory().expect("Failed to create in-memory database");
    let clock = Arc::new(ManualClock::new(day_one()));
    let service = BoardService::new(db, clock.clone(), BoardConfig::default());
    (service, clock)
}

fn template(service: &BoardService, title: &str, frequency: Frequency) -> Task {
    service
        .create_task(
            USER,
            NewTask {
                title: Some(title.to_string()),
                subtasks: vec!["Check".to_string()],
                recurring: Some(Recurring {
                    frequency,
                    last_run: None,
                }),
                ..Default::default()
            },
        )
        .expect("Failed to create template")
}

#[test]
fn daily_template_spawns_once_per_day() {
    let (service, clock) = setup();
    let tpl = template(&service, "Stand-up notes", Frequency::Daily);

    let report = service.run_recurrence().unwrap();
    assert_eq!(report.spawned.len(), 1);
    assert_eq!(report.failed, 0);

    let clone = service.get_task(USER, &report.spawned[0]).unwrap();
    assert_eq!(clone.title, "Stand-up notes");
    assert_eq!(clone.status, "todo");
    assert_eq!(clone.created_at, day_one());
    assert!(clone.recurring.is_none());
    assert_eq!(clone.subtasks.len(), 1);
    assert!(!clone.subtasks[0].completed);
    assert_ne!(clone.subtasks[0].id, tpl.subtasks[0].id);

    let tpl = service.get_task(USER, &tpl.id).unwrap();
    assert_eq!(
        tpl.recurring.and_then(|r| r.last_run),
        Some(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap())
    );

    let history = service.history(USER, &clone.id, false).unwrap();
    assert_eq!(
        history[0].kind,
        HistoryKind::Create {
            column_title: "To Do".to_string(),
            recurring_from: Some(tpl.id.clone()),
        }
    );

    // Same day again: nothing new.
    clock.advance(Duration::hours(20));
    let report = service.run_recurrence().unwrap();
    assert!(report.spawned.is_empty());
    assert_eq!(report.skipped, 1);
    assert_eq!(service.list_tasks(USER, false).unwrap().len(), 2);

    // Next day: one more.
    clock.advance(Duration::hours(4));
    let report = service.run_recurrence().unwrap();
    assert_eq!(report.spawned.len(), 1);
    assert_eq!(service.list_tasks(USER, false).unwrap().len(), 3);
}

#[test]
fn weekly_template_waits_seven_days() {
    let (service, clock) = setup();
    template(&service, "Weekly review", Frequency::Weekly);

    assert_eq!(service.run_recurrence().unwrap().spawned.len(), 1);

    for _ in 0..6 {
        clock.advance(Duration::days(1));
        assert!(service.run_recurrence().unwrap().spawned.is_empty());
    }

    clock.advance(Duration::days(1));
    assert_eq!(service.run_recurrence().unwrap().spawned.len(), 1);
}

#[test]
fn archived_and_inactive_templates_are_ignored() {
    let (service, _clock) = setup();
    let archived = template(&service, "Retired", Frequency::Daily);
    service.set_archived(USER, &archived.id, true).unwrap();
    template(&service, "Off", Frequency::None);

    let report = service.run_recurrence().unwrap();
    assert!(report.spawned.is_empty());
    assert_eq!(report.skipped, 0);
}

#[test]
fn clones_land_after_existing_tasks() {
    let (service, _clock) = setup();
    service
        .create_task(
            USER,
            NewTask {
                title: Some("Existing".into()),
                ..Default::default()
            },
        )
        .unwrap();
    template(&service, "Daily", Frequency::Daily);

    let report = service.run_recurrence().unwrap();
    let clone = service.get_task(USER, &report.spawned[0]).unwrap();
    assert_eq!(clone.position, 2);
}

/// Store whose commits fail for one template.
struct FlakyStore {
    inner: Database,
    poisoned: String,
}

impl TaskStore for FlakyStore {
    fn columns(&self, user_id: &str) -> Result<Vec<Column>> {
        self.inner.columns(user_id)
    }

    fn find_task(&self, user_id: &str, task_id: &str) -> Result<Option<Task>> {
        self.inner.find_task(user_id, task_id)
    }

    fn list_tasks(&self, user_id: &str, include_archived: bool) -> Result<Vec<Task>> {
        self.inner.list_tasks(user_id, include_archived)
    }

    fn column_positions(&self, user_id: &str, status: &str) -> Result<Vec<i64>> {
        self.inner.column_positions(user_id, status)
    }

    fn recurring_templates(&self) -> Result<Vec<Task>> {
        self.inner.recurring_templates()
    }

    fn apply(&self, changes: Vec<TaskChange>) -> Result<()> {
        if changes.iter().any(|c| c.task_id() == self.poisoned) {
            bail!("disk full");
        }
        self.inner.apply(changes)
    }

    fn delete_task(&self, user_id: &str, task_id: &str) -> Result<bool> {
        self.inner.delete_task(user_id, task_id)
    }

    fn history(&self, user_id: &str, task_id: &str) -> Result<Vec<HistoryEvent>> {
        self.inner.history(user_id, task_id)
    }
}

#[test]
fn one_failing_template_does_not_stop_the_sweep() {
    let (service, clock) = setup();
    let bad = template(&service, "Broken", Frequency::Daily);
    let good = template(&service, "Fine", Frequency::Daily);

    let store = FlakyStore {
        inner: service.db().clone(),
        poisoned: bad.id.clone(),
    };
    use mockable::Clock;
    let report = run_sweep(&store, clock.utc()).unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.spawned.len(), 1);

    // The failed template was not advanced, the good one was.
    let bad = service.get_task(USER, &bad.id).unwrap();
    assert_eq!(bad.recurring.and_then(|r| r.last_run), None);
    let good = service.get_task(USER, &good.id).unwrap();
    assert!(good.recurring.and_then(|r| r.last_run).is_some());
    assert_eq!(service.list_tasks(USER, false).unwrap().len(), 3);
}

/// Store that moves the template to another column right before the sweep commits.
struct MovedMidSweepStore {
    inner: Database,
    template_id: String,
    now: DateTime<Utc>,
    moved: AtomicBool,
}

impl TaskStore for MovedMidSweepStore {
    fn columns(&self, user_id: &str) -> Result<Vec<Column>> {
        self.inner.columns(user_id)
    }

    fn find_task(&self, user_id: &str, task_id: &str) -> Result<Option<Task>> {
        self.inner.find_task(user_id, task_id)
    }

    fn list_tasks(&self, user_id: &str, include_archived: bool) -> Result<Vec<Task>> {
        self.inner.list_tasks(user_id, include_archived)
    }

    fn column_positions(&self, user_id: &str, status: &str) -> Result<Vec<i64>> {
        self.inner.column_positions(user_id, status)
    }

    fn recurring_templates(&self) -> Result<Vec<Task>> {
        self.inner.recurring_templates()
    }

    fn apply(&self, changes: Vec<TaskChange>) -> Result<()> {
        if !self.moved.swap(true, Ordering::SeqCst) {
            kanbe::board::moves::move_to_column(
                &self.inner,
                USER,
                &self.template_id,
                "in-progress",
                self.now,
            )?;
        }
        self.inner.apply(changes)
    }

    fn delete_task(&self, user_id: &str, task_id: &str) -> Result<bool> {
        self.inner.delete_task(user_id, task_id)
    }

    fn history(&self, user_id: &str, task_id: &str) -> Result<Vec<HistoryEvent>> {
        self.inner.history(user_id, task_id)
    }
}

#[test]
fn template_moved_mid_sweep_keeps_its_move() {
    let (service, clock) = setup();
    let tpl = template(&service, "Water plants", Frequency::Daily);

    use mockable::Clock;
    let store = MovedMidSweepStore {
        inner: service.db().clone(),
        template_id: tpl.id.clone(),
        now: clock.utc(),
        moved: AtomicBool::new(false),
    };
    let report = run_sweep(&store, clock.utc()).unwrap();
    assert_eq!(report.spawned.len(), 1);
    assert_eq!(report.failed, 0);

    let tpl = service.get_task(USER, &tpl.id).unwrap();
    assert_eq!(tpl.status, "in-progress");
    assert!(tpl.started_at.is_some());
    assert!(tpl.last_moved_at.is_some());
    assert_eq!(
        tpl.recurring.and_then(|r| r.last_run),
        Some(NaiveDate::from_ymd_opt(2025, 6, 2).unwrap())
    );

    let history = service.history(USER, &tpl.id, false).unwrap();
    assert!(history.iter().any(|e| e.kind
        == HistoryKind::Move {
            from: "To Do".to_string(),
            to: "In Progress".to_string(),
        }));
}

//! Daily background jobs.
//!
//! The recurrence sweep and the backup run once at startup and then at
//! `schedule.run_at` (UTC) every day. A failing job is logged and retried at
//! the next tick; it never takes the server down.

use crate::backup;
use crate::board::BoardService;
use crate::config::{BackupConfig, ScheduleConfig};
use anyhow::Result;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Time left until the next `run_at` strictly after `now`.
pub fn until_next_run(now: DateTime<Utc>, run_at: NaiveTime) -> std::time::Duration {
    let today = now.date_naive().and_time(run_at).and_utc();
    let next = if today > now {
        today
    } else {
        today + Duration::days(1)
    };
    (next - now).to_std().unwrap_or_default()
}

/// Run every daily job once.
pub fn run_daily_jobs(service: &BoardService, backup_config: &BackupConfig) {
    match service.run_recurrence() {
        Ok(report) => debug!(spawned = report.spawned.len(), "scheduled sweep finished"),
        Err(e) => warn!(error = %e, "recurrence sweep failed"),
    }

    if backup_config.enabled {
        if let Err(e) = backup::run_backup(service.db(), backup_config, service.now()) {
            warn!(error = %e, "backup failed");
        }
    }
}

/// Spawn the daily job loop. Returns `None` when scheduling is disabled.
pub fn spawn_daily_jobs(
    service: BoardService,
    schedule: &ScheduleConfig,
    backup_config: BackupConfig,
) -> Result<Option<JoinHandle<()>>> {
    if !schedule.enabled {
        info!("daily jobs disabled");
        return Ok(None);
    }
    let run_at = schedule.run_at_time()?;

    let handle = tokio::spawn(async move {
        loop {
            let jobs_service = service.clone();
            let jobs_backup = backup_config.clone();
            // Jobs hit SQLite synchronously; keep them off the async workers.
            let joined = tokio::task::spawn_blocking(move || {
                run_daily_jobs(&jobs_service, &jobs_backup);
            })
            .await;
            if let Err(e) = joined {
                warn!(error = %e, "daily jobs panicked");
            }

            let wait = until_next_run(service.now(), run_at);
            debug!(seconds = wait.as_secs(), "next daily run scheduled");
            tokio::time::sleep(wait).await;
        }
    });

    info!(run_at = %run_at.format("%H:%M"), "daily jobs scheduled");
    Ok(Some(handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn later_today() {
        let wait = until_next_run(at("2025-01-01T10:00:00Z"), hm(12, 30));
        assert_eq!(wait.as_secs(), 2 * 3600 + 30 * 60);
    }

    #[test]
    fn already_passed_rolls_to_tomorrow() {
        let wait = until_next_run(at("2025-01-01T23:00:00Z"), hm(0, 0));
        assert_eq!(wait.as_secs(), 3600);
    }

    #[test]
    fn exactly_now_waits_a_full_day() {
        let wait = until_next_run(at("2025-01-01T00:00:00Z"), hm(0, 0));
        assert_eq!(wait.as_secs(), 24 * 3600);
    }
}

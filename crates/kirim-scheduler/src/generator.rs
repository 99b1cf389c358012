use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tracing::debug;

use kirim_core::types::{Schedule, ScheduleKind};
use kirim_store::{NewJob, Store};

use crate::clock;
use crate::error::Result;
use crate::expand::expand;

/// Top up the materialized job horizon for one schedule.
///
/// Idempotent: safe to call every tick. The resume point is one local day
/// after the latest non-cancelled job already materialized (or the
/// schedule's start date if none exist), clamped up to `now` for recurring
/// kinds so already-elapsed gaps are never backfilled. A ONCE schedule's
/// single instant is materialized even when its date has passed — the
/// obligation stands until a job row exists for it.
///
/// Returns the number of jobs created. Never mutates existing jobs; a
/// duplicate instant is skipped by the store's uniqueness invariant.
pub fn ensure_jobs(
    store: &Store,
    schedule: &Schedule,
    now: &DateTime<Utc>,
    horizon_days: u32,
    tz: Tz,
) -> Result<usize> {
    let window_end = *now + Duration::days(horizon_days as i64);

    let window_start = match store.latest_scheduled_at(&schedule.id)? {
        Some(latest) => {
            let next_day = clock::local_date(&latest, tz)
                .succ_opt()
                .unwrap_or_else(|| clock::local_date(&latest, tz));
            let resume = clock::start_of_day(next_day, tz);
            if schedule.kind == ScheduleKind::Once {
                // A ONCE schedule with an existing job is fully materialized.
                return Ok(0);
            }
            resume.max(*now)
        }
        None => {
            let start = clock::start_of_day(schedule.start_date, tz);
            if schedule.kind == ScheduleKind::Once {
                start
            } else {
                start.max(*now)
            }
        }
    };

    if window_start > window_end {
        return Ok(0);
    }

    let instants = expand(schedule, &window_start, &window_end, tz)?;
    if instants.is_empty() {
        return Ok(0);
    }

    let jobs: Vec<NewJob> = instants
        .into_iter()
        .map(|scheduled_at| NewJob {
            schedule_id: Some(schedule.id.clone()),
            post_id: schedule.post_id.clone(),
            scheduled_at,
        })
        .collect();

    let created = store.insert_jobs_skip_existing(&jobs)?;
    debug!(schedule_id = %schedule.id, created, "job horizon extended");
    Ok(created)
}

/// Expand a schedule's full forward window from scratch.
///
/// Used when an edit replaces a schedule's future job set: the caller
/// cancels the old future PENDING rows and inserts this batch in one
/// store transaction ([`Store::apply_schedule_update`]).
pub fn regenerate_jobs(
    schedule: &Schedule,
    now: &DateTime<Utc>,
    horizon_days: u32,
    tz: Tz,
) -> Result<Vec<NewJob>> {
    let window_end = *now + Duration::days(horizon_days as i64);
    let start = clock::start_of_day(schedule.start_date, tz);
    let window_start = if schedule.kind == ScheduleKind::Once {
        start
    } else {
        start.max(*now)
    };

    if window_start > window_end {
        return Ok(Vec::new());
    }

    let instants = expand(schedule, &window_start, &window_end, tz)?;
    Ok(instants
        .into_iter()
        .map(|scheduled_at| NewJob {
            schedule_id: Some(schedule.id.clone()),
            post_id: schedule.post_id.clone(),
            scheduled_at,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use kirim_core::types::JobStatus;
    use kirim_store::{NewSchedule, UpdateSchedule};

    const TZ: Tz = chrono_tz::Asia::Pontianak;

    fn store_with_daily() -> (Store, Schedule) {
        let store = Store::open_in_memory().unwrap();
        let schedule = store
            .create_schedule(NewSchedule {
                name: None,
                post_id: "p1".to_string(),
                kind: ScheduleKind::Daily,
                time_of_day: "09:00".to_string(),
                start_date: NaiveDate::from_ymd_opt(2026, 8, 1).unwrap(),
                end_date: None,
                days_of_week: None,
                days_of_month: None,
                is_active: true,
            })
            .unwrap();
        (store, schedule)
    }

    fn noon(d: u32) -> DateTime<Utc> {
        clock::local_instant(NaiveDate::from_ymd_opt(2026, 8, d).unwrap(), 12, 0, TZ).unwrap()
    }

    #[test]
    fn ensure_jobs_is_idempotent() {
        let (store, schedule) = store_with_daily();
        let now = noon(6);

        let first = ensure_jobs(&store, &schedule, &now, 30, TZ).unwrap();
        assert!(first > 0);
        let second = ensure_jobs(&store, &schedule, &now, 30, TZ).unwrap();
        assert_eq!(second, 0);
    }

    #[test]
    fn non_cancelled_instants_stay_unique() {
        let (store, schedule) = store_with_daily();
        let now = noon(6);

        ensure_jobs(&store, &schedule, &now, 10, TZ).unwrap();
        ensure_jobs(&store, &schedule, &now, 20, TZ).unwrap();
        ensure_jobs(&store, &schedule, &now, 30, TZ).unwrap();

        let jobs = store.jobs_for_schedule(&schedule.id).unwrap();
        let mut instants: Vec<_> = jobs
            .iter()
            .filter(|j| j.status != JobStatus::Cancelled)
            .map(|j| j.scheduled_at)
            .collect();
        let before = instants.len();
        instants.sort();
        instants.dedup();
        assert_eq!(instants.len(), before);
    }

    #[test]
    fn horizon_extension_resumes_after_latest() {
        let (store, schedule) = store_with_daily();
        let now = noon(6);

        // Aug 6 12:00 local, 09:00 send time: today's slot has passed, so
        // the first batch covers Aug 7..=Sep 5 — 30 jobs.
        let created = ensure_jobs(&store, &schedule, &now, 30, TZ).unwrap();
        assert_eq!(created, 30);

        // Widening the horizon by five days adds exactly five more.
        let more = ensure_jobs(&store, &schedule, &now, 35, TZ).unwrap();
        assert_eq!(more, 5);
    }

    #[test]
    fn elapsed_gap_is_not_backfilled() {
        let (store, schedule) = store_with_daily();
        // start_date Aug 1, but first generation happens Aug 6: nothing for
        // Aug 1..=Aug 5 (and Aug 6's 09:00 has passed by 12:00).
        let created = ensure_jobs(&store, &schedule, &noon(6), 3, TZ).unwrap();
        assert_eq!(created, 3);
        let earliest = store
            .jobs_for_schedule(&schedule.id)
            .unwrap()
            .first()
            .unwrap()
            .scheduled_at;
        assert_eq!(
            clock::local_date(&earliest, TZ),
            NaiveDate::from_ymd_opt(2026, 8, 7).unwrap()
        );
    }

    #[test]
    fn end_date_caps_the_window() {
        let (store, mut schedule) = store_with_daily();
        schedule.end_date = Some(NaiveDate::from_ymd_opt(2026, 8, 10).unwrap());
        let created = ensure_jobs(&store, &schedule, &noon(6), 30, TZ).unwrap();
        // Aug 7..=Aug 10 only.
        assert_eq!(created, 4);
    }

    #[test]
    fn once_yesterday_materializes_exactly_one_job() {
        let store = Store::open_in_memory().unwrap();
        let schedule = store
            .create_schedule(NewSchedule {
                name: None,
                post_id: "p1".to_string(),
                kind: ScheduleKind::Once,
                time_of_day: "10:00".to_string(),
                start_date: NaiveDate::from_ymd_opt(2026, 8, 5).unwrap(),
                end_date: None,
                days_of_week: None,
                days_of_month: None,
                is_active: true,
            })
            .unwrap();

        let now = noon(6); // a day after start_date
        assert_eq!(ensure_jobs(&store, &schedule, &now, 30, TZ).unwrap(), 1);

        let jobs = store.jobs_for_schedule(&schedule.id).unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(
            jobs[0].scheduled_at,
            clock::local_instant(schedule.start_date, 10, 0, TZ).unwrap()
        );

        // Re-running changes nothing.
        assert_eq!(ensure_jobs(&store, &schedule, &now, 30, TZ).unwrap(), 0);
    }

    #[test]
    fn edit_regenerates_without_timestamp_overlap() {
        let (store, schedule) = store_with_daily();
        let now = noon(6);
        ensure_jobs(&store, &schedule, &now, 10, TZ).unwrap();

        // Move the send time to 18:00 and swap the future set atomically.
        let mut edited = schedule.clone();
        edited.time_of_day = "18:00".to_string();
        let regenerated = regenerate_jobs(&edited, &now, 10, TZ).unwrap();
        store
            .apply_schedule_update(
                &schedule.id,
                UpdateSchedule {
                    time_of_day: Some("18:00".to_string()),
                    ..Default::default()
                },
                &now,
                &regenerated,
            )
            .unwrap();

        let jobs = store.jobs_for_schedule(&schedule.id).unwrap();
        let pending: Vec<_> = jobs
            .iter()
            .filter(|j| j.status == JobStatus::Pending)
            .collect();
        let cancelled: Vec<_> = jobs
            .iter()
            .filter(|j| j.status == JobStatus::Cancelled)
            .collect();
        assert!(!pending.is_empty());
        assert!(!cancelled.is_empty());
        // No instant appears in both sets.
        for p in &pending {
            assert!(cancelled.iter().all(|c| c.scheduled_at != p.scheduled_at));
        }
        // The new set sends at 18:00 local.
        for p in &pending {
            assert_eq!(
                p.scheduled_at.with_timezone(&TZ).format("%H:%M").to_string(),
                "18:00"
            );
        }
    }
}

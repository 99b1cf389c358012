use chrono::{DateTime, Datelike, Utc};
use chrono_tz::Tz;

use kirim_core::types::{parse_days_of_month, parse_days_of_week, parse_time_of_day, Schedule, ScheduleKind};

use crate::clock;
use crate::error::{Result, SchedulerError};

/// Expand a recurrence rule over a time window into concrete UTC instants.
///
/// Every calendar day (in `tz`) the window touches is a candidate; a
/// matching day emits one instant — the day's date with the schedule's
/// time-of-day overlaid — kept only if it falls inside
/// `[window_start, window_end]`. ONCE is the exception: it is a pure
/// date-membership check, so its instant may precede `window_start` on the
/// window's first day. The result is sorted ascending. The function is
/// stateless and restartable; callers re-invoke it with a new window to
/// extend coverage.
///
/// `end_date` clamps the walk: no instant falls on a later date. A
/// `days_of_month` entry with no matching date in some month (31 in
/// February) simply emits nothing for that month.
pub fn expand(
    schedule: &Schedule,
    window_start: &DateTime<Utc>,
    window_end: &DateTime<Utc>,
    tz: Tz,
) -> Result<Vec<DateTime<Utc>>> {
    if window_start > window_end {
        return Ok(Vec::new());
    }

    let (hour, minute) =
        parse_time_of_day(&schedule.time_of_day).map_err(SchedulerError::Config)?;

    let first_day = clock::local_date(window_start, tz);
    let last_day = clock::local_date(window_end, tz);

    // ONCE is a single date-membership check, no day walk.
    if schedule.kind == ScheduleKind::Once {
        if schedule.start_date < first_day || schedule.start_date > last_day {
            return Ok(Vec::new());
        }
        return Ok(clock::local_instant(schedule.start_date, hour, minute, tz)
            .into_iter()
            .collect());
    }

    let weekdays = match schedule.kind {
        ScheduleKind::Weekly => {
            let csv = schedule.days_of_week.as_deref().ok_or_else(|| {
                SchedulerError::Config("weekly schedule has no days_of_week".to_string())
            })?;
            Some(parse_days_of_week(csv).map_err(SchedulerError::Config)?)
        }
        _ => None,
    };
    let month_days = match schedule.kind {
        ScheduleKind::Monthly => {
            let csv = schedule.days_of_month.as_deref().ok_or_else(|| {
                SchedulerError::Config("monthly schedule has no days_of_month".to_string())
            })?;
            Some(parse_days_of_month(csv).map_err(SchedulerError::Config)?)
        }
        _ => None,
    };

    let mut out = Vec::new();
    let mut cursor = first_day;
    while cursor <= last_day {
        if let Some(end) = schedule.end_date {
            if cursor > end {
                break;
            }
        }

        let matches = match schedule.kind {
            ScheduleKind::Daily => true,
            ScheduleKind::Weekly => weekdays
                .as_ref()
                .is_some_and(|days| days.contains(&cursor.weekday())),
            ScheduleKind::Monthly => month_days
                .as_ref()
                .is_some_and(|days| days.contains(&cursor.day())),
            ScheduleKind::Once => unreachable!("handled above"),
        };

        if matches {
            // None = the overlay time sits in a DST gap; that day emits nothing.
            if let Some(instant) = clock::local_instant(cursor, hour, minute, tz) {
                if &instant >= window_start && &instant <= window_end {
                    out.push(instant);
                }
            }
        }

        cursor = match cursor.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    Ok(out)
}

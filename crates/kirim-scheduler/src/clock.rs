use chrono::{DateTime, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Calendar date of `instant` in the configured zone.
pub fn local_date(instant: &DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Overlay HH:MM:00 on a calendar date in the zone and map to a UTC instant.
///
/// A local time that does not exist (DST spring-forward gap) yields `None`;
/// an ambiguous one (fall-back) resolves to the earlier offset.
pub fn local_instant(date: NaiveDate, hour: u32, minute: u32, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earlier, _) => Some(earlier.with_timezone(&Utc)),
        LocalResult::None => None,
    }
}

/// UTC instant of local midnight on `date`. Falls forward hour by hour for
/// the rare zones where midnight itself sits in a DST gap.
pub fn start_of_day(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    for hour in 0..4 {
        if let Some(dt) = local_instant(date, hour, 0, tz) {
            return dt;
        }
    }
    // No zone skips four consecutive hours; treat the naive time as UTC.
    DateTime::from_naive_utc_and_offset(date.and_hms_opt(0, 0, 0).unwrap(), Utc)
}

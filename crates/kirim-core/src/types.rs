use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Payload kind of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Text,
    Image,
    Video,
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MediaType::Text => "text",
            MediaType::Image => "image",
            MediaType::Video => "video",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(MediaType::Text),
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            other => Err(format!("unknown media type: {other}")),
        }
    }
}

/// Recurrence kind of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Once,
    Daily,
    Weekly,
    Monthly,
}

impl std::fmt::Display for ScheduleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScheduleKind::Once => "once",
            ScheduleKind::Daily => "daily",
            ScheduleKind::Weekly => "weekly",
            ScheduleKind::Monthly => "monthly",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ScheduleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "once" => Ok(ScheduleKind::Once),
            "daily" => Ok(ScheduleKind::Daily),
            "weekly" => Ok(ScheduleKind::Weekly),
            "monthly" => Ok(ScheduleKind::Monthly),
            other => Err(format!("unknown schedule kind: {other}")),
        }
    }
}

/// Lifecycle state of one delivery obligation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for its scheduled_at time.
    Pending,
    /// Currently being dispatched.
    Sending,
    /// Delivered successfully.
    Sent,
    /// Dispatch failed; error_message holds the reason.
    Failed,
    /// Superseded by a schedule edit or deletion. Kept for the audit trail.
    Cancelled,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Sending => "sending",
            JobStatus::Sent => "sent",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "sending" => Ok(JobStatus::Sending),
            "sent" => Ok(JobStatus::Sent),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// Whether the destination is a single contact or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationKind {
    Single,
    Group,
}

impl std::fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DestinationKind::Single => "single",
            DestinationKind::Group => "group",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for DestinationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(DestinationKind::Single),
            "group" => Ok(DestinationKind::Group),
            other => Err(format!("unknown destination kind: {other}")),
        }
    }
}

/// A grouping label for posts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    /// RFC3339 creation timestamp.
    pub created_at: String,
}

/// Content to be delivered. Immutable for scheduling purposes — the
/// dispatcher reads it, never writes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub category_id: Option<String>,
    pub title: Option<String>,
    pub caption: String,
    pub media_type: MediaType,
    /// URL the media bytes are fetched from at send time. Empty for text posts.
    pub media_url: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A recurrence rule bound to a post.
///
/// `time_of_day` and the day-set columns stay in their stored string form
/// ("HH:MM", "MON,WED", "1,15") — they are validated when the recurrence is
/// expanded, so a malformed rule surfaces as a per-schedule config error
/// instead of poisoning reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub name: Option<String>,
    pub post_id: String,
    pub kind: ScheduleKind,
    /// "HH:MM", 24-hour.
    pub time_of_day: String,
    pub start_date: NaiveDate,
    /// Last calendar date a job may fall on. None = open-ended.
    pub end_date: Option<NaiveDate>,
    /// CSV of weekday codes ("MON,WED"). Required when kind = weekly.
    pub days_of_week: Option<String>,
    /// CSV of day numbers ("1,15,31"). Required when kind = monthly.
    pub days_of_month: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// One concrete, time-stamped delivery obligation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub id: String,
    /// None for immediate "send now" jobs.
    pub schedule_id: Option<String>,
    pub post_id: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: JobStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// The single active delivery destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub id: String,
    /// Phone number or group identifier, as entered by the operator.
    pub destination: String,
    pub kind: DestinationKind,
    pub updated_at: String,
}

/// Parse "HH:MM" into (hour, minute).
pub fn parse_time_of_day(s: &str) -> Result<(u32, u32), String> {
    let (h, m) = s
        .split_once(':')
        .ok_or_else(|| format!("time_of_day must be HH:MM, got {s:?}"))?;
    let hour: u32 = h
        .parse()
        .map_err(|_| format!("invalid hour in time_of_day {s:?}"))?;
    let minute: u32 = m
        .parse()
        .map_err(|_| format!("invalid minute in time_of_day {s:?}"))?;
    if hour > 23 || minute > 59 {
        return Err(format!("time_of_day out of range: {s:?}"));
    }
    Ok((hour, minute))
}

/// Parse a CSV weekday set ("MON,WED") into chrono weekdays.
pub fn parse_days_of_week(s: &str) -> Result<Vec<Weekday>, String> {
    s.split(',')
        .map(|d| match d.trim().to_ascii_uppercase().as_str() {
            "SUN" => Ok(Weekday::Sun),
            "MON" => Ok(Weekday::Mon),
            "TUE" => Ok(Weekday::Tue),
            "WED" => Ok(Weekday::Wed),
            "THU" => Ok(Weekday::Thu),
            "FRI" => Ok(Weekday::Fri),
            "SAT" => Ok(Weekday::Sat),
            other => Err(format!("unknown weekday code: {other:?}")),
        })
        .collect()
}

/// Parse a CSV day-of-month set ("1,15,31") into day numbers.
pub fn parse_days_of_month(s: &str) -> Result<Vec<u32>, String> {
    s.split(',')
        .map(|d| {
            let day: u32 = d
                .trim()
                .parse()
                .map_err(|_| format!("invalid day of month: {d:?}"))?;
            if (1..=31).contains(&day) {
                Ok(day)
            } else {
                Err(format!("day of month out of range: {day}"))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_of_day_roundtrips() {
        assert_eq!(parse_time_of_day("08:30"), Ok((8, 30)));
        assert_eq!(parse_time_of_day("0:05"), Ok((0, 5)));
        assert_eq!(parse_time_of_day("23:59"), Ok((23, 59)));
    }

    #[test]
    fn time_of_day_rejects_garbage() {
        assert!(parse_time_of_day("24:00").is_err());
        assert!(parse_time_of_day("12:60").is_err());
        assert!(parse_time_of_day("noonish").is_err());
        assert!(parse_time_of_day("12").is_err());
    }

    #[test]
    fn weekday_csv_parses_case_insensitively() {
        let days = parse_days_of_week("mon, WED,fri").unwrap();
        assert_eq!(days, vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]);
    }

    #[test]
    fn weekday_csv_rejects_unknown_codes() {
        assert!(parse_days_of_week("MON,FUNDAY").is_err());
    }

    #[test]
    fn day_of_month_csv_bounds() {
        assert_eq!(parse_days_of_month("1,15,31").unwrap(), vec![1, 15, 31]);
        assert!(parse_days_of_month("0").is_err());
        assert!(parse_days_of_month("32").is_err());
    }

    #[test]
    fn status_roundtrips_through_strings() {
        for status in [
            JobStatus::Pending,
            JobStatus::Sending,
            JobStatus::Sent,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            let s = status.to_string();
            assert_eq!(s.parse::<JobStatus>().unwrap(), status);
        }
    }
}

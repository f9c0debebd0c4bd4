// Recurrence presets and first-fire time calculation
//
// The job scheduler only knows fixed-interval recurrences. Hourly,
// twice-daily and daily are native; weekly and monthly are registered on top.

use crate::errors::ScheduleError;
use crate::models::Cadence;
use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

pub const HOURLY_INTERVAL_SECONDS: i64 = 3_600;
pub const TWICE_DAILY_INTERVAL_SECONDS: i64 = 43_200;
pub const DAILY_INTERVAL_SECONDS: i64 = 86_400;
pub const WEEKLY_INTERVAL_SECONDS: i64 = 604_800;
/// 30.5 days; not calendar-month aware
pub const MONTHLY_INTERVAL_SECONDS: i64 = 2_635_200;

impl Cadence {
    pub const ALL: [Cadence; 5] = [
        Cadence::Hourly,
        Cadence::TwiceDaily,
        Cadence::Daily,
        Cadence::Weekly,
        Cadence::Monthly,
    ];

    pub fn interval_seconds(&self) -> i64 {
        match self {
            Cadence::Hourly => HOURLY_INTERVAL_SECONDS,
            Cadence::TwiceDaily => TWICE_DAILY_INTERVAL_SECONDS,
            Cadence::Daily => DAILY_INTERVAL_SECONDS,
            Cadence::Weekly => WEEKLY_INTERVAL_SECONDS,
            Cadence::Monthly => MONTHLY_INTERVAL_SECONDS,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::seconds(self.interval_seconds())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Cadence::Hourly => "hourly",
            Cadence::TwiceDaily => "twicedaily",
            Cadence::Daily => "daily",
            Cadence::Weekly => "weekly",
            Cadence::Monthly => "monthly",
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            Cadence::Hourly => "Once Hourly",
            Cadence::TwiceDaily => "Twice Daily",
            Cadence::Daily => "Once Daily",
            Cadence::Weekly => "Once Weekly",
            Cadence::Monthly => "Once a month",
        }
    }

    /// Whether the host scheduler provides this recurrence itself
    pub fn is_native(&self) -> bool {
        matches!(self, Cadence::Hourly | Cadence::TwiceDaily | Cadence::Daily)
    }

    /// Look a cadence up by its registered name
    pub fn from_name(name: &str) -> Option<Cadence> {
        Cadence::ALL.iter().copied().find(|c| c.name() == name)
    }
}

/// Parse an `HH:MM` (or `HH:MM:SS`) time of day
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, ScheduleError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|e| ScheduleError::InvalidTime {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Parse a configured timezone name
pub fn parse_timezone(name: &str) -> Result<Tz, ScheduleError> {
    name.parse::<Tz>()
        .map_err(|_| ScheduleError::InvalidTimezone(name.to_string()))
}

/// Map a wall-clock time in `tz` to UTC
///
/// Ambiguous times take the earlier instant; times inside a DST gap are
/// pushed forward by the size of a typical gap.
fn resolve_local(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}

/// Next instant at which the wall clock in `tz` reads `time`, strictly after `now`
pub fn next_occurrence(time: NaiveTime, now: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let today = now.with_timezone(&tz).date_naive();
    let candidate = resolve_local(today.and_time(time), tz);
    if candidate > now {
        return candidate;
    }
    let tomorrow = today + Duration::days(1);
    resolve_local(tomorrow.and_time(time), tz)
}

/// Move `next_run` forward by whole cadence steps until it is after `now`
///
/// Runs missed while the process was down collapse into the single fire that
/// triggered this call.
pub fn advance_past(next_run: DateTime<Utc>, cadence: Cadence, now: DateTime<Utc>) -> DateTime<Utc> {
    let interval = cadence.interval_seconds();
    if next_run > now {
        return next_run;
    }
    let behind = (now - next_run).num_seconds();
    let steps = behind / interval + 1;
    next_run + Duration::seconds(steps * interval)
}

use time::{
    format_description::FormatItem, macros::format_description, Date, Duration, OffsetDateTime,
    Time, UtcOffset,
};

/// Decimal places kept for hour figures.
pub const HOURS_PRECISION: i32 = 4;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const LAST_MILLISECOND: Time = time::macros::time!(23:59:59.999);
const OFFSET_FORMAT: &[FormatItem<'static>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

/// Source of "now". Injected so elapsed-time arithmetic can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

pub fn round_hours(hours: f64) -> f64 {
    let factor = 10f64.powi(HOURS_PRECISION);
    (hours * factor).round() / factor
}

/// Elapsed hours between two instants, rounded to [`HOURS_PRECISION`].
/// Negative spans clamp to zero.
pub fn hours_between(start: OffsetDateTime, end: OffsetDateTime) -> f64 {
    let elapsed = end - start;
    if elapsed.is_negative() {
        return 0.0;
    }
    round_hours(elapsed.as_seconds_f64() / 3600.0)
}

/// Sum of recorded hours, skipping entries that have none.
pub fn sum_hours<I>(hours: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    round_hours(hours.into_iter().flatten().sum())
}

/// Half-open `[start, end)` window of instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl Window {
    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        instant >= self.start && instant < self.end
    }
}

fn midnight(date: Date, offset: UtcOffset) -> OffsetDateTime {
    date.with_time(Time::MIDNIGHT).assume_offset(offset)
}

/// Local midnight to the next midnight.
pub fn day_window(now: OffsetDateTime, offset: UtcOffset) -> Window {
    let today = now.to_offset(offset).date();
    let start = midnight(today, offset);
    Window {
        start,
        end: start + Duration::days(1),
    }
}

/// Seven days starting on the most recent Sunday (today if it is Sunday).
pub fn week_window(now: OffsetDateTime, offset: UtcOffset) -> Window {
    let today = now.to_offset(offset).date();
    let since_sunday = i64::from(today.weekday().number_days_from_sunday());
    let start = midnight(today - Duration::days(since_sunday), offset);
    Window {
        start,
        end: start + Duration::days(7),
    }
}

/// First day of the calendar month to the first day of the next one.
pub fn month_window(now: OffsetDateTime, offset: UtcOffset) -> Window {
    let today = now.to_offset(offset).date();
    let first = today - Duration::days(i64::from(today.day()) - 1);
    let days = time::util::days_in_year_month(first.year(), first.month());
    let next = first + Duration::days(i64::from(days));
    Window {
        start: midnight(first, offset),
        end: midnight(next, offset),
    }
}

/// Inclusive bounds for a calendar-date filter: `start 00:00:00.000` and
/// `end 23:59:59.999`, both in local time.
pub fn date_bounds(
    start: Option<Date>,
    end: Option<Date>,
    offset: UtcOffset,
) -> (Option<OffsetDateTime>, Option<OffsetDateTime>) {
    let from = start.map(|d| midnight(d, offset));
    let to = end.map(|d| d.with_time(LAST_MILLISECOND).assume_offset(offset));
    (from, to)
}

pub fn parse_date(raw: &str) -> Option<Date> {
    Date::parse(raw.trim(), DATE_FORMAT).ok()
}

/// Parses `+HH:MM` / `-HH:MM`; `Z` and `UTC` mean zero.
pub fn parse_utc_offset(raw: &str) -> Option<UtcOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Some(UtcOffset::UTC);
    }
    UtcOffset::parse(raw, OFFSET_FORMAT).ok()
}

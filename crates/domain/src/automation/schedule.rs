//! Schedule arithmetic — mapping a trigger to its next fire instant.
//!
//! Pure functions over `chrono` types; failure is `None`, never a panic or
//! an error. Callers treat `None` as "this automation cannot currently be
//! scheduled".

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, TimeZone, Weekday};

use super::Trigger;

/// How many days ahead a day-restricted `AtTime` trigger is scanned before
/// giving up. A day set that never matches inside the horizon yields `None`
/// and the automation silently stops being scheduled.
const DAY_SCAN_HORIZON: u64 = 7;

/// Parse a strict `HH:MM` clock time: exactly two digits each, hour 0–23,
/// minute 0–59.
#[must_use]
pub fn parse_hhmm(text: &str) -> Option<(u32, u32)> {
    let bytes = text.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return None;
    }
    for &b in [bytes[0], bytes[1], bytes[3], bytes[4]].iter() {
        if !b.is_ascii_digit() {
            return None;
        }
    }
    let hour = u32::from(bytes[0] - b'0') * 10 + u32::from(bytes[1] - b'0');
    let minute = u32::from(bytes[3] - b'0') * 10 + u32::from(bytes[4] - b'0');
    if hour > 23 || minute > 59 {
        return None;
    }
    Some((hour, minute))
}

/// Day-of-week matcher for `AtTime` day restrictions.
///
/// Tokens are case-insensitive 3-letter day names, comma-delimited, with
/// whitespace and token order ignored. Matching wraps both sides in commas
/// and does a substring search — safe because tokens are fixed-length.
/// An empty day set matches every day.
#[must_use]
pub fn matches_day(days_csv: &str, weekday: Weekday) -> bool {
    if days_csv.trim().is_empty() {
        return true;
    }
    let want = match weekday {
        Weekday::Sun => "sun",
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
    };
    let normalized: String = days_csv
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    let wrapped = format!(",{normalized},");
    wrapped.contains(&format!(",{want},"))
}

/// Compute the next fire instant for `trigger`, strictly after `from` for
/// wall-clock triggers and relative to `from` for delay/interval triggers.
///
/// Millisecond fields truncate to whole seconds. Returns `None` when the
/// trigger cannot produce a future instant (malformed time, zero interval,
/// exhausted day horizon).
#[must_use]
pub fn next_run_time<Tz: TimeZone>(trigger: &Trigger, from: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    match trigger {
        Trigger::AtTime { time, days } => next_at_time(time, days.as_deref().unwrap_or(""), from),
        Trigger::AfterDelay { delay_ms } => offset_seconds(from, *delay_ms),
        Trigger::Interval { interval_ms } => offset_seconds(from, *interval_ms),
    }
}

fn offset_seconds<Tz: TimeZone>(from: &DateTime<Tz>, millis: u64) -> Option<DateTime<Tz>> {
    if millis == 0 {
        return None;
    }
    let seconds = i64::try_from(millis / 1000).ok()?;
    from.clone().checked_add_signed(Duration::seconds(seconds))
}

fn next_at_time<Tz: TimeZone>(
    time: &str,
    days_csv: &str,
    from: &DateTime<Tz>,
) -> Option<DateTime<Tz>> {
    let (hour, minute) = parse_hhmm(time)?;
    let today = from.date_naive();

    // Today's candidate first.
    if let Some(candidate) = resolve_local(&from.timezone(), today, hour, minute) {
        let day_ok = matches_day(days_csv, candidate.weekday());
        if candidate > *from && day_ok {
            return Some(candidate);
        }
    }

    // Scan forward up to the horizon for the first allowed day whose
    // candidate lies in the future.
    for offset in 1..=DAY_SCAN_HORIZON {
        let date = today.checked_add_days(Days::new(offset))?;
        let Some(candidate) = resolve_local(&from.timezone(), date, hour, minute) else {
            continue;
        };
        if candidate <= *from {
            continue;
        }
        if matches_day(days_csv, candidate.weekday()) {
            return Some(candidate);
        }
    }
    None
}

/// Resolve a wall-clock time on a date in `tz`. A time that does not exist
/// on that date (DST gap) yields `None` and the day is skipped.
fn resolve_local<Tz: TimeZone>(
    tz: &Tz,
    date: NaiveDate,
    hour: u32,
    minute: u32,
) -> Option<DateTime<Tz>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    tz.from_local_datetime(&naive).earliest()
}

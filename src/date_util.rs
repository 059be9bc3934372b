use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use crate::error::{Error, Result};

/// Source of "now" for report generation. Injected so tests can pin the
/// hour bucket and the phrasing variant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Parse an IANA timezone name. `None` or an empty string means UTC.
pub fn parse_timezone(name: Option<&str>) -> Result<Tz> {
    match name.map(str::trim) {
        None | Some("") => Ok(Tz::UTC),
        Some(name) => name
            .parse::<Tz>()
            .map_err(|_| Error::Validation(format!("unknown timezone: {name}"))),
    }
}

/// The caller's local calendar date and hour for an instant.
pub fn local_date_hour(now: DateTime<Utc>, tz: Tz) -> (NaiveDate, u32) {
    let local = now.with_timezone(&tz);
    (local.date_naive(), local.hour())
}

/// Inclusive range of the `days` days ending on `end`.
pub fn trailing_window(end: NaiveDate, days: i64) -> (NaiveDate, NaiveDate) {
    (end - Duration::days(days - 1), end)
}

/// Short weekday label used on chart points.
pub fn weekday_label(d: NaiveDate) -> &'static str {
    match d.weekday() {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

/// Strip markdown code fences from LLM responses.
pub fn strip_code_fences(s: &str) -> &str {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        rest.strip_suffix("```").unwrap_or(rest).trim()
    } else if let Some(rest) = s.strip_prefix("```") {
        rest.strip_suffix("```").unwrap_or(rest).trim()
    } else {
        s
    }
}

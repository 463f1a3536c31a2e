//! Fire-time computation for timer-driven jobs
//!
//! Two notations are accepted:
//! - five-field cron patterns (`minute hour day-of-month month day-of-week`)
//!   with `*`, lists, ranges and `*/n` steps
//! - cadences: `every 5 minutes`, `every hour`, `hourly`, `daily`,
//!   `every day at 09:30`
//!
//! All times are UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use std::collections::BTreeSet;
use thiserror::Error;

/// Days searched for a cron match before giving up (covers leap-day patterns)
const CRON_SEARCH_DAYS: u32 = 366 * 8;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("invalid cron pattern '{pattern}': {reason}")]
    InvalidCron { pattern: String, reason: String },

    #[error("invalid cadence '{0}'")]
    InvalidCadence(String),

    #[error("invalid delay '{0}'")]
    InvalidDelay(String),
}

/// When a timer job fires
#[derive(Debug, Clone, PartialEq)]
pub enum Timing {
    Cron(CronSchedule),
    Interval(Duration),
    DailyAt(NaiveTime),
}

impl Timing {
    pub fn cron(pattern: &str) -> Result<Self, ScheduleError> {
        CronSchedule::parse(pattern).map(Timing::Cron)
    }

    pub fn cadence(text: &str) -> Result<Self, ScheduleError> {
        parse_cadence(text)
    }

    /// First fire time strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Timing::Cron(cron) => cron.next_after(now),
            Timing::Interval(interval) => now.checked_add_signed(*interval),
            Timing::DailyAt(at) => {
                let today = now.date_naive().and_time(*at).and_utc();
                if today > now {
                    Some(today)
                } else {
                    today.checked_add_signed(Duration::days(1))
                }
            }
        }
    }
}

/* ===================== Cron ===================== */

#[derive(Debug, Clone, PartialEq)]
pub struct CronSchedule {
    minutes: BTreeSet<u32>,
    hours: BTreeSet<u32>,
    days_of_month: BTreeSet<u32>,
    months: BTreeSet<u32>,
    /// 0 = Sunday
    days_of_week: BTreeSet<u32>,
    any_day_of_month: bool,
    any_day_of_week: bool,
}

impl CronSchedule {
    pub fn parse(pattern: &str) -> Result<Self, ScheduleError> {
        let invalid = |reason: String| ScheduleError::InvalidCron {
            pattern: pattern.to_string(),
            reason,
        };

        let fields: Vec<&str> = pattern.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(invalid(format!("expected 5 fields, got {}", fields.len())));
        }

        let minutes = parse_field(fields[0], 0, 59).map_err(&invalid)?;
        let hours = parse_field(fields[1], 0, 23).map_err(&invalid)?;
        let days_of_month = parse_field(fields[2], 1, 31).map_err(&invalid)?;
        let months = parse_field(fields[3], 1, 12).map_err(&invalid)?;
        // 7 is an alias for Sunday
        let days_of_week = parse_field(fields[4], 0, 7)
            .map_err(&invalid)?
            .into_iter()
            .map(|d| d % 7)
            .collect();

        Ok(Self {
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            any_day_of_month: fields[2] == "*",
            any_day_of_week: fields[4] == "*",
        })
    }

    /// First matching minute strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after
            .with_second(0)?
            .with_nanosecond(0)?
            .checked_add_signed(Duration::minutes(1))?;
        let mut date = start.date_naive();

        for day in 0..CRON_SEARCH_DAYS {
            if self.day_matches(date) {
                let (from_hour, from_minute) = if day == 0 {
                    (start.hour(), start.minute())
                } else {
                    (0, 0)
                };
                for &hour in self.hours.range(from_hour..) {
                    let first = if hour == from_hour { from_minute } else { 0 };
                    if let Some(&minute) = self.minutes.range(first..).next() {
                        return Some(date.and_hms_opt(hour, minute, 0)?.and_utc());
                    }
                }
            }
            date = date.succ_opt()?;
        }
        None
    }

    /// Day-of-month and day-of-week are OR-ed when both are restricted
    fn day_matches(&self, date: NaiveDate) -> bool {
        if !self.months.contains(&date.month()) {
            return false;
        }
        let dom = self.days_of_month.contains(&date.day());
        let dow = self
            .days_of_week
            .contains(&date.weekday().num_days_from_sunday());
        match (self.any_day_of_month, self.any_day_of_week) {
            (true, true) => true,
            (true, false) => dow,
            (false, true) => dom,
            (false, false) => dom || dow,
        }
    }
}

fn parse_field(field: &str, min: u32, max: u32) -> Result<BTreeSet<u32>, String> {
    let mut values = BTreeSet::new();
    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid step '{}'", step))?;
                if step == 0 {
                    return Err("step must be positive".to_string());
                }
                (range, step)
            }
            None => (part, 1),
        };

        let (start, end) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_value(a, min, max)?, parse_value(b, min, max)?)
        } else {
            let value = parse_value(range, min, max)?;
            // `5/15` means every 15 starting at 5
            if step > 1 {
                (value, max)
            } else {
                (value, value)
            }
        };

        if start > end {
            return Err(format!("range {}-{} is reversed", start, end));
        }
        values.extend((start..=end).step_by(step as usize));
    }
    Ok(values)
}

fn parse_value(text: &str, min: u32, max: u32) -> Result<u32, String> {
    let value: u32 = text
        .parse()
        .map_err(|_| format!("'{}' is not a number", text))?;
    if value < min || value > max {
        return Err(format!("{} is outside {}-{}", value, min, max));
    }
    Ok(value)
}

/* ===================== Cadences ===================== */

fn parse_cadence(text: &str) -> Result<Timing, ScheduleError> {
    let normalized = text.trim().to_ascii_lowercase();
    let words: Vec<&str> = normalized.split_whitespace().collect();
    let invalid = || ScheduleError::InvalidCadence(text.to_string());

    match words.as_slice() {
        ["hourly"] => Ok(Timing::Interval(Duration::hours(1))),
        ["daily"] => Ok(Timing::Interval(Duration::days(1))),
        ["every", "day", "at", time] => NaiveTime::parse_from_str(time, "%H:%M")
            .map(Timing::DailyAt)
            .map_err(|_| invalid()),
        ["every", unit] if is_unit(unit) => span(&format!("1 {}", unit))
            .map(Timing::Interval)
            .ok_or_else(invalid),
        ["every", count, unit] if is_unit(unit) => {
            let count: u64 = count.parse().map_err(|_| invalid())?;
            if count == 0 {
                return Err(invalid());
            }
            span(&format!("{} {}", count, unit))
                .map(Timing::Interval)
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

/// Parse a job delay such as `30 seconds`, `2 minutes` or `1h 30m`; a bare number is seconds
pub fn parse_delay(text: &str) -> Result<std::time::Duration, ScheduleError> {
    let invalid = || ScheduleError::InvalidDelay(text.to_string());
    let normalized = text.trim().to_ascii_lowercase();

    let delay = match normalized.parse::<u64>() {
        Ok(seconds) => Duration::try_seconds(i64::try_from(seconds).map_err(|_| invalid())?)
            .ok_or_else(invalid)?,
        Err(_) => span(&normalized).ok_or_else(invalid)?,
    };
    delay.to_std().map_err(|_| invalid())
}

/// `humantime` span that also fits in a chrono `Duration`
fn span(text: &str) -> Option<Duration> {
    let span = humantime::parse_duration(text).ok()?;
    Duration::from_std(span).ok()
}

/// Unit words only; `humantime` would otherwise glue `every 1 2h` into `12h`
fn is_unit(word: &str) -> bool {
    word.chars().all(|c| c.is_ascii_alphabetic())
}

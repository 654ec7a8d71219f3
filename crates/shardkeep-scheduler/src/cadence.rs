//! When a job fires.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, NaiveTime};

use crate::SchedulerError;

/// Unit of an interval cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalUnit {
    Second,
    Minute,
    Hour,
}

impl IntervalUnit {
    fn seconds(self) -> u64 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 3600,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
        }
    }
}

/// A recurring schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Every `amount` units. The first fire happens immediately.
    Every { amount: u64, unit: IntervalUnit },

    /// Once a day at a local wall-clock time.
    DailyAt(NaiveTime),
}

impl Cadence {
    pub fn every(amount: u64, unit: IntervalUnit) -> Result<Self, SchedulerError> {
        if amount == 0 {
            return Err(SchedulerError::InvalidInterval {
                kind: unit.name(),
                interval: amount,
            });
        }
        Ok(Self::Every { amount, unit })
    }

    pub fn seconds(amount: u64) -> Result<Self, SchedulerError> {
        Self::every(amount, IntervalUnit::Second)
    }

    pub fn minutes(amount: u64) -> Result<Self, SchedulerError> {
        Self::every(amount, IntervalUnit::Minute)
    }

    pub fn hours(amount: u64) -> Result<Self, SchedulerError> {
        Self::every(amount, IntervalUnit::Hour)
    }

    /// Daily at `HH:MM:SS` (or `HH:MM`).
    pub fn daily_at(time: &str) -> Result<Self, SchedulerError> {
        parse_time_of_day(time).map(Self::DailyAt)
    }

    /// Builds a cadence from its stored form: a kind name plus either an
    /// interval or a time of day.
    pub fn from_kind(kind: &str, interval: u64, day_at: &str) -> Result<Self, SchedulerError> {
        match kind {
            "day" => Self::daily_at(day_at),
            other => Self::every(interval, other.parse()?),
        }
    }

    /// The interval period, or `None` for daily cadences.
    pub fn period(&self) -> Option<Duration> {
        match *self {
            Self::Every { amount, unit } => Some(Duration::from_secs(amount.saturating_mul(unit.seconds()))),
            Self::DailyAt(_) => None,
        }
    }

    /// Time left until the next daily fire, measured on the local clock.
    pub fn until_next_daily(at: NaiveTime) -> Duration {
        until_next(Local::now().naive_local(), at)
    }
}

impl FromStr for IntervalUnit {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "second" => Ok(Self::Second),
            "minute" => Ok(Self::Minute),
            "hour" => Ok(Self::Hour),
            other => Err(SchedulerError::UnknownCadence(other.to_owned())),
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Every { amount, unit } => write!(f, "every {amount} {}(s)", unit.name()),
            Self::DailyAt(at) => write!(f, "daily at {}", at.format("%H:%M:%S")),
        }
    }
}

/// Parses `HH:MM:SS` or `HH:MM`.
pub fn parse_time_of_day(text: &str) -> Result<NaiveTime, SchedulerError> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map_err(|_| SchedulerError::InvalidTime(text.to_owned()))
}

/// Duration from `now` until the next occurrence of `at`.
///
/// A time equal to `now` counts as already passed, so the result is always
/// positive and at most one day.
pub fn until_next(now: NaiveDateTime, at: NaiveTime) -> Duration {
    let today = now.date().and_time(at);
    let next = if today > now {
        today
    } else {
        today + chrono::TimeDelta::days(1)
    };
    (next - now).to_std().unwrap_or(Duration::from_secs(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_from_kind() {
        assert_eq!(
            Cadence::from_kind("minute", 5, "").unwrap().period(),
            Some(Duration::from_secs(300))
        );
        assert_eq!(
            Cadence::from_kind("hour", 6, "").unwrap().period(),
            Some(Duration::from_secs(21_600))
        );
        assert!(matches!(
            Cadence::from_kind("day", 0, "06:30:00").unwrap(),
            Cadence::DailyAt(_)
        ));
    }

    #[test]
    fn test_unknown_kind_and_bad_values() {
        assert_eq!(
            Cadence::from_kind("week", 1, ""),
            Err(SchedulerError::UnknownCadence("week".into()))
        );
        assert!(matches!(
            Cadence::seconds(0),
            Err(SchedulerError::InvalidInterval { kind: "second", .. })
        ));
        assert!(matches!(
            Cadence::daily_at("25:00:00"),
            Err(SchedulerError::InvalidTime(_))
        ));
        assert!(Cadence::daily_at("noon").is_err());
    }

    #[test]
    fn test_short_time_form() {
        assert_eq!(parse_time_of_day("07:05").unwrap(), NaiveTime::from_hms_opt(7, 5, 0).unwrap());
    }

    #[test]
    fn test_until_next_later_today() {
        let t = NaiveTime::from_hms_opt(6, 30, 0).unwrap();
        assert_eq!(until_next(at(6, 0, 0), t), Duration::from_secs(1800));
    }

    #[test]
    fn test_until_next_rolls_to_tomorrow() {
        let t = NaiveTime::from_hms_opt(6, 0, 0).unwrap();
        assert_eq!(until_next(at(6, 0, 0), t), Duration::from_secs(86_400));
        assert_eq!(until_next(at(23, 0, 0), t), Duration::from_secs(7 * 3600));
    }

    #[test]
    fn test_display() {
        assert_eq!(Cadence::minutes(3).unwrap().to_string(), "every 3 minute(s)");
        assert_eq!(Cadence::daily_at("05:16:27").unwrap().to_string(), "daily at 05:16:27");
    }
}

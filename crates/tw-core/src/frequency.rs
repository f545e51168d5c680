use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A calendar period used for scheduling checks, logging, and renewal.
///
/// Every frequency is a whole number of hourly ticks, but month and year
/// lengths vary, so boundaries are detected on the calendar rather than by
/// counting ticks.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Every tick.
    Hourly,
    /// Calendar days.
    Daily,
    /// ISO weeks, Monday through Sunday.
    Weekly,
    /// Calendar months.
    Monthly,
    /// Calendar years.
    #[default]
    Yearly,
}

impl Frequency {
    /// All frequencies from finest to coarsest.
    pub const ALL: [Frequency; 5] = [
        Frequency::Hourly,
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::Yearly,
    ];

    /// True on the first hour of a period (00:00 of a day, Monday, the 1st, Jan 1).
    pub fn is_period_start(self, at: NaiveDateTime) -> bool {
        let midnight = at.hour() == 0;
        match self {
            Self::Hourly => true,
            Self::Daily => midnight,
            Self::Weekly => midnight && at.weekday() == Weekday::Mon,
            Self::Monthly => midnight && at.day() == 1,
            Self::Yearly => midnight && at.day() == 1 && at.month() == 1,
        }
    }

    /// True on the last hour of a period (23:00 of a day, Sunday, month end, Dec 31).
    pub fn is_period_end(self, at: NaiveDateTime) -> bool {
        let last_hour = at.hour() == 23;
        match self {
            Self::Hourly => true,
            Self::Daily => last_hour,
            Self::Weekly => last_hour && at.weekday() == Weekday::Sun,
            Self::Monthly => last_hour && is_last_day_of_month(at),
            Self::Yearly => last_hour && at.month() == 12 && at.day() == 31,
        }
    }

    /// A monotonically increasing index of the period containing `at`.
    ///
    /// Two timestamps share an index exactly when they fall in the same
    /// period, and consecutive periods differ by one.
    pub fn period_index(self, at: NaiveDateTime) -> i64 {
        let days = i64::from(at.date().num_days_from_ce());
        match self {
            Self::Hourly => at.and_utc().timestamp().div_euclid(3600),
            Self::Daily => days,
            // Day 1 of the proleptic Gregorian calendar is a Monday.
            Self::Weekly => (days - 1).div_euclid(7),
            Self::Monthly => i64::from(at.year()) * 12 + i64::from(at.month0()),
            Self::Yearly => i64::from(at.year()),
        }
    }

    /// Lowercase label used in configuration files.
    pub fn label(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

fn is_last_day_of_month(at: NaiveDateTime) -> bool {
    at.date().succ_opt().is_none_or(|next| next.day() == 1)
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Frequency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.label() == lower)
            .ok_or(CoreError::UnknownFrequency(s.to_string()))
    }
}

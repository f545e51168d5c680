use chrono::{Datelike, NaiveDateTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};

use crate::frequency::Frequency;
use crate::rng::SimRng;

/// Tracks simulation time: a monotonic tick counter and a calendar timestamp.
///
/// One tick is one hour. Dates use the proleptic Gregorian calendar, so
/// month lengths and leap years are exact. The clock also owns the run's
/// random generator, which keeps "what time is it" and "what comes next from
/// the dice" in one serializable value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimClock {
    now: NaiveDateTime,
    ticks: u64,
    rng: SimRng,
}

impl SimClock {
    /// Create a clock at tick 0 with a freshly seeded generator.
    pub fn new(start: NaiveDateTime, seed: u64) -> Self {
        Self {
            now: start,
            ticks: 0,
            rng: SimRng::from_seed(seed),
        }
    }

    /// Advance the clock by one tick (one hour). Returns the new timestamp.
    pub fn advance(&mut self) -> NaiveDateTime {
        self.now += TimeDelta::hours(1);
        self.ticks += 1;
        self.now
    }

    /// Current simulated timestamp.
    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Number of ticks elapsed since the run started.
    pub fn tick(&self) -> u64 {
        self.ticks
    }

    /// The run's random generator.
    pub fn rng(&self) -> &SimRng {
        &self.rng
    }

    /// Mutable access to the run's random generator.
    pub fn rng_mut(&mut self) -> &mut SimRng {
        &mut self.rng
    }

    /// Calendar year; also the modifier "period".
    pub fn year(&self) -> i32 {
        self.now.year()
    }

    /// Calendar month, 1-based.
    pub fn month(&self) -> u32 {
        self.now.month()
    }

    /// Day of the month, 1-based.
    pub fn day(&self) -> u32 {
        self.now.day()
    }

    /// Hour of the day, 0 to 23.
    pub fn hour(&self) -> u32 {
        self.now.hour()
    }

    /// True on the first hour of a day.
    pub fn is_new_day(&self) -> bool {
        Frequency::Daily.is_period_start(self.now)
    }

    /// True on the first hour of a week (Monday).
    pub fn is_new_week(&self) -> bool {
        Frequency::Weekly.is_period_start(self.now)
    }

    /// True on the first hour of a month.
    pub fn is_new_month(&self) -> bool {
        Frequency::Monthly.is_period_start(self.now)
    }

    /// True on the first hour of a year.
    pub fn is_new_year(&self) -> bool {
        Frequency::Yearly.is_period_start(self.now)
    }
}

//! Business-time arithmetic
//!
//! The analyzer only ever asks a [`Calendar`] how much countable time lies
//! between two instants. Durations are kept as whole milliseconds so that
//! splitting a span at an interior instant never produces more time than the
//! span itself.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// An additive, non-negative amount of business time
///
/// Serialized as fractional hours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BusinessDuration(i64);

impl BusinessDuration {
    /// The empty duration
    pub const ZERO: BusinessDuration = BusinessDuration(0);

    /// Build from a chrono duration, clamping negative spans to zero
    pub fn from_duration(duration: Duration) -> Self {
        Self(duration.num_milliseconds().max(0))
    }

    /// Build from whole milliseconds, clamping negative values to zero
    pub fn from_millis(millis: i64) -> Self {
        Self(millis.max(0))
    }

    /// Build from fractional hours, clamping negative values to zero
    pub fn from_hours(hours: f64) -> Self {
        if hours.is_finite() && hours > 0.0 {
            Self((hours * MILLIS_PER_HOUR).round() as i64)
        } else {
            Self::ZERO
        }
    }

    /// Whole milliseconds
    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Fractional hours
    pub fn as_hours(&self) -> f64 {
        self.0 as f64 / MILLIS_PER_HOUR
    }

    /// Whether no time is counted
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Hours rounded to two decimals, without trailing zeros
    pub fn to_hours_string(&self) -> String {
        let rounded = format!("{:.2}", self.as_hours());
        let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
        if trimmed.is_empty() {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

impl Serialize for BusinessDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_hours())
    }
}

impl<'de> Deserialize<'de> for BusinessDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hours = f64::deserialize(deserializer)?;
        Ok(BusinessDuration::from_hours(hours))
    }
}

impl Add for BusinessDuration {
    type Output = BusinessDuration;

    fn add(self, rhs: Self) -> Self::Output {
        BusinessDuration(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for BusinessDuration {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sum for BusinessDuration {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(BusinessDuration::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a BusinessDuration> for BusinessDuration {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

impl fmt::Display for BusinessDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h", self.to_hours_string())
    }
}

/// Measures countable time between two instants
///
/// Implementations must be additive: for `a <= b <= c`,
/// `duration(a, b) + duration(b, c) <= duration(a, c)`, and must return
/// [`BusinessDuration::ZERO`] when `end <= start`.
pub trait Calendar: Send + Sync {
    /// Countable time in `[start, end)`
    fn duration(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> BusinessDuration;
}

/// Counts every wall-clock millisecond
#[derive(Debug, Clone, Copy, Default)]
pub struct ElapsedCalendar;

impl Calendar for ElapsedCalendar {
    fn duration(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> BusinessDuration {
        BusinessDuration::from_duration(end - start)
    }
}

/// Counts only the configured daily working window on weekdays that are not holidays
#[derive(Debug, Clone)]
pub struct WorkingHoursCalendar {
    start_hour: u32,
    end_hour: u32,
    offset: FixedOffset,
    holidays: BTreeSet<NaiveDate>,
}

impl WorkingHoursCalendar {
    /// Create a calendar counting `[start_hour, end_hour)` local time
    ///
    /// Returns `None` when the window is empty, extends past midnight, or the
    /// offset is out of range.
    pub fn new(start_hour: u32, end_hour: u32, utc_offset_minutes: i32) -> Option<Self> {
        if start_hour >= end_hour || end_hour > 24 {
            return None;
        }
        let offset = FixedOffset::east_opt(utc_offset_minutes.checked_mul(60)?)?;
        Some(Self {
            start_hour,
            end_hour,
            offset,
            holidays: BTreeSet::new(),
        })
    }

    /// Exclude the given local dates entirely
    pub fn with_holidays<I>(mut self, holidays: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        self.holidays.extend(holidays);
        self
    }

    /// Whether `date` contributes any working time
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    fn window(&self, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let midnight = date
            .and_hms_opt(0, 0, 0)?
            .and_local_timezone(self.offset)
            .single()?;
        let open = midnight + Duration::hours(i64::from(self.start_hour));
        let close = midnight + Duration::hours(i64::from(self.end_hour));
        Some((open.with_timezone(&Utc), close.with_timezone(&Utc)))
    }
}

impl Calendar for WorkingHoursCalendar {
    fn duration(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> BusinessDuration {
        if end <= start {
            return BusinessDuration::ZERO;
        }

        let last_day = end.with_timezone(&self.offset).date_naive();
        let mut day = start.with_timezone(&self.offset).date_naive();
        let mut total = Duration::zero();

        while day <= last_day {
            if self.is_working_day(day) {
                if let Some((open, close)) = self.window(day) {
                    let from = start.max(open);
                    let to = end.min(close);
                    if to > from {
                        total = total + (to - from);
                    }
                }
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }

        BusinessDuration::from_duration(total)
    }
}

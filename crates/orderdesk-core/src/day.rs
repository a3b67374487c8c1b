//! Canonical calendar days.
//!
//! The one-order-per-day invariant is keyed by a calendar day string. Every
//! component that produces or compares days must agree on the time zone and
//! the format, otherwise an order created late in the evening lands on
//! "tomorrow" for one component and "today" for another.
//!
//! [`DayClock`] is the single place that turns instants into [`CalendarDay`]
//! values. The existence probe and the fallback scanner share one clock.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Format of a canonical day (`YYYY-MM-DD`).
pub const CANONICAL_DAY_FORMAT: &str = "%Y-%m-%d";

/// A calendar day in canonical `YYYY-MM-DD` form.
///
/// Days compare as strings; construction guarantees the canonical format so
/// string equality is date equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CalendarDay(String);

impl CalendarDay {
    /// Creates a day from a calendar date.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format(CANONICAL_DAY_FORMAT).to_string())
    }

    /// Parses and canonicalizes a `YYYY-MM-DD` string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDay`] if the input is not a valid date.
    pub fn parse(value: &str) -> Result<Self> {
        NaiveDate::parse_from_str(value.trim(), CANONICAL_DAY_FORMAT)
            .map(Self::from_date)
            .map_err(|_| Error::InvalidDay {
                value: value.to_string(),
            })
    }

    /// Returns the canonical string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CalendarDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for CalendarDay {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CalendarDay {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<CalendarDay> for String {
    fn from(day: CalendarDay) -> Self {
        day.0
    }
}

/// Converts instants into canonical days in one configured time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayClock {
    tz: Tz,
}

impl DayClock {
    /// Creates a clock for the given time zone.
    #[must_use]
    pub const fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Creates a UTC clock.
    #[must_use]
    pub const fn utc() -> Self {
        Self::new(Tz::UTC)
    }

    /// Creates a clock from an IANA time zone name (e.g. `America/Lima`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTimezone`] if the name is unknown.
    pub fn from_name(name: &str) -> Result<Self> {
        name.trim()
            .parse::<Tz>()
            .map(Self::new)
            .map_err(|e| Error::InvalidTimezone {
                name: name.to_string(),
                message: e.to_string(),
            })
    }

    /// Returns the configured time zone.
    #[must_use]
    pub const fn timezone(&self) -> Tz {
        self.tz
    }

    /// Returns the canonical day an instant falls on in this clock's zone.
    #[must_use]
    pub fn day_of(&self, instant: DateTime<Utc>) -> CalendarDay {
        CalendarDay::from_date(instant.with_timezone(&self.tz).date_naive())
    }

    /// Returns the current canonical day.
    #[must_use]
    pub fn today(&self) -> CalendarDay {
        self.day_of(Utc::now())
    }
}

impl Default for DayClock {
    fn default() -> Self {
        Self::utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_trims_surrounding_whitespace() {
        let day = CalendarDay::parse(" 2025-01-05 ").unwrap();
        assert_eq!(day.as_str(), "2025-01-05");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(CalendarDay::parse("15/01/2025").is_err());
        assert!(CalendarDay::parse("2025-02-30").is_err());
    }

    #[test]
    fn late_evening_local_is_next_day_in_utc() {
        // 23:30 in Lima (UTC-5) is 04:30 UTC on the following day.
        let instant = Utc.with_ymd_and_hms(2025, 1, 16, 4, 30, 0).unwrap();
        let lima = DayClock::from_name("America/Lima").unwrap();

        assert_eq!(lima.day_of(instant).as_str(), "2025-01-15");
        assert_eq!(DayClock::utc().day_of(instant).as_str(), "2025-01-16");
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let err = DayClock::from_name("Mars/Olympus").unwrap_err();
        assert!(matches!(err, Error::InvalidTimezone { .. }));
    }

    #[test]
    fn day_serializes_as_string() {
        let day = CalendarDay::parse("2025-01-15").unwrap();
        assert_eq!(serde_json::to_string(&day).unwrap(), "\"2025-01-15\"");
        let back: CalendarDay = serde_json::from_str("\"2025-01-15\"").unwrap();
        assert_eq!(back, day);
        assert!(serde_json::from_str::<CalendarDay>("\"yesterday\"").is_err());
    }
}

//! Timestamps in the canonical form they are stored in, and the half-open date
//! windows that expenses are filtered and aggregated over.
//!
//! Expense dates are stored as text like `2025-01-10T12:00:00Z`. Range queries
//! compare that text directly, which only gives chronological results because
//! every stored value is UTC, zero-padded and has the same precision. All
//! dates therefore go through [Timestamp] on their way into the database.

use std::{fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::{
    Date, Duration, Month, OffsetDateTime, UtcOffset,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};

use crate::Error;

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// A UTC instant with second precision.
///
/// Displays (and is stored) as `YYYY-MM-DDTHH:MM:SSZ`. Parsing accepts any
/// RFC 3339 date-time and normalizes it to UTC, dropping sub-second digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Create a timestamp from any offset date-time.
    ///
    /// # Errors
    /// Returns [Error::InvalidDateTime] if the UTC year is outside 0000-9999,
    /// since those years cannot be written in the fixed-width format.
    pub fn new(date_time: OffsetDateTime) -> Result<Self, Error> {
        let utc = date_time.to_offset(UtcOffset::UTC);

        if !(0..=9999).contains(&utc.year()) {
            return Err(Error::InvalidDateTime(format!(
                "year {} is out of range",
                utc.year()
            )));
        }

        Ok(Self(truncate_to_second(utc)))
    }

    /// The current instant.
    pub fn now() -> Self {
        Self(truncate_to_second(OffsetDateTime::now_utc()))
    }

    /// Midnight UTC at the start of `date`.
    ///
    /// # Errors
    /// Returns [Error::InvalidDateTime] if the year is out of range.
    pub fn from_date(date: Date) -> Result<Self, Error> {
        Self::new(date.midnight().assume_utc())
    }

    /// The timestamp as a `time` date-time in UTC.
    pub fn as_offset_date_time(&self) -> OffsetDateTime {
        self.0
    }
}

fn truncate_to_second(date_time: OffsetDateTime) -> OffsetDateTime {
    date_time - Duration::nanoseconds(i64::from(date_time.nanosecond()))
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = self
            .0
            .format(TIMESTAMP_FORMAT)
            .map_err(|_| std::fmt::Error)?;

        f.write_str(&text)
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let date_time = OffsetDateTime::parse(s.trim(), &Rfc3339)
            .map_err(|error| Error::InvalidDateTime(format!("\"{s}\": {error}")))?;

        Timestamp::new(date_time)
    }
}

impl ToSql for Timestamp {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Timestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A half-open interval of time, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: Timestamp,
    end: Timestamp,
}

impl DateRange {
    /// Create a range that includes `start` and excludes `end`.
    ///
    /// # Errors
    /// Returns [Error::InvalidDateRange] if `end` is before `start`.
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self, Error> {
        if end < start {
            return Err(Error::InvalidDateRange);
        }

        Ok(Self { start, end })
    }

    /// The first instant in the range.
    pub fn start(&self) -> Timestamp {
        self.start
    }

    /// The first instant after the range.
    pub fn end(&self) -> Timestamp {
        self.end
    }

    /// Whether `timestamp` falls inside the range.
    pub fn contains(&self, timestamp: &Timestamp) -> bool {
        self.start <= *timestamp && *timestamp < self.end
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// The calendar month (in UTC) that contains `instant`.
///
/// # Errors
/// Returns [Error::InvalidDateTime] if the month lies outside the supported
/// years.
pub fn month_range(instant: OffsetDateTime) -> Result<DateRange, Error> {
    let instant = instant.to_offset(UtcOffset::UTC);
    let (year, month) = (instant.year(), instant.month());

    let (next_year, next_month) = match month {
        Month::December => (year + 1, Month::January),
        month => (year, month.next()),
    };

    DateRange::new(
        first_of_month(year, month)?,
        first_of_month(next_year, next_month)?,
    )
}

/// The calendar month (in UTC) before the one that contains `instant`.
///
/// The month is found from the 15th of the previous month so that stepping
/// back from e.g. the 31st never lands on a day the previous month lacks.
///
/// # Errors
/// Returns [Error::InvalidDateTime] if the month lies outside the supported
/// years.
pub fn previous_month_range(instant: OffsetDateTime) -> Result<DateRange, Error> {
    let instant = instant.to_offset(UtcOffset::UTC);

    let (year, month) = match instant.month() {
        Month::January => (instant.year() - 1, Month::December),
        month => (instant.year(), month.previous()),
    };

    let anchor = Date::from_calendar_date(year, month, 15)
        .map_err(|error| Error::InvalidDateTime(error.to_string()))?;

    month_range(anchor.midnight().assume_utc())
}

fn first_of_month(year: i32, month: Month) -> Result<Timestamp, Error> {
    let date = Date::from_calendar_date(year, month, 1)
        .map_err(|error| Error::InvalidDateTime(error.to_string()))?;

    Timestamp::from_date(date)
}

//! Timestamps for journey planning.
//!
//! Schedules, departures and overlay freshness are all expressed as whole
//! seconds on a single naive timeline (the region's local wall clock). The
//! search only ever adds and compares seconds, so the representation is a
//! plain `i64` with chrono used at the edges for parsing and display.

use std::fmt;
use std::ops::Add;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Wire and display format for timestamps.
const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Error returned when parsing an invalid timestamp string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid timestamp {input:?}: expected YYYY-MM-DDTHH:MM:SS")]
pub struct TimeError {
    input: String,
}

/// A point in time, in seconds since the Unix epoch.
///
/// # Examples
///
/// ```
/// use route_engine::domain::Timestamp;
///
/// let t = Timestamp::parse("2025-01-15T09:00:00").unwrap();
/// assert_eq!(t.to_string(), "2025-01-15T09:00:00");
/// assert_eq!((t + 90).to_string(), "2025-01-15T09:01:30");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a timestamp from seconds since the epoch.
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    /// Parse a timestamp in `YYYY-MM-DDTHH:MM:SS` form.
    pub fn parse(s: &str) -> Result<Self, TimeError> {
        NaiveDateTime::parse_from_str(s, FORMAT)
            .map(Self::from_datetime)
            .map_err(|_| TimeError {
                input: s.to_string(),
            })
    }

    /// Convert from a chrono datetime.
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        Self(dt.and_utc().timestamp())
    }

    /// Returns the seconds since the epoch.
    pub fn as_secs(&self) -> i64 {
        self.0
    }

    /// Converts to a chrono datetime, if representable.
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        chrono::DateTime::from_timestamp(self.0, 0).map(|dt| dt.naive_utc())
    }

    /// Seconds elapsed from `earlier` to `self` (negative if `earlier` is later).
    pub fn secs_since(&self, earlier: Timestamp) -> i64 {
        self.0 - earlier.0
    }
}

impl Add<i64> for Timestamp {
    type Output = Self;

    fn add(self, secs: i64) -> Self::Output {
        Self(self.0.saturating_add(secs))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({self})")
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format(FORMAT)),
            None => write!(f, "@{}", self.0),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Timestamp::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Source of the current time.
///
/// Used for past-departure validation and overlay freshness checks, so tests
/// can pin "now" instead of depending on the wall clock.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp(Utc::now().timestamp())
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

//! Time units for event timestamps.
//!
//! Provides type-safe wrappers for durations and points in time to prevent
//! unit confusion. Both types carry nanosecond resolution in a signed 64-bit
//! representation.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Neg, Sub};

/// A signed duration with nanosecond resolution.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeSpan(pub i64);

/// A point in time, expressed as nanoseconds since the Unix epoch.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeStamp(pub i64);

impl TimeSpan {
    /// Create a duration from nanoseconds.
    pub fn nanoseconds(ns: i64) -> Self {
        Self(ns)
    }

    /// Create a duration from microseconds.
    pub fn microseconds(us: i64) -> Self {
        Self(us * 1_000)
    }

    /// Create a duration from milliseconds.
    pub fn milliseconds(ms: i64) -> Self {
        Self(ms * 1_000_000)
    }

    /// Create a duration from seconds.
    pub fn seconds(s: i64) -> Self {
        Self(s * 1_000_000_000)
    }

    /// Create a duration from fractional seconds.
    pub fn fractional(s: f64) -> Self {
        Self((s * 1e9) as i64)
    }

    /// Create a duration from minutes.
    pub fn minutes(m: i64) -> Self {
        Self::seconds(m * 60)
    }

    /// Create a duration from hours.
    pub fn hours(h: i64) -> Self {
        Self::seconds(h * 3600)
    }

    /// Get the raw nanosecond value.
    pub fn get(self) -> i64 {
        self.0
    }

    /// The whole number of seconds in this duration.
    pub fn as_seconds(self) -> i64 {
        self.0 / 1_000_000_000
    }

    /// Add two durations with saturation at the numeric bounds.
    pub fn saturating_add(self, other: Self) -> Self {
        TimeSpan(self.0.saturating_add(other.0))
    }

    /// Subtract two durations with saturation at the numeric bounds.
    pub fn saturating_sub(self, other: Self) -> Self {
        TimeSpan(self.0.saturating_sub(other.0))
    }

    /// Checked addition. Returns None if overflow occurred.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(TimeSpan)
    }

    /// Checked subtraction. Returns None if overflow occurred.
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(TimeSpan)
    }
}

impl TimeStamp {
    /// Create a timestamp from nanoseconds since the Unix epoch.
    pub fn new(ns: i64) -> Self {
        Self(ns)
    }

    /// Get the current time.
    pub fn now() -> Self {
        let elapsed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time must be after UNIX_EPOCH");
        Self(elapsed.as_nanos() as i64)
    }

    /// Get the raw nanosecond value.
    pub fn get(self) -> i64 {
        self.0
    }

    /// The duration since the Unix epoch.
    pub fn since_epoch(self) -> TimeSpan {
        TimeSpan(self.0)
    }
}

impl From<TimeSpan> for TimeStamp {
    fn from(span: TimeSpan) -> Self {
        TimeStamp(span.0)
    }
}

impl Add for TimeSpan {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        TimeSpan(self.0 + other.0)
    }
}

impl Sub for TimeSpan {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        TimeSpan(self.0 - other.0)
    }
}

impl Neg for TimeSpan {
    type Output = Self;

    fn neg(self) -> Self {
        TimeSpan(-self.0)
    }
}

impl Add<TimeSpan> for TimeStamp {
    type Output = Self;

    fn add(self, span: TimeSpan) -> Self {
        TimeStamp(self.0 + span.0)
    }
}

impl Sub<TimeSpan> for TimeStamp {
    type Output = Self;

    fn sub(self, span: TimeSpan) -> Self {
        TimeStamp(self.0 - span.0)
    }
}

impl Sub for TimeStamp {
    type Output = TimeSpan;

    fn sub(self, other: Self) -> TimeSpan {
        TimeSpan(self.0 - other.0)
    }
}

impl std::fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

impl std::fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

//! Timestamps and reporting windows

use crate::error::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const NANOS_PER_MINUTE: f64 = 60_000_000_000.0;

/// Timestamp representing a point in time with nanosecond precision.
///
/// Serialized as an RFC 3339 string so store dumps stay human readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    /// Nanoseconds since Unix epoch
    nanos: i64,
}

impl Timestamp {
    /// Create a timestamp from nanoseconds since Unix epoch
    pub fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    /// Create a timestamp from milliseconds since Unix epoch
    pub fn from_millis(millis: i64) -> Self {
        Self {
            nanos: millis * 1_000_000,
        }
    }

    /// Create a timestamp from seconds since Unix epoch
    pub fn from_secs(secs: i64) -> Self {
        Self {
            nanos: secs * 1_000_000_000,
        }
    }

    /// Parse an RFC 3339 timestamp. A missing offset is read as UTC.
    ///
    /// Instants outside the nanosecond range (about 1677 to 2262) are rejected.
    pub fn parse(text: &str) -> Result<Self> {
        let dt = match DateTime::parse_from_rfc3339(text) {
            Ok(dt) => dt.with_timezone(&Utc),
            Err(_) => chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .map_err(|e| Error::Temporal(format!("invalid timestamp '{}': {}", text, e)))?
                .and_utc(),
        };
        Self::try_from(dt)
    }

    /// Get nanoseconds since Unix epoch
    pub fn as_nanos(&self) -> i64 {
        self.nanos
    }

    /// Get seconds since Unix epoch
    pub fn as_secs(&self) -> i64 {
        self.nanos.div_euclid(1_000_000_000)
    }

    /// Convert to chrono DateTime
    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.as_secs(), self.nanos.rem_euclid(1_000_000_000) as u32)
            .unwrap_or_default()
    }

    /// Add duration in nanoseconds
    pub fn add_nanos(&self, nanos: i64) -> Self {
        Self {
            nanos: self.nanos + nanos,
        }
    }

    /// Add duration in minutes
    pub fn add_minutes(&self, minutes: i64) -> Self {
        self.add_nanos(minutes * 60_000_000_000)
    }

    /// Signed distance `self - earlier` in minutes.
    pub fn minutes_since(&self, earlier: Timestamp) -> f64 {
        (self.nanos - earlier.nanos) as f64 / NANOS_PER_MINUTE
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.to_datetime().to_rfc3339_opts(SecondsFormat::AutoSi, true)
        )
    }
}

impl TryFrom<DateTime<Utc>> for Timestamp {
    type Error = Error;

    fn try_from(dt: DateTime<Utc>) -> Result<Self> {
        dt.timestamp_nanos_opt()
            .map(Self::from_nanos)
            .ok_or_else(|| Error::Temporal(format!("timestamp {} is out of range", dt)))
    }
}

impl FromStr for Timestamp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Timestamp::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Half-open reporting window `[start, stop)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: Timestamp,
    pub stop: Timestamp,
}

impl TimeWindow {
    /// Create a window, rejecting `stop < start`.
    pub fn new(start: Timestamp, stop: Timestamp) -> Result<Self> {
        if stop < start {
            return Err(Error::Temporal(format!(
                "window stop {} is before start {}",
                stop, start
            )));
        }
        Ok(Self { start, stop })
    }

    /// Check if an interval `[start, stop)` overlaps this window.
    ///
    /// Zero-length intervals count when they fall inside the window, so that
    /// instantaneous events are not lost from a report.
    pub fn overlaps(&self, start: Timestamp, stop: Timestamp) -> bool {
        if start == stop {
            return start >= self.start && start < self.stop;
        }
        start < self.stop && self.start < stop
    }

    /// Check if a timestamp is within this window
    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.start && ts < self.stop
    }
}

/// Round a value to the three decimals used for minute-denominated reporting.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_creation() {
        let ts2 = Timestamp::from_secs(1000);
        assert_eq!(ts2.as_secs(), 1000);
        assert_eq!(ts2, Timestamp::from_millis(1_000_000));
    }

    #[test]
    fn test_parse_and_display() {
        let ts = Timestamp::parse("2018-07-21T08:52:29Z").unwrap();
        assert_eq!(ts.to_string(), "2018-07-21T08:52:29Z");

        let naive = Timestamp::parse("2018-07-21T08:52:29.5").unwrap();
        assert_eq!(naive.as_nanos() - ts.as_nanos(), 500_000_000);

        assert!(Timestamp::parse("yesterday").is_err());
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(
            Timestamp::parse("2300-01-01T00:00:00Z"),
            Err(Error::Temporal(_))
        ));
        assert!(Timestamp::parse("1600-01-01T00:00:00").is_err());
        assert!(serde_json::from_str::<Timestamp>("\"2300-01-01T00:00:00Z\"").is_err());

        let edge = Timestamp::parse("2262-04-11T00:00:00Z").unwrap();
        assert_eq!(edge.to_string(), "2262-04-11T00:00:00Z");
    }

    #[test]
    fn test_serde_as_text() {
        let ts = Timestamp::from_secs(60);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"1970-01-01T00:01:00Z\"");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn test_minutes_since() {
        let a = Timestamp::from_secs(0);
        let b = Timestamp::from_secs(90);
        assert_eq!(b.minutes_since(a), 1.5);
        assert_eq!(a.minutes_since(b), -1.5);
    }

    #[test]
    fn test_time_window() {
        let window = TimeWindow::new(Timestamp::from_secs(1000), Timestamp::from_secs(2000)).unwrap();

        assert!(window.overlaps(Timestamp::from_secs(500), Timestamp::from_secs(1500)));
        assert!(!window.overlaps(Timestamp::from_secs(2000), Timestamp::from_secs(2500)));
        assert!(window.overlaps(Timestamp::from_secs(1000), Timestamp::from_secs(1000)));
        assert!(window.contains(Timestamp::from_secs(1999)));

        assert!(TimeWindow::new(Timestamp::from_secs(2), Timestamp::from_secs(1)).is_err());
    }

    #[test]
    fn test_round3() {
        assert_eq!(round3(1.23456), 1.235);
        assert_eq!(round3(-6.1894), -6.189);
    }
}

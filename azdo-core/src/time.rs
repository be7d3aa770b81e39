//! Timestamps as Azure DevOps sends them.
//!
//! Three shapes are accepted on input: RFC3339, a local form with up to nine
//! fractional digits and no offset (read as UTC), and the zero-date sentinel
//! `0001-01-01T00:00:00`.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The zero date as written by the service.
pub const ZERO_TIME: &str = "0001-01-01T00:00:00";

const LOCAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A timestamp that may be the zero time. `Time(None)` is the zero time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(pub Option<DateTime<Utc>>);

impl Time {
    pub fn zero() -> Self {
        Time(None)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_none()
    }

    pub fn parse(value: &str) -> Result<Self, chrono::ParseError> {
        let value = value.trim();
        if value.is_empty() || value == ZERO_TIME || value.starts_with("0001-01-01T00:00:00") {
            return Ok(Time(None));
        }
        match DateTime::parse_from_rfc3339(value) {
            Ok(dt) => Ok(Time(Some(dt.with_timezone(&Utc)))),
            Err(_) => {
                let naive = NaiveDateTime::parse_from_str(value, LOCAL_FORMAT)?;
                Ok(Time(Some(naive.and_utc())))
            }
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        self.0
    }
}

impl From<DateTime<Utc>> for Time {
    fn from(value: DateTime<Utc>) -> Self {
        Time(Some(value))
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => f.write_str(ZERO_TIME),
        }
    }
}

impl Serialize for Time {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Time {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(Time(None)),
            Some(s) => Time::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_zero_sentinel_decodes_without_error() {
        let t: Time = serde_json::from_str(r#""0001-01-01T00:00:00""#).unwrap();
        assert!(t.is_zero());
        assert_eq!(serde_json::to_string(&t).unwrap(), r#""0001-01-01T00:00:00""#);
    }

    #[test]
    fn test_rfc3339_round_trips() {
        let input = r#""2024-03-01T10:15:30Z""#;
        let t: Time = serde_json::from_str(input).unwrap();
        assert_eq!(serde_json::to_string(&t).unwrap(), input);
    }

    #[test]
    fn test_rfc3339_offset_is_normalized_to_utc() {
        let t = Time::parse("2024-03-01T12:15:30+02:00").unwrap();
        assert_eq!(t.as_datetime().unwrap().hour(), 10);
    }

    #[test]
    fn test_nine_digit_local_form() {
        let t: Time = serde_json::from_str(r#""2021-06-14T08:30:00.123456789""#).unwrap();
        let dt = t.as_datetime().unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2021, 6, 14));
        assert_eq!(dt.nanosecond(), 123_456_789);
    }

    #[test]
    fn test_null_is_zero() {
        let t: Time = serde_json::from_str("null").unwrap();
        assert!(t.is_zero());
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(serde_json::from_str::<Time>(r#""yesterday""#).is_err());
    }
}

//! Absolute-or-relative time expressions
//!
//! Token sub-claims and request options bound certificate validity with a
//! value that is either an RFC 3339 instant or a signed offset from the
//! reference time.

use super::duration::{format_duration, parse_duration};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An instant, an offset from a reference instant, or nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeDuration {
    /// No bound requested
    #[default]
    Zero,
    /// A fixed instant
    Absolute(DateTime<Utc>),
    /// An offset applied to the reference time
    Relative(Duration),
}

impl TimeDuration {
    /// Parse an RFC 3339 timestamp or a Go duration string
    pub fn parse(input: &str) -> Result<Self, String> {
        if input.is_empty() {
            return Ok(Self::Zero);
        }
        if let Ok(t) = DateTime::parse_from_rfc3339(input) {
            return Ok(Self::Absolute(t.with_timezone(&Utc)));
        }
        match parse_duration(input) {
            Ok(d) if d.is_zero() => Ok(Self::Zero),
            Ok(d) => Ok(Self::Relative(d)),
            Err(e) => Err(format!("failed to parse {input:?} as a time or duration: {e}")),
        }
    }

    /// Whether no bound was requested
    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Zero)
    }

    /// Resolve against `base`; `None` when no bound was requested
    pub fn relative_time(&self, base: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Zero => None,
            Self::Absolute(t) => Some(*t),
            Self::Relative(d) => Some(base + *d),
        }
    }
}

impl From<DateTime<Utc>> for TimeDuration {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Absolute(t)
    }
}

impl From<Duration> for TimeDuration {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            Self::Zero
        } else {
            Self::Relative(d)
        }
    }
}

impl Serialize for TimeDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Zero => serializer.serialize_str(""),
            Self::Absolute(t) => serializer.serialize_str(&t.to_rfc3339()),
            Self::Relative(d) => serializer.serialize_str(&format_duration(*d)),
        }
    }
}

impl<'de> Deserialize<'de> for TimeDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(Self::Zero),
            Some(s) => Self::parse(&s).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_relative_offsets() {
        let td = TimeDuration::parse("+5m").unwrap();
        assert_eq!(
            td.relative_time(base()).unwrap(),
            base() + Duration::minutes(5)
        );
        let td = TimeDuration::parse("-1h").unwrap();
        assert_eq!(td.relative_time(base()).unwrap(), base() - Duration::hours(1));
    }

    #[test]
    fn test_absolute_ignores_base() {
        let td = TimeDuration::parse("2030-01-02T03:04:05Z").unwrap();
        let expected = DateTime::parse_from_rfc3339("2030-01-02T03:04:05Z").unwrap();
        assert_eq!(td.relative_time(base()).unwrap(), expected);
    }

    #[test]
    fn test_zero_values() {
        assert!(TimeDuration::parse("").unwrap().is_zero());
        assert!(TimeDuration::parse("0s").unwrap().is_zero());
        assert_eq!(TimeDuration::Zero.relative_time(base()), None);
    }

    #[test]
    fn test_json_forms() {
        let td: TimeDuration = serde_json::from_str("\"10m\"").unwrap();
        assert_eq!(td, TimeDuration::Relative(Duration::minutes(10)));
        let td: TimeDuration = serde_json::from_str("null").unwrap();
        assert!(td.is_zero());
        assert!(serde_json::from_str::<TimeDuration>("\"soon\"").is_err());
    }
}

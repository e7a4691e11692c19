//! Request timeout policy
//!
//! Every outbound request races a timer armed at call time. The limit is
//! either a finite number of milliseconds or `infinite`, which disables the
//! timer entirely and leaves the request pending until a response arrives.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bridge_protocol::DEFAULT_MAX_REQUEST_TIME_MS;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Upper bound for a finite limit: one day.
pub const MAX_FINITE_MS: u64 = 86_400_000;

/// How long a caller waits for a response before the request is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxRequestTime {
    Finite(Duration),
    Infinite,
}

impl Default for MaxRequestTime {
    fn default() -> Self {
        MaxRequestTime::Finite(Duration::from_millis(DEFAULT_MAX_REQUEST_TIME_MS))
    }
}

impl MaxRequestTime {
    pub fn from_millis(ms: u64) -> Self {
        MaxRequestTime::Finite(Duration::from_millis(ms))
    }

    /// The timer duration, or `None` when timeouts are disabled.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            MaxRequestTime::Finite(d) => Some(*d),
            MaxRequestTime::Infinite => None,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, MaxRequestTime::Infinite)
    }

    /// Finite limits must be in (0, 86400000] ms.
    pub fn validate(&self) -> Result<(), TimeoutValidationError> {
        let MaxRequestTime::Finite(d) = self else {
            return Ok(());
        };
        let ms = d.as_millis();
        if ms == 0 {
            return Err(TimeoutValidationError::Zero);
        }
        if ms > u128::from(MAX_FINITE_MS) {
            return Err(TimeoutValidationError::TooLarge {
                value_ms: ms,
                max_ms: MAX_FINITE_MS,
            });
        }
        Ok(())
    }
}

impl fmt::Display for MaxRequestTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxRequestTime::Finite(d) => write!(f, "{}ms", d.as_millis()),
            MaxRequestTime::Infinite => f.write_str("infinite"),
        }
    }
}

impl FromStr for MaxRequestTime {
    type Err = TimeoutValidationError;

    /// Accepts `infinite` or a number of milliseconds (optionally suffixed `ms`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("infinite") {
            return Ok(MaxRequestTime::Infinite);
        }
        let digits = s.strip_suffix("ms").unwrap_or(s);
        let ms: u64 = digits
            .parse()
            .map_err(|_| TimeoutValidationError::Unparseable(s.to_string()))?;
        let limit = MaxRequestTime::from_millis(ms);
        limit.validate()?;
        Ok(limit)
    }
}

impl Serialize for MaxRequestTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MaxRequestTime::Finite(d) => {
                let ms = u64::try_from(d.as_millis()).map_err(|_| {
                    serde::ser::Error::custom(format!("{}ms does not fit in 64 bits", d.as_millis()))
                })?;
                serializer.serialize_u64(ms)
            }
            MaxRequestTime::Infinite => serializer.serialize_str("infinite"),
        }
    }
}

impl<'de> Deserialize<'de> for MaxRequestTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Millis(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => {
                let limit = MaxRequestTime::from_millis(ms);
                limit.validate().map_err(serde::de::Error::custom)?;
                Ok(limit)
            }
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Timeout validation errors
#[derive(Debug, thiserror::Error)]
pub enum TimeoutValidationError {
    #[error("max_request_time must be greater than zero")]
    Zero,

    #[error("max_request_time must be at most {max_ms} ms, got {value_ms}")]
    TooLarge { value_ms: u128, max_ms: u64 },

    #[error("max_request_time must be a number of milliseconds or \"infinite\", got {0:?}")]
    Unparseable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_one_second() {
        assert_eq!(
            MaxRequestTime::default().as_duration(),
            Some(Duration::from_millis(1000))
        );
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!("infinite".parse::<MaxRequestTime>().unwrap(), MaxRequestTime::Infinite);
        assert_eq!("Infinite".parse::<MaxRequestTime>().unwrap(), MaxRequestTime::Infinite);
        assert_eq!("50".parse::<MaxRequestTime>().unwrap(), MaxRequestTime::from_millis(50));
        assert_eq!("250ms".parse::<MaxRequestTime>().unwrap(), MaxRequestTime::from_millis(250));
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(matches!(
            "0".parse::<MaxRequestTime>(),
            Err(TimeoutValidationError::Zero)
        ));
        assert!(matches!(
            "soon".parse::<MaxRequestTime>(),
            Err(TimeoutValidationError::Unparseable(_))
        ));
        assert!(matches!(
            "86400001".parse::<MaxRequestTime>(),
            Err(TimeoutValidationError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_infinite_has_no_timer() {
        assert!(MaxRequestTime::Infinite.as_duration().is_none());
        assert!(MaxRequestTime::Infinite.validate().is_ok());
    }

    #[test]
    fn test_serde_forms() {
        let finite: MaxRequestTime = serde_json::from_value(serde_json::json!(1500)).unwrap();
        assert_eq!(finite, MaxRequestTime::from_millis(1500));

        let infinite: MaxRequestTime = serde_json::from_value(serde_json::json!("infinite")).unwrap();
        assert!(infinite.is_infinite());

        assert_eq!(serde_json::to_value(finite).unwrap(), serde_json::json!(1500));
        assert_eq!(serde_json::to_value(infinite).unwrap(), serde_json::json!("infinite"));

        assert!(serde_json::from_value::<MaxRequestTime>(serde_json::json!(0)).is_err());
    }

    #[test]
    fn test_oversized_duration_fails_to_serialize() {
        let huge = MaxRequestTime::Finite(Duration::MAX);
        let err = serde_json::to_value(huge).unwrap_err();
        assert!(err.to_string().contains("does not fit in 64 bits"));
    }
}

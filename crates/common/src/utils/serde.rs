//! Serialization utilities for decorator settings
//!
//! Settings files express every duration as an integer number of
//! milliseconds. These modules plug into `#[serde(with = "...")]`.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Serde serialization result type
type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

/// Custom serialization module for Duration as milliseconds
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use decorum_common::duration_millis;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Window {
///     #[serde(with = "duration_millis")]
///     wait: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::*;

    /// Serialize a Duration as milliseconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    /// Deserialize milliseconds (u64) into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Optional Duration as milliseconds
///
/// Pair with `#[serde(default)]` so a missing field reads as `None`.
pub mod option_duration_millis {
    use super::*;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        match duration {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for serialization utilities
    //!
    //! Tests cover required and optional millisecond durations, including
    //! missing and null fields.

    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct WindowSettings {
        #[serde(with = "duration_millis")]
        wait: Duration,
        #[serde(default, with = "option_duration_millis")]
        ttl: Option<Duration>,
    }

    /// Validates that durations are written as integer milliseconds.
    ///
    /// Assertions:
    /// - The required field is rendered as `1500`.
    /// - A `None` optional field is rendered as `null`.
    #[test]
    fn test_duration_millis_serialize() {
        let data = WindowSettings { wait: Duration::from_millis(1500), ttl: None };

        let json = serde_json::to_string(&data).expect("Should serialize valid struct");
        assert_eq!(json, r#"{"wait":1500,"ttl":null}"#);
    }

    #[test]
    fn test_duration_millis_deserialize() {
        let json = r#"{"wait":2500,"ttl":60000}"#;
        let data: WindowSettings = serde_json::from_str(json).expect("Should deserialize");

        assert_eq!(data.wait, Duration::from_millis(2500));
        assert_eq!(data.ttl, Some(Duration::from_secs(60)));
    }

    /// Validates that a missing optional duration reads as `None`.
    ///
    /// Assertions:
    /// - Confirms `data.ttl` equals `None` when the field is absent.
    /// - Confirms `data.ttl` equals `None` when the field is `null`.
    #[test]
    fn test_option_duration_missing_or_null() {
        let missing: WindowSettings = serde_json::from_str(r#"{"wait":0}"#).unwrap();
        assert_eq!(missing.wait, Duration::ZERO);
        assert_eq!(missing.ttl, None);

        let null: WindowSettings = serde_json::from_str(r#"{"wait":10,"ttl":null}"#).unwrap();
        assert_eq!(null.ttl, None);
    }

    #[test]
    fn test_duration_millis_deserialize_invalid_json() {
        let invalid_json = r#"{"wait":"soon"}"#;
        let result: Result<WindowSettings, _> = serde_json::from_str(invalid_json);
        assert!(result.is_err());
    }
}

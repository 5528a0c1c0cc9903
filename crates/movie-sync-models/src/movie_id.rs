use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Canonical movie identifier.
///
/// The backend and the UI hand out ids both as JSON numbers and as strings.
/// Every id is coerced into one string form before it is compared or stored,
/// so `123`, `123.0` and `" 123 "` all become `"123"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MovieId(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid movie id: {0}")]
pub struct InvalidMovieId(pub String);

impl MovieId {
    /// Normalize a string id (trimmed, must be non-empty)
    pub fn parse(raw: &str) -> Result<Self, InvalidMovieId> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidMovieId(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Normalize an id taken straight out of a JSON payload.
    ///
    /// Integers and integral floats are accepted, as are non-empty strings.
    /// Anything else (bool, null, objects, arrays, fractional numbers) is rejected.
    pub fn from_json(value: &Value) -> Result<Self, InvalidMovieId> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self(i.to_string()))
                } else if let Some(u) = n.as_u64() {
                    Ok(Self(u.to_string()))
                } else {
                    match n.as_f64() {
                        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
                            Ok(Self(format!("{}", f as i64)))
                        }
                        _ => Err(InvalidMovieId(n.to_string())),
                    }
                }
            }
            other => Err(InvalidMovieId(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for MovieId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MovieId {
    type Err = InvalidMovieId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for MovieId {
    type Error = InvalidMovieId;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<String> for MovieId {
    type Error = InvalidMovieId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<u64> for MovieId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<u32> for MovieId {
    fn from(value: u32) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for MovieId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl PartialEq<str> for MovieId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.trim()
    }
}

impl PartialEq<&str> for MovieId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.trim()
    }
}

impl<'de> Deserialize<'de> for MovieId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        MovieId::from_json(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_and_string_ids_match() {
        let from_number = MovieId::from_json(&json!(123)).unwrap();
        let from_string = MovieId::from_json(&json!("123")).unwrap();
        assert_eq!(from_number, from_string);
        assert_eq!(from_number, "123");
    }

    #[test]
    fn test_integral_float_is_normalized() {
        let id = MovieId::from_json(&json!(550.0)).unwrap();
        assert_eq!(id.as_str(), "550");
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        assert_eq!(MovieId::parse("  42 ").unwrap(), MovieId::from(42u64));
    }

    #[test]
    fn test_invalid_ids_are_rejected() {
        assert!(MovieId::parse("   ").is_err());
        assert!(MovieId::from_json(&json!(1.5)).is_err());
        assert!(MovieId::from_json(&json!(null)).is_err());
        assert!(MovieId::from_json(&json!(true)).is_err());
        assert!(MovieId::from_json(&json!({"id": 1})).is_err());
    }

    #[test]
    fn test_deserialize_from_number_serializes_as_string() {
        let id: MovieId = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("42"));
    }
}

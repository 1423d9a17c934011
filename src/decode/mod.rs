//! Flexible Value Decoding
//!
//! The analytics API serializes the same logical value in several shapes.
//! [`FlexibleInt`] accepts `null`, JSON integers, integral floats and numeric
//! strings. [`FlexibleTimestamp`] accepts RFC 3339 strings and unix epoch
//! numbers whose unit is inferred from magnitude.

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::error::DecodeError;

/// Epoch values with a magnitude above this are milliseconds, otherwise seconds.
pub const EPOCH_MILLIS_THRESHOLD: u64 = 1_000_000_000_000;

/// Integer KPI value tolerant of wire representation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlexibleInt(pub i64);

impl FlexibleInt {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for FlexibleInt {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<FlexibleInt> for i64 {
    fn from(value: FlexibleInt) -> Self {
        value.0
    }
}

fn int_from_f64(v: f64) -> Result<i64, DecodeError> {
    if !v.is_finite() || v.fract() != 0.0 {
        return Err(DecodeError::NonIntegral {
            value: v.to_string(),
        });
    }
    if v < i64::MIN as f64 || v >= i64::MAX as f64 {
        return Err(DecodeError::InvalidNumeric {
            value: v.to_string(),
        });
    }
    Ok(v as i64)
}

fn int_from_u64(v: u64) -> Result<i64, DecodeError> {
    i64::try_from(v).map_err(|_| DecodeError::InvalidNumeric {
        value: v.to_string(),
    })
}

fn int_from_str(v: &str) -> Result<i64, DecodeError> {
    v.parse::<i64>().map_err(|_| DecodeError::InvalidNumeric {
        value: format!("{:?}", v),
    })
}

struct FlexibleIntVisitor;

impl<'de> Visitor<'de> for FlexibleIntVisitor {
    type Value = FlexibleInt;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an integer, an integer string, or null")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(FlexibleInt(0))
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(FlexibleInt(0))
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(FlexibleInt(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        int_from_u64(v).map(FlexibleInt).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        int_from_f64(v).map(FlexibleInt).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        int_from_str(v).map(FlexibleInt).map_err(E::custom)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Err(E::custom(DecodeError::InvalidNumeric {
            value: v.to_string(),
        }))
    }
}

impl<'de> Deserialize<'de> for FlexibleInt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FlexibleIntVisitor)
    }
}

impl Serialize for FlexibleInt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

/// Timestamp tolerant of wire representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlexibleTimestamp(pub DateTime<Utc>);

impl FlexibleTimestamp {
    pub fn get(self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for FlexibleTimestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

/// Interpret a unix epoch value, choosing the unit by magnitude.
pub fn timestamp_from_epoch(v: i64) -> Result<DateTime<Utc>, DecodeError> {
    let parsed = if v.unsigned_abs() > EPOCH_MILLIS_THRESHOLD {
        DateTime::<Utc>::from_timestamp_millis(v)
    } else {
        DateTime::<Utc>::from_timestamp(v, 0)
    };
    parsed.ok_or_else(|| DecodeError::InvalidTimestamp {
        value: v.to_string(),
    })
}

fn timestamp_from_str(v: &str) -> Result<DateTime<Utc>, DecodeError> {
    DateTime::parse_from_rfc3339(v)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DecodeError::InvalidTimestamp {
            value: format!("{:?} ({})", v, e),
        })
}

struct FlexibleTimestampVisitor;

impl<'de> Visitor<'de> for FlexibleTimestampVisitor {
    type Value = FlexibleTimestamp;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an RFC 3339 string or a unix epoch number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        timestamp_from_str(v)
            .map(FlexibleTimestamp)
            .map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        timestamp_from_epoch(v)
            .map(FlexibleTimestamp)
            .map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        let v = i64::try_from(v).map_err(|_| {
            E::custom(DecodeError::InvalidTimestamp {
                value: v.to_string(),
            })
        })?;
        self.visit_i64(v)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        let v = int_from_f64(v).map_err(|_| {
            E::custom(DecodeError::InvalidTimestamp {
                value: v.to_string(),
            })
        })?;
        self.visit_i64(v)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Err(E::custom(DecodeError::InvalidTimestamp {
            value: "null".to_string(),
        }))
    }
}

impl<'de> Deserialize<'de> for FlexibleTimestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FlexibleTimestampVisitor)
    }
}

impl Serialize for FlexibleTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_rfc3339())
    }
}

/// Decode a numeric KPI value from a JSON value.
pub fn parse_flexible_int(value: &serde_json::Value) -> Result<i64, DecodeError> {
    use serde_json::Value;

    match value {
        Value::Null => Ok(0),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(u) = n.as_u64() {
                int_from_u64(u)
            } else {
                int_from_f64(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => int_from_str(s),
        other => Err(DecodeError::InvalidNumeric {
            value: other.to_string(),
        }),
    }
}

/// Decode a timestamp from a JSON value.
pub fn parse_flexible_timestamp(value: &serde_json::Value) -> Result<DateTime<Utc>, DecodeError> {
    use serde_json::Value;

    let invalid = || DecodeError::InvalidTimestamp {
        value: value.to_string(),
    };

    match value {
        Value::String(s) => timestamp_from_str(s),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                timestamp_from_epoch(i)
            } else {
                let f = n.as_f64().ok_or_else(invalid)?;
                timestamp_from_epoch(int_from_f64(f).map_err(|_| invalid())?)
            }
        }
        _ => Err(invalid()),
    }
}

//! Event records and their typed property values.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Custom properties attached to an event, keyed by property name.
pub type Properties = BTreeMap<String, PropertyValue>;

/// A single scalar property value.
///
/// The variant is fixed when the value is built, so the encoder never has to
/// inspect runtime types.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Textual value.
    Text(String),
    /// 64-bit signed integer.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Boolean flag.
    Boolean(bool),
    /// Any other number that does not fit the variants above.
    Numeric(serde_json::Number),
    /// Anything else, carried as its textual representation.
    Other(String),
}

impl PropertyValue {
    /// Wrap an arbitrary displayable value as [`PropertyValue::Other`].
    pub fn other(value: impl fmt::Display) -> Self {
        Self::Other(value.to_string())
    }

    /// Convert a decoded JSON value. Non-scalars become [`PropertyValue::Other`].
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::String(text) => Self::Text(text.clone()),
            Value::Bool(b) => Self::Boolean(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if n.is_f64() {
                    n.as_f64().map(Self::Float).unwrap_or_else(|| Self::Numeric(n.clone()))
                } else {
                    Self::Numeric(n.clone())
                }
            }
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<char> for PropertyValue {
    fn from(value: char) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

macro_rules! integer_property {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for PropertyValue {
                fn from(value: $ty) -> Self {
                    Self::Integer(i64::from(value))
                }
            }
        )*
    };
}

integer_property!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(value) => Self::Integer(value),
            Err(_) => Self::Numeric(serde_json::Number::from(value)),
        }
    }
}

impl From<usize> for PropertyValue {
    fn from(value: usize) -> Self {
        Self::from(value as u64)
    }
}

/// One analytics event waiting to be delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    name: String,
    timestamp: DateTime<Utc>,
    properties: Properties,
    platform: String,
}

impl EventRecord {
    /// Build a record. Records are immutable after construction.
    pub fn new(
        name: impl Into<String>,
        timestamp: DateTime<Utc>,
        properties: Properties,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            timestamp,
            properties,
            platform: platform.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_value_conversions() {
        assert_eq!(PropertyValue::from("abc"), PropertyValue::Text("abc".to_string()));
        assert_eq!(PropertyValue::from('x'), PropertyValue::Text("x".to_string()));
        assert_eq!(PropertyValue::from(true), PropertyValue::Boolean(true));
        assert_eq!(PropertyValue::from(42i32), PropertyValue::Integer(42));
        assert_eq!(PropertyValue::from(7u8), PropertyValue::Integer(7));
        assert_eq!(PropertyValue::from(1.5f32), PropertyValue::Float(1.5));
        assert_eq!(PropertyValue::from(2.25f64), PropertyValue::Float(2.25));
    }

    #[test]
    fn test_large_unsigned_becomes_numeric() {
        assert_eq!(PropertyValue::from(10u64), PropertyValue::Integer(10));
        match PropertyValue::from(u64::MAX) {
            PropertyValue::Numeric(n) => assert_eq!(n.as_u64(), Some(u64::MAX)),
            other => panic!("Wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_other_uses_display() {
        let value = PropertyValue::other(std::net::Ipv4Addr::LOCALHOST);
        assert_eq!(value, PropertyValue::Other("127.0.0.1".to_string()));
    }

    #[test]
    fn test_from_json() {
        use serde_json::json;

        assert_eq!(PropertyValue::from_json(&json!("x")), PropertyValue::Text("x".into()));
        assert_eq!(PropertyValue::from_json(&json!(-3)), PropertyValue::Integer(-3));
        assert_eq!(PropertyValue::from_json(&json!(1.25)), PropertyValue::Float(1.25));
        assert_eq!(PropertyValue::from_json(&json!(true)), PropertyValue::Boolean(true));
        assert!(matches!(
            PropertyValue::from_json(&json!(u64::MAX)),
            PropertyValue::Numeric(_)
        ));
        assert_eq!(
            PropertyValue::from_json(&json!([1, 2])),
            PropertyValue::Other("[1,2]".into())
        );
        assert_eq!(PropertyValue::from_json(&json!(null)), PropertyValue::Other("null".into()));
    }

    #[test]
    fn test_event_record_accessors() {
        let now = Utc::now();
        let mut properties = Properties::new();
        properties.insert("source".to_string(), "player".into());

        let record = EventRecord::new("episode_played", now, properties, "rust");

        assert_eq!(record.name(), "episode_played");
        assert_eq!(record.timestamp(), now);
        assert_eq!(record.platform(), "rust");
        assert_eq!(
            record.properties().get("source"),
            Some(&PropertyValue::Text("player".to_string()))
        );
    }
}

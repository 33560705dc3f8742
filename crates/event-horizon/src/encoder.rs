//! Outbound wire encoding.
//!
//! Each message is a JSON array of flat event objects. Reserved keys are
//! written after the custom properties so they always win on collision.
//! There is no decode path: the collector is the only reader.

use crate::error::HorizonResult;
use crate::record::{EventRecord, PropertyValue};
use serde_json::{Map, Number, Value};

/// Reserved key holding the event name.
pub const KEY_EVENT: &str = "event";
/// Reserved key holding the epoch-millisecond timestamp.
pub const KEY_TIMESTAMP: &str = "timestamp";
/// Reserved key holding the anonymous installation identifier.
pub const KEY_ANONYMOUS_ID: &str = "anonymous_id";
/// Reserved key holding the user-type tag.
pub const KEY_USER_TYPE: &str = "user_type";
/// Reserved key holding the emitting platform.
pub const KEY_PLATFORM: &str = "platform";

/// Encodes event batches for the collector.
#[derive(Debug, Clone)]
pub struct WireEncoder {
    anonymous_id: String,
    user_type: String,
}

impl WireEncoder {
    pub fn new(anonymous_id: impl Into<String>, user_type: impl Into<String>) -> Self {
        Self {
            anonymous_id: anonymous_id.into(),
            user_type: user_type.into(),
        }
    }

    /// Encode a batch (one or many events) as a single JSON array message.
    pub fn encode(&self, events: &[EventRecord]) -> HorizonResult<Vec<u8>> {
        let batch: Vec<Value> = events.iter().map(|event| self.event_object(event)).collect();
        Ok(serde_json::to_vec(&batch)?)
    }

    fn event_object(&self, event: &EventRecord) -> Value {
        let mut object = Map::new();
        for (key, value) in event.properties() {
            object.insert(key.clone(), project(value));
        }

        object.insert(KEY_EVENT.to_string(), Value::String(event.name().to_string()));
        object.insert(
            KEY_TIMESTAMP.to_string(),
            Value::from(event.timestamp().timestamp_millis()),
        );
        object.insert(
            KEY_ANONYMOUS_ID.to_string(),
            Value::String(self.anonymous_id.clone()),
        );
        object.insert(KEY_USER_TYPE.to_string(), Value::String(self.user_type.clone()));
        object.insert(
            KEY_PLATFORM.to_string(),
            Value::String(event.platform().to_string()),
        );

        Value::Object(object)
    }
}

fn project(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Text(text) => Value::String(text.clone()),
        PropertyValue::Integer(n) => Value::from(*n),
        // JSON has no NaN or infinity
        PropertyValue::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string())),
        PropertyValue::Boolean(b) => Value::Bool(*b),
        PropertyValue::Numeric(n) => Value::Number(n.clone()),
        PropertyValue::Other(text) => Value::String(text.clone()),
    }
}

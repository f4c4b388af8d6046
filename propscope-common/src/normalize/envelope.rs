//! Envelope versions of workflow callback bodies

use serde_json::Value;

/// Known wrappings of a callback payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Envelope<'a> {
    /// `{"body": {...}}` as forwarded by webhook relays
    Relayed(&'a Value),
    /// Array-wrapped payload; the first element is used
    Batch(&'a Value),
    /// The payload itself
    Direct(&'a Value),
}

impl<'a> Envelope<'a> {
    pub fn detect(raw: &'a Value) -> Self {
        match raw {
            Value::Array(items) => match items.first() {
                Some(first) => Envelope::Batch(Envelope::detect(first).payload()),
                None => Envelope::Direct(raw),
            },
            Value::Object(map) => match map.get("body") {
                Some(body) if body.is_object() && !is_payload(raw) => Envelope::Relayed(body),
                _ => Envelope::Direct(raw),
            },
            _ => Envelope::Direct(raw),
        }
    }

    pub fn payload(&self) -> &'a Value {
        match *self {
            Envelope::Relayed(v) | Envelope::Batch(v) | Envelope::Direct(v) => v,
        }
    }
}

/// A payload names its status or id at the top level; a relay wrapper does not.
fn is_payload(value: &Value) -> bool {
    ["status", "super_id", "final_result"]
        .iter()
        .any(|k| value.get(k).is_some_and(|v| !v.is_null()))
}

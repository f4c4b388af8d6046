//! Ordered fallback chains over loosely-shaped JSON
//!
//! A [`Chain`] is an explicit, ordered list of [`Accessor`]s. Resolving a
//! chain tries each accessor in turn and returns the first usable value,
//! so every output field documents exactly which upstream shapes feed it.

use serde_json::Value;
use tracing::debug;

/// One way of reading a field
pub enum Accessor<T> {
    /// JSON pointer into the source object (e.g. `/price/primary`)
    Path(&'static str),
    /// Derived from other fields
    Derive(fn(&Value) -> Option<T>),
}

/// Named ordered list of accessors
pub struct Chain<T: 'static> {
    pub name: &'static str,
    pub steps: &'static [Accessor<T>],
}

impl<T: FromField> Chain<T> {
    pub const fn new(name: &'static str, steps: &'static [Accessor<T>]) -> Self {
        Self { name, steps }
    }

    /// First value produced by the chain, or `None` when every step misses
    pub fn resolve(&self, source: &Value) -> Option<T> {
        self.steps.iter().enumerate().find_map(|(i, step)| {
            let value = match step {
                Accessor::Path(pointer) => source.pointer(pointer).and_then(T::from_field),
                Accessor::Derive(derive) => derive(source),
            }?;
            if i > 0 {
                debug!("{}: using fallback step {}", self.name, i);
            }
            Some(value)
        })
    }
}

/// Conversion from a JSON value that treats null and empty values as missing
pub trait FromField: Sized {
    fn from_field(value: &Value) -> Option<Self>;
}

impl FromField for String {
    fn from_field(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl FromField for f64 {
    fn from_field(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromField for u64 {
    fn from_field(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Counts (bedrooms, bathrooms) accept numbers and text with a leading
/// integer such as `"3"` or `"3 bedrooms"`.
impl FromField for u32 {
    fn from_field(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
            Value::String(s) => leading_integer(s),
            _ => None,
        }
    }
}

impl FromField for Vec<String> {
    fn from_field(value: &Value) -> Option<Self> {
        let items = value.as_array()?;
        Some(items.iter().filter_map(String::from_field).collect())
    }
}

impl FromField for Value {
    fn from_field(value: &Value) -> Option<Self> {
        (!value.is_null()).then(|| value.clone())
    }
}

fn leading_integer(text: &str) -> Option<u32> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// First non-empty array found at any of `pointers`
pub fn first_array<'a>(source: &'a Value, pointers: &[&str]) -> &'a [Value] {
    pointers
        .iter()
        .filter_map(|p| source.pointer(p).and_then(Value::as_array))
        .find(|items| !items.is_empty())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Text of the `infoReelItems` entry with the given `type`
pub fn info_reel_text(source: &Value, item_type: &str, field: &str) -> Option<String> {
    source
        .get("infoReelItems")?
        .as_array()?
        .iter()
        .find(|item| item.get("type").and_then(Value::as_str) == Some(item_type))
        .and_then(|item| item.get(field))
        .and_then(String::from_field)
}

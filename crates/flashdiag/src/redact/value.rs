//! Tagged value model traversed by the redaction engine.
//!
//! Snapshots handed to the pipeline (wizard state, capability probes) are
//! represented as an explicit sum type instead of being inspected
//! dynamically. Dates and pre-compiled patterns are carried as opaque
//! leaves so redaction can clone them untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A structured value fed to or produced by the redaction engine.
///
/// Maps are ordered so that serializing the same value twice yields
/// byte-identical JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value; serializes as JSON `null`.
    Null,
    /// Boolean leaf.
    Bool(bool),
    /// Numeric leaf (integer or float, kept exact).
    Number(serde_json::Number),
    /// Text leaf; the only variant redaction rewrites.
    Text(String),
    /// Ordered sequence of values.
    List(Vec<Value>),
    /// Key-ordered mapping of string keys to values.
    Map(BTreeMap<String, Value>),
    /// Opaque timestamp, cloned unchanged by redaction.
    Date(DateTime<Utc>),
    /// Opaque pattern source, cloned unchanged by redaction.
    Pattern(String),
}

impl Value {
    /// Borrow the text content if this is a text leaf.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Look up a key if this is a map.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Whether this is a text leaf.
    #[must_use]
    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(flag) => Self::Bool(flag),
            serde_json::Value::Number(number) => Self::Number(number),
            serde_json::Value::String(text) => Self::Text(text),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(key, entry)| (key, Self::from(entry)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Self::Bool(flag)
    }
}

impl From<i64> for Value {
    fn from(number: i64) -> Self {
        Self::Number(number.into())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(flag) => serializer.serialize_bool(*flag),
            Self::Number(number) => number.serialize(serializer),
            Self::Text(text) | Self::Pattern(text) => serializer.serialize_str(text),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, entry) in entries {
                    map.serialize_entry(key, entry)?;
                }
                map.end()
            }
            Self::Date(timestamp) => serializer.serialize_str(&timestamp.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_value() {
        let value = Value::from(json!({
            "name": "device-7",
            "retries": 3,
            "active": true,
            "tags": ["alpha", "beta"],
            "extra": null
        }));

        assert_eq!(value.get("name").and_then(Value::as_text), Some("device-7"));
        assert_eq!(value.get("retries"), Some(&Value::Number(3.into())));
        assert_eq!(value.get("active"), Some(&Value::Bool(true)));
        assert!(matches!(value.get("tags"), Some(Value::List(items)) if items.len() == 2));
        assert_eq!(value.get("extra"), Some(&Value::Null));
    }

    #[test]
    fn test_map_serialization_is_key_ordered() {
        let value = Value::from(json!({"zeta": 1, "alpha": 2}));
        let serialized = serde_json::to_string(&value).unwrap();
        assert_eq!(serialized, r#"{"alpha":2,"zeta":1}"#);
    }

    #[test]
    fn test_serialization_round_trip_shapes() {
        let value = Value::from(json!({
            "nested": {"list": [1, "two", false, null]}
        }));
        let serialized = serde_json::to_string(&value).unwrap();
        assert_eq!(serialized, r#"{"nested":{"list":[1,"two",false,null]}}"#);
    }

    #[test]
    fn test_date_serializes_as_rfc3339() {
        let timestamp: DateTime<Utc> = "2024-03-01T10:30:00Z".parse().unwrap();
        let serialized = serde_json::to_string(&Value::Date(timestamp)).unwrap();
        assert!(serialized.contains("2024-03-01T10:30:00"));
    }

    #[test]
    fn test_pattern_serializes_as_source() {
        let serialized = serde_json::to_string(&Value::Pattern(r"^v\d+".to_string())).unwrap();
        assert_eq!(serialized, r#""^v\\d+""#);
    }

    #[test]
    fn test_get_on_non_map() {
        assert_eq!(Value::Text("x".to_string()).get("key"), None);
        assert_eq!(Value::Null.get("key"), None);
    }
}

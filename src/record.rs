//! Schema-free log records and default-field merge semantics

use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Severity levels, informational by default.
///
/// The client carries a severity floor as plain configuration; it never
/// filters submissions itself.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Debug => write!(f, "DEBUG"),
            Level::Info => write!(f, "INFO"),
            Level::Warn => write!(f, "WARN"),
            Level::Error => write!(f, "ERROR"),
            Level::Fatal => write!(f, "FATAL"),
        }
    }
}

impl From<&str> for Level {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "DEBUG" | "TRACE" => Level::Debug,
            "INFO" | "INFORMATION" => Level::Info,
            "WARN" | "WARNING" => Level::Warn,
            "ERROR" | "ERR" => Level::Error,
            "FATAL" | "CRITICAL" => Level::Fatal,
            _ => Level::Info, // Default fallback
        }
    }
}

/// An open string-to-JSON-value mapping submitted by callers.
///
/// Records are enriched (timestamp, default fields) and serialized at
/// submission time; only the serialized bytes are buffered.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Record {
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record from any serializable value.
    ///
    /// Fails when the value does not encode as a JSON object (non-object
    /// values, non-string map keys).
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(fields) => Ok(Self { fields }),
            other => {
                let msg = format!(
                    "record must serialize to a JSON object, got {}",
                    json_type_name(&other)
                );
                Err(Error::Json(serde::ser::Error::custom(msg)))
            }
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Raw merge primitive: copy every key of every source into this record,
    /// later sources winning over earlier ones and over existing keys.
    pub fn merge<'a, I>(&mut self, sources: I)
    where
        I: IntoIterator<Item = &'a Map<String, Value>>,
    {
        for source in sources {
            for (key, value) in source {
                self.fields.insert(key.clone(), value.clone());
            }
        }
    }

    /// Fill gaps from `defaults` without touching explicit fields.
    pub fn fill_defaults(&mut self, defaults: &Map<String, Value>) {
        for (key, value) in defaults {
            if !self.fields.contains_key(key) {
                self.fields.insert(key.clone(), value.clone());
            }
        }
    }

    /// Assign the submission-time clock reading, in milliseconds since the
    /// epoch, unless the caller set a timestamp explicitly.
    pub fn ensure_timestamp(&mut self) {
        if !self.fields.contains_key("timestamp") {
            self.fields
                .insert("timestamp".to_string(), Value::from(now_millis()));
        }
    }

    /// Canonical wire encoding of the record.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.fields).map_err(Error::Json)
    }
}

impl From<Map<String, Value>> for Record {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// Current wall clock in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_level_from_str() {
        assert_eq!(Level::from("INFO"), Level::Info);
        assert_eq!(Level::from("warning"), Level::Warn);
        assert_eq!(Level::from("err"), Level::Error);
        assert_eq!(Level::from("unknown"), Level::Info);
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Error < Level::Fatal);
        assert_eq!(Level::default(), Level::Info);
    }

    #[test]
    fn test_ensure_timestamp_assigns_current_millis() {
        let before = now_millis();
        let mut record = Record::new().with("message", "hello");
        record.ensure_timestamp();
        let after = now_millis();

        let ts = record.get("timestamp").and_then(Value::as_i64).unwrap();
        assert!(ts >= before && ts <= after);
    }

    #[test]
    fn test_ensure_timestamp_keeps_explicit_value() {
        let mut record = Record::new().with("timestamp", 42);
        record.ensure_timestamp();
        assert_eq!(record.get("timestamp"), Some(&json!(42)));
    }

    #[test]
    fn test_fill_defaults_never_overwrites_explicit_fields() {
        let mut defaults = Map::new();
        defaults.insert("hostname".to_string(), json!("default-host"));
        defaults.insert("region".to_string(), json!("us-west"));

        let mut record = Record::new().with("hostname", "explicit-host");
        record.fill_defaults(&defaults);

        assert_eq!(record.get("hostname"), Some(&json!("explicit-host")));
        assert_eq!(record.get("region"), Some(&json!("us-west")));
    }

    #[test]
    fn test_merge_last_source_wins() {
        let mut a = Map::new();
        a.insert("k".to_string(), json!(1));
        let mut b = Map::new();
        b.insert("k".to_string(), json!(2));

        let mut record = Record::new().with("k", 0);
        record.merge([&a, &b]);
        assert_eq!(record.get("k"), Some(&json!(2)));
    }

    #[test]
    fn test_from_serialize_object() {
        #[derive(Serialize)]
        struct Event {
            message: String,
            code: u32,
        }

        let record = Record::from_serialize(&Event {
            message: "boot".to_string(),
            code: 7,
        })
        .unwrap();

        assert_eq!(record.get("message"), Some(&json!("boot")));
        assert_eq!(record.get("code"), Some(&json!(7)));
    }

    #[test]
    fn test_from_serialize_rejects_non_object() {
        let err = Record::from_serialize(&42).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.to_string().contains("JSON object"));
    }

    #[test]
    fn test_from_serialize_rejects_non_string_keys() {
        let weird: HashMap<(u8, u8), u8> = HashMap::from([((1, 2), 3)]);
        assert!(matches!(
            Record::from_serialize(&weird),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_to_bytes_is_json() {
        let record = Record::new().with("message", "hi").with("n", 1);
        let bytes = record.to_bytes().unwrap();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["message"], json!("hi"));
        assert_eq!(parsed["n"], json!(1));
    }
}

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as JsonValue;

pub type Object = IndexMap<String, Value>;

/// What the generic write path reports back from the executor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunInfo {
    pub last_insert_id: i64,
    pub changes: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// An unbound variable or absent request field. Falsy, and dropped from
    /// objects when serialized.
    Missing,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(Object),
    QueryResult(RunInfo),
}

impl Value {
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Missing | Value::Null => false,
            Value::Bool(v) => *v,
            Value::Number(v) => *v != 0.0,
            Value::String(v) => !v.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
            Value::QueryResult(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// `{"error": message}`, the shape every swallowed failure takes.
    pub fn error_object(message: impl Into<String>) -> Value {
        let mut map = Object::new();
        map.insert("error".to_string(), Value::String(message.into()));
        Value::Object(map)
    }

    /// Text form used by `concat()` and HTML emission.
    pub fn to_text(&self) -> String {
        match self {
            Value::Missing | Value::Null => String::new(),
            Value::Bool(v) => v.to_string(),
            Value::Number(v) => format_number(*v),
            Value::String(v) => v.clone(),
            Value::Array(_) | Value::Object(_) | Value::QueryResult(_) => self.to_json().to_string(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        // Map keys are always strings, so conversion cannot fail.
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }

    pub fn from_json(json: &JsonValue) -> Value {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(v) => Value::Bool(*v),
            JsonValue::Number(v) => Value::Number(v.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(v) => Value::String(v.clone()),
            JsonValue::Array(items) => Value::Array(items.iter().map(Value::from_json).collect()),
            JsonValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), Value::from_json(value)))
                    .collect(),
            ),
        }
    }
}

/// JSON emission: integral numbers print without a fraction, non-finite
/// numbers become `null`, and `Missing` object entries are skipped.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Missing | Value::Null => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Number(v) if is_integral(*v) => serializer.serialize_i64(*v as i64),
            Value::Number(v) if v.is_finite() => serializer.serialize_f64(*v),
            Value::Number(_) => serializer.serialize_unit(),
            Value::String(v) => serializer.serialize_str(v),
            Value::Array(items) => serializer.collect_seq(items),
            Value::Object(map) => serializer.collect_map(
                map.iter()
                    .filter(|(_, value)| !matches!(value, Value::Missing)),
            ),
            Value::QueryResult(info) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("lastInsertRowid", &info.last_insert_id)?;
                map.serialize_entry("changes", &info.changes)?;
                map.end()
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn is_integral(v: f64) -> bool {
    v.is_finite() && v.fract() == 0.0 && v.abs() <= MAX_SAFE_INTEGER
}

pub fn format_number(v: f64) -> String {
    if is_integral(v) {
        // avoids "-0"
        return (v as i64).to_string();
    }
    v.to_string()
}

//! Runtime value types

use super::super::stdlib::StdlibFunc;
use crate::db::RecordRef;
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value as JsonValue};
use std::collections::HashMap;
use std::fmt;

/// Runtime value type
#[derive(Debug, Clone)]
pub enum Val {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Vec<Val>),
    Obj(HashMap<String, Val>),
    /// Live handle to a stored record; reads observe later updates
    Record(RecordRef),
    /// The `db` namespace binding
    Db,
    /// `db.<Entity>`: an accessor with the entity name fixed
    Entity(String),
    NativeFunc(StdlibFunc),
}

impl Val {
    /// Check if value is truthy (for conditionals)
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Null => false,
            Val::Bool(b) => *b,
            Val::Num(n) => *n != 0.0 && !n.is_nan(),
            Val::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Val::Null => "null",
            Val::Bool(_) => "boolean",
            Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::List(_) => "list",
            Val::Obj(_) => "object",
            Val::Record(_) => "record",
            Val::Db => "db",
            Val::Entity(_) => "entity",
            Val::NativeFunc(_) => "function",
        }
    }

    pub fn str(s: impl Into<String>) -> Self {
        Val::Str(s.into())
    }

    /// Field lookup on objects and records; `None` for any other value
    pub fn field(&self, name: &str) -> Option<Val> {
        match self {
            Val::Obj(map) => Some(map.get(name).cloned().unwrap_or(Val::Null)),
            Val::Record(record) => Some(record.get(name).unwrap_or(Val::Null)),
            _ => None,
        }
    }
}

impl PartialEq for Val {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Val::Null, Val::Null) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Num(a), Val::Num(b)) => a == b,
            (Val::Str(a), Val::Str(b)) => a == b,
            (Val::List(a), Val::List(b)) => a == b,
            (Val::Obj(a), Val::Obj(b)) => a == b,
            (Val::Record(a), Val::Record(b)) => a == b,
            (Val::Db, Val::Db) => true,
            (Val::Entity(a), Val::Entity(b)) => a == b,
            (Val::NativeFunc(a), Val::NativeFunc(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Val {
    fn from(b: bool) -> Self {
        Val::Bool(b)
    }
}

impl From<f64> for Val {
    fn from(n: f64) -> Self {
        Val::Num(n)
    }
}

impl From<&str> for Val {
    fn from(s: &str) -> Self {
        Val::Str(s.to_string())
    }
}

impl From<String> for Val {
    fn from(s: String) -> Self {
        Val::Str(s)
    }
}

impl From<HashMap<String, Val>> for Val {
    fn from(map: HashMap<String, Val>) -> Self {
        Val::Obj(map)
    }
}

/* ===================== JSON Conversion ===================== */

/// Convert a JSON value (literal or host payload) to a runtime value
pub fn json_to_val(json: &JsonValue) -> Val {
    match json {
        JsonValue::Null => Val::Null,
        JsonValue::Bool(b) => Val::Bool(*b),
        JsonValue::Number(n) => Val::Num(n.as_f64().unwrap_or(f64::NAN)),
        JsonValue::String(s) => Val::Str(s.clone()),
        JsonValue::Array(items) => Val::List(items.iter().map(json_to_val).collect()),
        JsonValue::Object(obj) => Val::Obj(json_to_val_map(obj)),
    }
}

pub fn json_to_val_map(obj: &Map<String, JsonValue>) -> HashMap<String, Val> {
    obj.iter()
        .map(|(k, v)| (k.clone(), json_to_val(v)))
        .collect()
}

/// Convert a runtime value to JSON for the display layer
///
/// Numbers with no fractional part are emitted as integers so ids read `1`
/// rather than `1.0`. Non-finite numbers and engine handles become null or
/// a descriptive string.
pub fn val_to_json(val: &Val) -> JsonValue {
    match val {
        Val::Null => JsonValue::Null,
        Val::Bool(b) => JsonValue::Bool(*b),
        Val::Num(n) => num_to_json(*n),
        Val::Str(s) => JsonValue::String(s.clone()),
        Val::List(items) => JsonValue::Array(items.iter().map(val_to_json).collect()),
        Val::Obj(map) => JsonValue::Object(val_map_to_json(map)),
        Val::Record(record) => record.to_json(),
        Val::Db => JsonValue::String("<db>".to_string()),
        Val::Entity(name) => JsonValue::String(format!("<db.{}>", name)),
        Val::NativeFunc(func) => JsonValue::String(format!("<function {}>", func.name())),
    }
}

pub fn val_map_to_json(map: &HashMap<String, Val>) -> Map<String, JsonValue> {
    map.iter()
        .map(|(k, v)| (k.clone(), val_to_json(v)))
        .collect()
}

fn num_to_json(n: f64) -> JsonValue {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        JsonValue::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null)
    }
}

impl Serialize for Val {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        val_to_json(self).serialize(serializer)
    }
}

impl fmt::Display for Val {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Val::Str(s) => write!(f, "{}", s),
            other => write!(f, "{}", val_to_json(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!Val::Null.is_truthy());
        assert!(!Val::Bool(false).is_truthy());
        assert!(!Val::Num(0.0).is_truthy());
        assert!(!Val::str("").is_truthy());
        assert!(Val::Num(-1.0).is_truthy());
        assert!(Val::List(vec![]).is_truthy());
        assert!(Val::Obj(HashMap::new()).is_truthy());
    }

    #[test]
    fn test_json_numbers_keep_integer_shape() {
        assert_eq!(val_to_json(&Val::Num(3.0)), json!(3));
        assert_eq!(val_to_json(&Val::Num(2.5)), json!(2.5));
        assert_eq!(val_to_json(&Val::Num(f64::INFINITY)), JsonValue::Null);
    }

    #[test]
    fn test_json_to_val_nested() {
        let val = json_to_val(&json!({"tags": ["a", "b"], "done": false}));
        let Val::Obj(map) = val else {
            unreachable!("Expected object");
        };
        assert_eq!(
            map["tags"],
            Val::List(vec![Val::str("a"), Val::str("b")])
        );
        assert_eq!(map["done"], Val::Bool(false));
    }

    #[test]
    fn test_display_strings_unquoted() {
        assert_eq!(Val::str("hi").to_string(), "hi");
        assert_eq!(Val::Num(4.0).to_string(), "4");
        assert_eq!(Val::Null.to_string(), "null");
    }
}

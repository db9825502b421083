use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

use super::Uid;

/// Type tag carried by every literal so the store keeps the scalar type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    String,
    Int,
    Float,
    Bool,
    DateTime,
    /// Edge to another node; encoded as a UID reference, not a literal.
    Uid,
}

impl DataType {
    /// XML schema tag used in the mutation text.
    pub fn as_xsd(&self) -> &'static str {
        match self {
            DataType::String => "xs:string",
            DataType::Int => "xs:int",
            DataType::Float => "xs:float",
            DataType::Bool => "xs:boolean",
            DataType::DateTime => "xs:dateTime",
            DataType::Uid => "uid",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_xsd())
    }
}

/// Object of a duple.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(DateTime<Utc>),
    Uid(Uid),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::String(_) => DataType::String,
            Value::Int(_) => DataType::Int,
            Value::Float(_) => DataType::Float,
            Value::Bool(_) => DataType::Bool,
            Value::DateTime(_) => DataType::DateTime,
            Value::Uid(_) => DataType::Uid,
        }
    }

    /// Lexical form of the value, unquoted and unescaped.
    pub fn lexical(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(v) => float_lexical(*v),
            Value::Bool(b) => b.to_string(),
            Value::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Value::Uid(uid) => uid.value().to_string(),
        }
    }

    /// Lexical form as an escaped, double-quoted literal.
    pub fn quoted(&self) -> String {
        quote(&self.lexical())
    }
}

/// `xs:float` spells the special values `INF`, `-INF` and `NaN`.
fn float_lexical(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v.is_infinite() {
        if v > 0.0 { "INF" } else { "-INF" }.to_string()
    } else {
        v.to_string()
    }
}

/// JSON string escaping covers everything that would end a literal early:
/// quotes, backslashes and control characters.
pub(crate) fn quote(raw: &str) -> String {
    serde_json::Value::String(raw.to_string()).to_string()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lexical())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value.into())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<Uid> for Value {
    fn from(value: Uid) -> Self {
        Value::Uid(value)
    }
}

/// Converts a JSON scalar into a duple value. Arrays, objects and null have
/// no triple representation and yield `None`.
pub(crate) fn from_json(value: &serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::String(s) => Some(Value::String(s.clone())),
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => n
            .as_i64()
            .map(Value::Int)
            .or_else(|| n.as_f64().map(Value::Float)),
        _ => None,
    }
}

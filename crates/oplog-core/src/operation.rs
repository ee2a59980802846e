//! Operation records

use chrono::Utc;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;
use crate::Result;

/// Storage key of an operation record.
///
/// Integers sort before strings; integers compare numerically and strings
/// bytewise. This matches the key order of the `ops` collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpId {
    Int(i64),
    Text(String),
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpId::Int(n) => write!(f, "{n}"),
            OpId::Text(s) => f.write_str(s),
        }
    }
}

impl FromStr for OpId {
    type Err = Infallible;

    /// Digits, with an optional leading `-`, that fit in an `i64` become an
    /// integer key. Everything else, `+42` included, stays text.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits = s.strip_prefix('-').unwrap_or(s);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(OpId::Text(s.to_string()));
        }

        Ok(s.parse::<i64>()
            .map(OpId::Int)
            .unwrap_or_else(|_| OpId::Text(s.to_string())))
    }
}

impl From<i64> for OpId {
    fn from(n: i64) -> Self {
        OpId::Int(n)
    }
}

impl From<i32> for OpId {
    fn from(n: i32) -> Self {
        OpId::Int(n.into())
    }
}

impl From<&str> for OpId {
    fn from(s: &str) -> Self {
        OpId::Text(s.to_string())
    }
}

impl From<String> for OpId {
    fn from(s: String) -> Self {
        OpId::Text(s)
    }
}

impl ToSql for OpId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            OpId::Int(n) => ToSqlOutput::from(*n),
            OpId::Text(s) => ToSqlOutput::from(s.as_str()),
        })
    }
}

impl FromSql for OpId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(n) => Ok(OpId::Int(n)),
            ValueRef::Text(_) => value.as_str().map(|s| OpId::Text(s.to_string())),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// A caller-defined record. Only `id` is interpreted by the store; every
/// other field is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OpId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Operation {
    pub fn new(id: impl Into<OpId>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Builder-style field setter. An `id` field is ignored; use the record's
    /// `id` instead.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != "id" {
            self.fields.insert(key, value.into());
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// A key/value "set" operation with a random id and the current time.
    pub fn set(key: impl Into<String>, value: impl Into<String>, actor: impl Into<String>) -> Self {
        let key: String = key.into();
        let value: String = value.into();
        let actor: String = actor.into();
        let timestamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();

        Self::new(random_id())
            .with_field("type", "set")
            .with_field("key", key)
            .with_field("value", value)
            .with_field("timestamp", timestamp)
            .with_field("actor", actor)
    }

    /// Decode a record from an arbitrary JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| CoreError::InvalidRecord(e.to_string()))
    }

    /// Decode a record from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CoreError::InvalidRecord(e.to_string()))
    }

    /// Encode for storage. A record carrying a second `id` inside `fields`
    /// would never decode again, so it is refused here.
    pub fn to_json(&self) -> Result<String> {
        if self.fields.contains_key("id") {
            return Err(CoreError::InvalidRecord(format!(
                "record {} has `id` among its fields",
                self.id
            )));
        }
        Ok(serde_json::to_string(self)?)
    }
}

/// 16 hex characters of randomness.
fn random_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_shape_is_flat() {
        let op = Operation::new(1).with_field("op", "a");
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(value, json!({"id": 1, "op": "a"}));

        let back = Operation::from_value(value).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_id_is_required() {
        let err = Operation::from_value(json!({"op": "a"})).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecord(_)));
    }

    #[test]
    fn test_unsupported_id_types_are_rejected() {
        for id in [json!(1.5), json!(true), json!(null), json!([1]), json!({"a": 1})] {
            let err = Operation::from_value(json!({"id": id})).unwrap_err();
            assert!(matches!(err, CoreError::InvalidRecord(_)));
        }
    }

    #[test]
    fn test_id_ordering() {
        let mut ids = vec![
            OpId::from("b"),
            OpId::from(10),
            OpId::from("a"),
            OpId::from(-3),
            OpId::from(2),
        ];
        ids.sort();
        assert_eq!(
            ids,
            vec![
                OpId::Int(-3),
                OpId::Int(2),
                OpId::Int(10),
                OpId::Text("a".into()),
                OpId::Text("b".into()),
            ]
        );
    }

    #[test]
    fn test_id_from_str() {
        assert_eq!("42".parse::<OpId>().unwrap(), OpId::Int(42));
        assert_eq!("-7".parse::<OpId>().unwrap(), OpId::Int(-7));
        assert_eq!("4a".parse::<OpId>().unwrap(), OpId::Text("4a".into()));
        assert_eq!("+42".parse::<OpId>().unwrap(), OpId::Text("+42".into()));
        assert_eq!("-".parse::<OpId>().unwrap(), OpId::Text("-".into()));
        assert_eq!(
            "99999999999999999999".parse::<OpId>().unwrap(),
            OpId::Text("99999999999999999999".into())
        );
    }

    #[test]
    fn test_set_operation() {
        let op = Operation::set("welcome", "hello", "local-device");
        assert!(matches!(&op.id, OpId::Text(id) if id.len() == 16));
        assert_eq!(op.get("type"), Some(&json!("set")));
        assert_eq!(op.get("key"), Some(&json!("welcome")));
        assert_eq!(op.get("value"), Some(&json!("hello")));
        assert_eq!(op.get("actor"), Some(&json!("local-device")));
        assert!(op.get("timestamp").and_then(Value::as_i64).is_some());

        let other = Operation::set("welcome", "hello", "local-device");
        assert_ne!(op.id, other.id);
    }

    #[test]
    fn test_with_field_ignores_id() {
        let op = Operation::new(1).with_field("id", 2);
        assert_eq!(op.id, OpId::Int(1));
        assert!(op.fields.is_empty());
    }

    #[test]
    fn test_to_json_refuses_id_in_fields() {
        let mut op = Operation::new(2);
        op.fields.insert("id".into(), json!(3));

        let err = op.to_json().unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecord(_)));
    }
}

//! Last-write-wins key/value view over the operation log
//!
//! Only "set" records take part: a string `key`, a string `value`, and
//! optionally `timestamp` (integer, default 0), `actor` (string, default
//! empty) and `type` (must be "set" when present). Everything else in the
//! log is ignored here.

use std::collections::BTreeMap;

use crate::operation::Operation;

#[derive(Debug, Clone, Default)]
pub struct KvState {
    entries: BTreeMap<String, Operation>,
}

impl KvState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a sequence of records, in any order, into the winning values.
    pub fn from_ops<I>(ops: I) -> Self
    where
        I: IntoIterator<Item = Operation>,
    {
        let mut state = Self::new();
        for op in ops {
            state.apply(op);
        }
        state
    }

    /// Apply one record. Returns `true` if it is now the winner for its key.
    pub fn apply(&mut self, op: Operation) -> bool {
        let Some(key) = set_key(&op) else {
            return false;
        };

        if let Some(existing) = self.entries.get(key) {
            if !newer(&op, existing) {
                return false;
            }
        }

        let key = key.to_string();
        self.entries.insert(key, op);
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|op| field_str(op, "value"))
    }

    /// Current value of every key.
    pub fn state(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter_map(|(key, op)| field_str(op, "value").map(|v| (key.clone(), v.to_string())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Later timestamp wins; ties go to the greater actor, then the greater id.
fn newer(a: &Operation, b: &Operation) -> bool {
    let rank = |op: &Operation| {
        let timestamp = op.get("timestamp").and_then(|v| v.as_i64()).unwrap_or(0);
        let actor = field_str(op, "actor").unwrap_or("");
        (timestamp, actor.to_string(), op.id.clone())
    };
    rank(a) > rank(b)
}

fn set_key(op: &Operation) -> Option<&str> {
    if let Some(kind) = op.get("type") {
        if kind.as_str() != Some("set") {
            return None;
        }
    }
    field_str(op, "value")?;
    field_str(op, "key")
}

fn field_str<'a>(op: &'a Operation, name: &str) -> Option<&'a str> {
    op.get(name).and_then(|v| v.as_str())
}

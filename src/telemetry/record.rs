//! Decoded telemetry snapshots
//!
//! A [`Record`] is one sample from the driver's stats log: a flat mapping of
//! field name to [`Value`]. Only integer fields are treated as counters.

use std::collections::BTreeMap;

/// A single field value in a snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Integer,
            _ => ValueKind::Other,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// Whether a field takes part in delta computation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Other,
}

/// One decoded snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Builder-style insert, handy for constructing fixtures
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn schema(&self) -> Schema {
        Schema {
            kinds: self
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), v.kind()))
                .collect(),
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Key set of a record plus the kind of every key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    kinds: BTreeMap<String, ValueKind>,
}

/// Differences between an expected schema and a record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDiff {
    pub missing: Vec<String>,
    pub unexpected: Vec<String>,
    pub retyped: Vec<String>,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.retyped.is_empty()
    }
}

impl Schema {
    pub fn kind_of(&self, key: &str) -> Option<ValueKind> {
        self.kinds.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Integer-valued keys, in key order
    pub fn counters(&self) -> impl Iterator<Item = &str> {
        self.kinds
            .iter()
            .filter(|(_, kind)| **kind == ValueKind::Integer)
            .map(|(k, _)| k.as_str())
    }

    /// Compare a record against this schema by key name
    pub fn diff(&self, record: &Record) -> SchemaDiff {
        let mut diff = SchemaDiff::default();

        for (key, kind) in &self.kinds {
            match record.get(key) {
                None => diff.missing.push(key.clone()),
                Some(v) if v.kind() != *kind => diff.retyped.push(key.clone()),
                Some(_) => {}
            }
        }

        for (key, _) in record.iter() {
            if !self.kinds.contains_key(key) {
                diff.unexpected.push(key.to_string());
            }
        }

        diff
    }
}

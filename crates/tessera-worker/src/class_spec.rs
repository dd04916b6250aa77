//! Ordered machine class specification with a canonical encoding
//!
//! A `ClassSpec` holds every field that affects the identity of machines
//! created from a class. Keys are kept sorted and the canonical encoding sorts
//! nested object keys as well, so two specs are equivalent iff their
//! canonical bytes are identical.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field holding the class name; never part of the fingerprint
pub const NAME_FIELD: &str = "name";

/// Ordered mapping of class field name to value
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassSpec {
    fields: BTreeMap<String, Value>,
}

impl ClassSpec {
    /// Create an empty spec
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Builder form of [`ClassSpec::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Get a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a field for in-place modification
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }

    /// Remove a field
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Whether a field is set
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Iterate over fields in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the spec has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Canonical encoding: compact JSON with keys sorted at every depth
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = String::new();
        write_object(&mut out, self.fields.iter());
        out.into_bytes()
    }
}

impl From<BTreeMap<String, Value>> for ClassSpec {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }
}

impl From<ClassSpec> for Value {
    fn from(spec: ClassSpec) -> Self {
        Value::Object(spec.fields.into_iter().collect())
    }
}

fn write_object<'a>(out: &mut String, entries: impl Iterator<Item = (&'a String, &'a Value)>) {
    let mut entries: Vec<_> = entries.collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(out, key);
        out.push(':');
        write_value(out, value);
    }
    out.push('}');
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => write_object(out, map.iter()),
    }
}

fn write_string(out: &mut String, s: &str) {
    // Value::String's Display is the escaped JSON literal
    out.push_str(&Value::String(s.to_string()).to_string());
}

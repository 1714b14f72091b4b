//! Accumulated per-call metadata

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const WARNINGS_KEY: &str = "warnings";
const ERRORS_KEY: &str = "errors";

/// String-keyed bag of values collected while a call runs.
///
/// Entries are never removed. `insert` replaces the value under an existing
/// key; facts that must keep their first value go through `insert_once`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallMetadata(Map<String, Value>);

impl CallMetadata {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Insert only if `key` is absent. Returns whether the value was stored.
    pub fn insert_once(&mut self, key: impl Into<String>, value: impl Into<Value>) -> bool {
        match self.0.entry(key.into()) {
            serde_json::map::Entry::Vacant(slot) => {
                slot.insert(value.into());
                true
            }
            serde_json::map::Entry::Occupied(_) => false,
        }
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Merge another bag into this one. Nested objects are merged key by key.
    pub fn merge(&mut self, other: CallMetadata) {
        for (key, value) in other.0 {
            match (self.0.get_mut(&key), value) {
                (Some(Value::Object(existing)), Value::Object(incoming)) => {
                    existing.extend(incoming);
                }
                (_, value) => {
                    self.0.insert(key, value);
                }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn record_warning(&mut self, step: &str, detail: impl Into<String>) {
        self.nested_mut(WARNINGS_KEY)
            .insert(step.to_string(), Value::String(detail.into()));
    }

    pub fn record_error(&mut self, step: &str, detail: impl Into<String>) {
        self.nested_mut(ERRORS_KEY)
            .insert(step.to_string(), Value::String(detail.into()));
    }

    pub fn warning(&self, step: &str) -> Option<&str> {
        self.nested(WARNINGS_KEY)?.get(step)?.as_str()
    }

    pub fn error(&self, step: &str) -> Option<&str> {
        self.nested(ERRORS_KEY)?.get(step)?.as_str()
    }

    pub fn warnings(&self) -> Map<String, Value> {
        self.nested(WARNINGS_KEY).cloned().unwrap_or_default()
    }

    pub fn errors(&self) -> Map<String, Value> {
        self.nested(ERRORS_KEY).cloned().unwrap_or_default()
    }

    pub fn has_warnings(&self) -> bool {
        self.nested(WARNINGS_KEY).is_some_and(|w| !w.is_empty())
    }

    pub fn has_errors(&self) -> bool {
        self.nested(ERRORS_KEY).is_some_and(|e| !e.is_empty())
    }

    /// Point-in-time copy for a log record
    pub fn snapshot(&self) -> Value {
        Value::Object(self.0.clone())
    }

    fn nested(&self, key: &str) -> Option<&Map<String, Value>> {
        self.0.get(key)?.as_object()
    }

    fn nested_mut(&mut self, key: &str) -> &mut Map<String, Value> {
        let slot = self
            .0
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was just replaced with an object"),
        }
    }
}

impl From<Map<String, Value>> for CallMetadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

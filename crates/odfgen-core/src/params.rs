//! Per-action parameter maps.
//!
//! A job carries one parameter map keyed by action name. An action with its
//! own entry sees that entry; an action without one sees the whole map.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Option name to value mapping handed to exporters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(Map<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// First string value found under any of `keys`.
    pub fn get_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|k| self.0.get(*k).and_then(Value::as_str))
    }

    /// First boolean found under any of `keys`. Strings "true"/"1" count as true.
    pub fn get_bool(&self, keys: &[&str]) -> Option<bool> {
        keys.iter().find_map(|k| match self.0.get(*k)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => Some(matches!(s.as_str(), "true" | "1" | "yes")),
            Value::Number(n) => Some(n.as_i64() != Some(0)),
            _ => None,
        })
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

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Parameters an action runs with: its dedicated entry if present,
    /// otherwise the whole map as a flat fallback.
    pub fn for_action(&self, action: &str) -> Parameters {
        match self.0.get(action) {
            Some(Value::Object(entry)) => Parameters(entry.clone()),
            _ => self.clone(),
        }
    }

    /// Copy of `self` with every key of `fragment` written over it.
    pub fn merged_with(&self, fragment: &Parameters) -> Parameters {
        let mut merged = self.0.clone();
        for (key, value) in &fragment.0 {
            merged.insert(key.clone(), value.clone());
        }
        Parameters(merged)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Parameters {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

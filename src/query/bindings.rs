//! Variable bindings produced by query evaluation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FactLogError, FactLogResult};
use crate::value::Value;

/// A binding context: variable name to bound constant value.
///
/// The empty match is the unit of conjunction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Match(BTreeMap<String, Value>);

impl Match {
    /// Creates an empty match.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Binds `name`, replacing any previous binding.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Returns the binding for `name`, or a callback error if it is unbound.
    ///
    /// Rule bodies use this with `?` so a missing binding aborts the rule
    /// instead of panicking.
    pub fn require(&self, name: &str) -> FactLogResult<&Value> {
        self.get(name)
            .ok_or_else(|| FactLogError::callback(format!("variable '{name}' is not bound")))
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_float)
    }

    /// Deserializes a structured binding into a typed payload.
    pub fn get_typed<T: serde::de::DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(Value::to_typed)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// JSON object rendering used by logs and diagnostics.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Match {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

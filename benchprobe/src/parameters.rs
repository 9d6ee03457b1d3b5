//! Parameter Sets

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One set of benchmark parameters yielded by a user parameter provider.
///
/// The content is whatever the provider produced: usually a map of
/// parameter names to values, sometimes a positional list. It is passed
/// through untouched, with map key order preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(Value);

impl ParameterSet {
    /// Wrap a decoded value
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Named parameter, for map-shaped sets
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.as_object().and_then(|map| map.get(name))
    }

    /// Positional parameter, for list-shaped sets
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.0.as_array().and_then(|list| list.get(index))
    }

    /// Parameter names in declaration order; empty for list-shaped sets
    pub fn names(&self) -> Vec<&str> {
        self.0
            .as_object()
            .map(|map| map.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Underlying value
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume into the underlying value
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for ParameterSet {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

//! Construction parameters handed to implementation factories

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DIError, DIResult};

/// Fixed construction parameters stored with a registration.
///
/// Values are JSON values so the same map can come from code or from a
/// wiring profile. Factories receive the map by reference on every
/// construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstructionParams(Map<String, Value>);

impl ConstructionParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter, replacing any previous value under the same name
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Get a string parameter, failing when it is absent or not a string
    pub fn require_str(&self, name: &str) -> DIResult<&str> {
        match self.0.get(name) {
            Some(Value::String(value)) => Ok(value),
            Some(other) => Err(DIError::invalid_parameter(
                name,
                format!("expected a string, found {}", other),
            )),
            None => Err(DIError::invalid_parameter(name, "parameter is missing")),
        }
    }

    /// Deserialize a single parameter into `T`
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> DIResult<Option<T>> {
        self.0
            .get(name)
            .map(|value| {
                serde_json::from_value(value.clone())
                    .map_err(|e| DIError::invalid_parameter(name, e.to_string()))
            })
            .transpose()
    }

    /// Deserialize the whole map into a settings struct
    pub fn deserialize<T: DeserializeOwned>(&self) -> DIResult<T> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| DIError::invalid_parameter("*", e.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ConstructionParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K, V> FromIterator<(K, V)> for ConstructionParams
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

//! Source descriptors
//!
//! A source is a tagged union keyed by its `type` field. The engine only
//! ever looks at the tag; every other field belongs to the handler that the
//! tag selects, which decodes them into its own typed parameters.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::HandlerError;

/// One candidate location for a dataset's content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Handler tag (`http`, `file`, `command`, `git`, ...)
    #[serde(rename = "type")]
    pub kind: String,

    /// Handler-owned fields, opaque to the engine
    #[serde(flatten)]
    pub params: BTreeMap<String, Value>,
}

impl SourceSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    /// Builder-style helper for a string parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), Value::String(value.into()));
        self
    }

    /// A parameter's value if it is present and a string.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// Decode the handler-owned fields into a typed parameter struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        let mapping: Mapping = self
            .params
            .iter()
            .map(|(k, v)| (Value::String(k.clone()), v.clone()))
            .collect();
        serde_yaml::from_value(Value::Mapping(mapping))
            .map_err(|e| HandlerError::invalid(&self.kind, e.to_string()))
    }
}

impl std::fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let locator = ["url", "path", "fingerprint_cmd"]
            .iter()
            .find_map(|key| self.param_str(key));
        match locator {
            Some(locator) => write!(f, "{}:{}", self.kind, locator),
            None => write!(f, "{}", self.kind),
        }
    }
}

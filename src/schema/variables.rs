use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::value::Value;

/// The flat name → scalar mapping that conditions and placeholders read.
///
/// Built once per generation pass and never mutated while templates are
/// being selected or rendered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables {
    values: FxHashMap<String, Value>,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Looks up a name. A present-but-null entry is returned as `Value::Null`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse a JSON object of scalars.
    pub fn from_json(input: &str) -> Result<Variables, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Load a JSON object of scalars from a file.
    pub fn load_json(path: &Path) -> Result<Variables, VariablesError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&contents)?)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Variables::new();
        for (k, v) in iter {
            vars.insert(k, v);
        }
        vars
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VariablesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

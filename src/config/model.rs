use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

/// The rule document after syntactic validation, before any regex is
/// compiled or decider is built.
#[derive(Debug, Clone, Default)]
pub struct RuleDocument {
    pub bouncers: Vec<BouncerSpec>,
}

#[derive(Debug, Clone)]
pub struct BouncerSpec {
    pub id: Arc<str>,
    pub method: Arc<str>,
    pub uri_regex: String,
    pub dry_run: bool,
    pub deciders: Vec<DeciderSpec>,
}

#[derive(Debug, Clone)]
pub struct DeciderSpec {
    pub name: Arc<str>,
    pub params: DeciderParams,
}

/// Free-form parameters of one decider, as written under `config:`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct DeciderParams(BTreeMap<String, Value>);

impl DeciderParams {
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Deserializes the parameters into a decider's typed parameter struct.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let mapping: Mapping = self
            .0
            .iter()
            .map(|(key, value)| (Value::String(key.clone()), value.clone()))
            .collect();
        serde_yaml::from_value(Value::Mapping(mapping)).context("invalid decider parameters")
    }
}

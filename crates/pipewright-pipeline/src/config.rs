//! Per-agent configuration lookup.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use pipewright_types::{PipewrightError, Result};

/// Source of agent configuration objects, keyed by agent name.
pub trait ConfigSource: Send + Sync {
    fn agent_config(&self, agent_name: &str) -> Option<Value>;
}

/// In-memory configs, usually loaded from a JSON object keyed by agent name.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigs {
    configs: HashMap<String, Value>,
}

impl StaticConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, agent_name: impl Into<String>, config: Value) -> Self {
        self.configs.insert(agent_name.into(), config);
        self
    }

    /// `{ "Writer": { "engine": "anthropic", ... }, ... }`
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self {
                configs: map.into_iter().collect(),
            }),
            other => Err(PipewrightError::Config(format!(
                "agent configs must be a JSON object keyed by agent name, got {other}"
            ))),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_value(serde_json::from_str(&data)?)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

impl ConfigSource for StaticConfigs {
    fn agent_config(&self, agent_name: &str) -> Option<Value> {
        self.configs.get(agent_name).cloned()
    }
}

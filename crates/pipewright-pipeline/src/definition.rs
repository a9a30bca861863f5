//! Serialized pipeline definitions.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use pipewright_types::Result;

/// A pipeline as authored: nodes, edges, optional explicit start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
    #[serde(default, alias = "start", skip_serializing_if = "Option::is_none")]
    pub start_id: Option<String>,
}

impl PipelineDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            ..Default::default()
        }
    }

    pub fn node(mut self, node: NodeDefinition) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn edge(mut self, edge: EdgeDefinition) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn with_start(mut self, start_id: impl Into<String>) -> Self {
        self.start_id = Some(start_id.into());
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }
}

/// Whether a node fans out to all successors or picks by condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    Task,
    Router,
}

/// What to do once a node has exhausted its retries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OnError {
    #[default]
    Fail,
    Skip,
    Route(String),
}

impl OnError {
    /// `"fail"`, `"skip"`, or `"route:<nodeId>"`. Anything else means fail.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s {
            "skip" => OnError::Skip,
            _ => match s.strip_prefix("route:").map(str::trim) {
                Some(target) if !target.is_empty() => OnError::Route(target.to_string()),
                _ => OnError::Fail,
            },
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            OnError::Fail => "fail".into(),
            OnError::Skip => "skip".into(),
            OnError::Route(target) => format!("route:{target}"),
        }
    }
}

impl Serialize for OnError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_string())
    }
}

impl<'de> Deserialize<'de> for OnError {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(OnError::parse).unwrap_or_default())
    }
}

fn default_retries() -> u32 {
    1
}

/// One step of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDefinition {
    pub id: String,
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default, alias = "agent")]
    pub agent_name: String,
    /// Attempts, including the first. Values below 1 run once.
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default)]
    pub on_error: OnError,
    #[serde(default, rename = "override", skip_serializing_if = "Option::is_none")]
    pub override_payload: Option<serde_json::Map<String, serde_json::Value>>,
}

impl NodeDefinition {
    pub fn task(id: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Task,
            agent_name: agent_name.into(),
            retries: 1,
            on_error: OnError::Fail,
            override_payload: None,
        }
    }

    pub fn router(id: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Router,
            ..Self::task(id, agent_name)
        }
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn on_error(mut self, policy: OnError) -> Self {
        self.on_error = policy;
        self
    }

    pub fn with_override(mut self, value: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = value {
            self.override_payload = Some(map);
        }
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.max(1)
    }
}

/// A directed edge, optionally guarded by a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    #[serde(default)]
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<serde_json::Value>,
}

impl EdgeDefinition {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        let from = from.into();
        let to = to.into();
        Self {
            id: format!("{from}->{to}"),
            from,
            to,
            condition: None,
        }
    }

    pub fn when(mut self, condition: impl Into<serde_json::Value>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_definition() {
        let def = PipelineDefinition::from_json_str(
            r#"{
                "id": "p1",
                "name": "Demo",
                "start": "n1",
                "nodes": [
                    {"id": "n1", "agentName": "Writer", "retries": 3, "onError": "route:n3",
                     "override": {"tone": "dry"}},
                    {"id": "n2", "kind": "router", "agentName": "StyleGuard", "onError": "skip"},
                    {"id": "n3", "agentName": "Uploader"}
                ],
                "edges": [
                    {"id": "e1", "from": "n1", "to": "n2"},
                    {"id": "e2", "from": "n2", "to": "n3", "condition": "status==ok"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(def.start_id.as_deref(), Some("n1"));
        assert_eq!(def.nodes[0].on_error, OnError::Route("n3".into()));
        assert_eq!(def.nodes[0].override_payload.as_ref().unwrap()["tone"], "dry");
        assert_eq!(def.nodes[1].kind, NodeKind::Router);
        assert_eq!(def.nodes[1].on_error, OnError::Skip);
        assert_eq!(def.nodes[2].retries, 1);
        assert_eq!(def.nodes[2].on_error, OnError::Fail);
        assert_eq!(def.edges[1].condition, Some(json!("status==ok")));
    }

    #[test]
    fn unknown_on_error_means_fail() {
        assert_eq!(OnError::parse("explode"), OnError::Fail);
        assert_eq!(OnError::parse("route:"), OnError::Fail);
        assert_eq!(OnError::parse(" route: n9 "), OnError::Route("n9".into()));
    }

    #[test]
    fn retries_are_clamped() {
        let node = NodeDefinition::task("n", "Writer").with_retries(0);
        assert_eq!(node.max_attempts(), 1);
    }

    #[test]
    fn on_error_round_trips_as_string() {
        let node = NodeDefinition::task("n", "Writer").on_error(OnError::Route("x".into()));
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["onError"], "route:x");
    }
}

//! Pipeline validation: lint rules and diagnostics.
//!
//! [`validate`] returns advisory diagnostics; [`validate_or_raise`] fails with a
//! structural error on the first `Error`-severity issue. Warnings never block a
//! run.

use std::collections::HashSet;

use serde::Serialize;

use pipewright_types::{PipewrightError, Result};

use crate::agent::AgentRegistry;
use crate::condition::EdgeCondition;
use crate::definition::{OnError, PipelineDefinition};
use crate::graph::PipelineGraph;

// ---------------------------------------------------------------------------
// Diagnostic types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Diagnostic {
    fn error(rule: &str, message: String) -> Self {
        Self {
            rule: rule.into(),
            severity: Severity::Error,
            message,
            node_id: None,
            edge_id: None,
        }
    }

    fn warning(rule: &str, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(rule, message)
        }
    }

    fn node(mut self, id: &str) -> Self {
        self.node_id = Some(id.into());
        self
    }

    fn edge(mut self, id: &str) -> Self {
        self.edge_id = Some(id.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

fn node_rules(def: &PipelineDefinition, agents: Option<&AgentRegistry>, out: &mut Vec<Diagnostic>) {
    if def.nodes.is_empty() {
        out.push(Diagnostic::error("non_empty", "Pipeline has no nodes".into()));
        return;
    }

    let mut seen = HashSet::new();
    for node in &def.nodes {
        if !seen.insert(node.id.as_str()) {
            out.push(
                Diagnostic::error("unique_ids", format!("Duplicate node id '{}'", node.id)).node(&node.id),
            );
        }
    }

    if let Some(ref start) = def.start_id {
        if !seen.contains(start.as_str()) {
            out.push(Diagnostic::error(
                "start_exists",
                format!("Start node '{start}' does not exist"),
            ));
        }
    }

    for node in &def.nodes {
        if let OnError::Route(ref target) = node.on_error {
            if !seen.contains(target.as_str()) {
                out.push(
                    Diagnostic::warning(
                        "route_target_exists",
                        format!("Node '{}' routes errors to unknown node '{target}'", node.id),
                    )
                    .node(&node.id),
                );
            }
        }
        if let Some(agents) = agents {
            if !agents.has(&node.agent_name) {
                out.push(
                    Diagnostic::warning(
                        "agent_registered",
                        format!("Node '{}' uses unregistered agent '{}'", node.id, node.agent_name),
                    )
                    .node(&node.id),
                );
            }
        }
    }
}

fn edge_rules(def: &PipelineDefinition, out: &mut Vec<Diagnostic>) {
    let ids: HashSet<&str> = def.nodes.iter().map(|n| n.id.as_str()).collect();
    for edge in &def.edges {
        for end in [&edge.from, &edge.to] {
            if !ids.contains(end.as_str()) {
                out.push(
                    Diagnostic::warning(
                        "edge_target_exists",
                        format!("Edge '{}' references unknown node '{end}'", edge.id),
                    )
                    .edge(&edge.id),
                );
            }
        }
        if let Some(EdgeCondition::Invalid(reason)) =
            edge.condition.as_ref().and_then(EdgeCondition::compile)
        {
            out.push(
                Diagnostic::warning(
                    "condition_syntax",
                    format!("Edge '{}' has a condition that never matches: {reason}", edge.id),
                )
                .edge(&edge.id),
            );
        }
    }
}

fn reachability_rule(def: &PipelineDefinition, out: &mut Vec<Diagnostic>) {
    let Ok(graph) = PipelineGraph::from_definition(def) else {
        return;
    };
    let reachable = graph.reachable();
    let mut route_targets: HashSet<&str> = HashSet::new();
    for node in graph.all_nodes() {
        if let OnError::Route(ref target) = node.on_error {
            route_targets.insert(target.as_str());
        }
    }
    for node in graph.all_nodes() {
        if !reachable.contains(&node.id) && !route_targets.contains(node.id.as_str()) {
            out.push(
                Diagnostic::warning(
                    "reachability",
                    format!("Node '{}' is not reachable from start '{}'", node.id, graph.start_id()),
                )
                .node(&node.id),
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run every rule. Pass the agent registry to also check agent names.
pub fn validate(def: &PipelineDefinition, agents: Option<&AgentRegistry>) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    node_rules(def, agents, &mut diagnostics);
    edge_rules(def, &mut diagnostics);
    if !diagnostics.iter().any(|d| d.severity == Severity::Error) {
        reachability_rule(def, &mut diagnostics);
    }
    diagnostics
}

/// Run every rule; return `Err` if any `Error`-severity diagnostic is found.
pub fn validate_or_raise(def: &PipelineDefinition, agents: Option<&AgentRegistry>) -> Result<Vec<Diagnostic>> {
    let diagnostics = validate(def, agents);
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .map(|d| d.message.clone())
        .collect();
    if !errors.is_empty() {
        return Err(PipewrightError::Structure(errors.join("; ")));
    }
    Ok(diagnostics)
}

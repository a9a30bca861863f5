use std::collections::{HashMap, HashSet};

use pipewright_types::{PipewrightError, Result};

use crate::condition::EdgeCondition;
use crate::definition::{EdgeDefinition, NodeDefinition, PipelineDefinition};

/// Indexed, read-only view of a [`PipelineDefinition`] used by the executor.
#[derive(Debug, Clone)]
pub struct PipelineGraph {
    pub id: String,
    pub name: String,
    start_id: String,
    /// Declaration order.
    order: Vec<String>,
    nodes: HashMap<String, NodeDefinition>,
    edges: Vec<PipelineEdge>,
    /// Maps node_id to the indices of its outgoing edges, in declaration order.
    adjacency: HashMap<String, Vec<usize>>,
}

/// An edge with its condition compiled.
#[derive(Debug, Clone)]
pub struct PipelineEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub condition: Option<EdgeCondition>,
}

impl From<&EdgeDefinition> for PipelineEdge {
    fn from(def: &EdgeDefinition) -> Self {
        PipelineEdge {
            id: def.id.clone(),
            from: def.from.clone(),
            to: def.to.clone(),
            condition: def.condition.as_ref().and_then(EdgeCondition::compile),
        }
    }
}

impl PipelineGraph {
    /// Index a definition. Fails only on structural errors: no nodes, or an
    /// explicit start that names no node. Duplicate ids keep the first
    /// declaration.
    pub fn from_definition(def: &PipelineDefinition) -> Result<Self> {
        if def.nodes.is_empty() {
            return Err(PipewrightError::Structure(format!(
                "pipeline '{}' has no nodes",
                def.id
            )));
        }

        let mut order = Vec::with_capacity(def.nodes.len());
        let mut nodes = HashMap::with_capacity(def.nodes.len());
        for node in &def.nodes {
            if !nodes.contains_key(&node.id) {
                order.push(node.id.clone());
                nodes.insert(node.id.clone(), node.clone());
            }
        }

        let edges: Vec<PipelineEdge> = def.edges.iter().map(PipelineEdge::from).collect();
        let mut adjacency: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, edge) in edges.iter().enumerate() {
            adjacency.entry(edge.from.clone()).or_default().push(i);
        }

        let start_id = resolve_start(def, &order, &nodes, &edges)?;

        Ok(PipelineGraph {
            id: def.id.clone(),
            name: def.name.clone(),
            start_id,
            order,
            nodes,
            edges,
            adjacency,
        })
    }

    pub fn start_id(&self) -> &str {
        &self.start_id
    }

    pub fn node(&self, id: &str) -> Option<&NodeDefinition> {
        self.nodes.get(id)
    }

    /// Nodes in declaration order.
    pub fn all_nodes(&self) -> impl Iterator<Item = &NodeDefinition> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn all_edges(&self) -> &[PipelineEdge] {
        &self.edges
    }

    pub fn outgoing_edges(&self, node_id: &str) -> impl Iterator<Item = &PipelineEdge> {
        self.adjacency
            .get(node_id)
            .into_iter()
            .flatten()
            .map(|&i| &self.edges[i])
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    /// Node ids reachable from the start node by following edges.
    pub fn reachable(&self) -> HashSet<String> {
        let mut seen = HashSet::new();
        let mut stack = vec![self.start_id.clone()];
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            for edge in self.outgoing_edges(&id) {
                if !seen.contains(&edge.to) {
                    stack.push(edge.to.clone());
                }
            }
        }
        seen
    }
}

fn resolve_start(
    def: &PipelineDefinition,
    order: &[String],
    nodes: &HashMap<String, NodeDefinition>,
    edges: &[PipelineEdge],
) -> Result<String> {
    if let Some(ref explicit) = def.start_id {
        if nodes.contains_key(explicit) {
            return Ok(explicit.clone());
        }
        return Err(PipewrightError::Structure(format!(
            "start node '{explicit}' does not exist"
        )));
    }

    let first = order
        .first()
        .cloned()
        .ok_or_else(|| PipewrightError::Structure("pipeline has no nodes".into()))?;
    if edges.is_empty() {
        return Ok(first);
    }
    let targets: HashSet<&str> = edges.iter().map(|e| e.to.as_str()).collect();
    Ok(order
        .iter()
        .find(|id| !targets.contains(id.as_str()))
        .cloned()
        .unwrap_or(first))
}

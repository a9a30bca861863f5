//! Pipeline execution engine: the work-queue traversal loop.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use pipewright_providers::Providers;
use pipewright_types::{BackoffPolicy, LogEvent, Payload, PipewrightError, Result};

use crate::agent::{Agent, AgentRegistry};
use crate::artifacts::ArtifactStore;
use crate::config::{ConfigSource, StaticConfigs};
use crate::context::RunContext;
use crate::definition::{NodeDefinition, NodeKind, OnError, PipelineDefinition};
use crate::graph::PipelineGraph;
use crate::log::{EventLog, RunLog};
use crate::retry::execute_with_retry;
use crate::validation::validate_or_raise;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Executor-wide settings.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Runs write under `<artifacts_root>/<runId>/`.
    pub artifacts_root: PathBuf,
    /// Delay between failed node attempts.
    pub node_backoff: BackoffPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            artifacts_root: PathBuf::from("artifacts"),
            node_backoff: BackoffPolicy::default(),
        }
    }
}

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Use this run id instead of a fresh UUID.
    pub run_id: Option<String>,
    /// Merged into every node's execution payload, below the node's own override.
    pub override_payload: Option<Payload>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult {
    pub id: String,
    pub status: NodeStatus,
    pub attempts: u32,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunError {
    pub node_id: String,
    pub message: String,
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub run_id: String,
    pub status: RunStatus,
    pub payload: Payload,
    pub node_results: Vec<NodeResult>,
    /// Every artifact the run wrote, including those from failed attempts.
    pub artifacts: Vec<String>,
    pub artifacts_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    /// The run's structured events, in emission order.
    #[serde(skip)]
    pub events: Vec<LogEvent>,
}

impl RunResult {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn node(&self, id: &str) -> Option<&NodeResult> {
        self.node_results.iter().find(|n| n.id == id)
    }

    pub fn events_named<'a>(&'a self, event: &'a str) -> impl Iterator<Item = &'a LogEvent> + 'a {
        self.events.iter().filter(move |e| e.event == event)
    }
}

// ---------------------------------------------------------------------------
// PipelineExecutor
// ---------------------------------------------------------------------------

/// Runs pipeline definitions. Shared, read-only state (agents, providers,
/// configs, event log) lives here; everything per-run lives in a [`RunContext`].
pub struct PipelineExecutor {
    agents: AgentRegistry,
    providers: Arc<Providers>,
    configs: Arc<dyn ConfigSource>,
    event_log: Arc<EventLog>,
    config: ExecutorConfig,
}

impl PipelineExecutor {
    pub fn new(agents: AgentRegistry, providers: Arc<Providers>, config: ExecutorConfig) -> Self {
        Self {
            agents,
            providers,
            configs: Arc::new(StaticConfigs::new()),
            event_log: Arc::new(EventLog::new()),
            config,
        }
    }

    pub fn with_configs(mut self, configs: Arc<dyn ConfigSource>) -> Self {
        self.configs = configs;
        self
    }

    pub fn with_event_log(mut self, event_log: Arc<EventLog>) -> Self {
        self.event_log = event_log;
        self
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn providers(&self) -> &Arc<Providers> {
        &self.providers
    }

    pub fn event_log(&self) -> &Arc<EventLog> {
        &self.event_log
    }

    /// Run `def` to completion on `input`.
    ///
    /// Returns `Err` only for structural problems with the definition; node
    /// failures are reported through [`RunResult::status`].
    pub async fn run(&self, def: &PipelineDefinition, input: Payload, options: RunOptions) -> Result<RunResult> {
        validate_or_raise(def, None)?;
        let graph = PipelineGraph::from_definition(def)?;

        let run_id = options
            .run_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        check_run_id(&run_id)?;
        let store = ArtifactStore::new(&self.config.artifacts_root, &run_id);
        let artifacts_dir = store.dir().to_path_buf();
        let ctx = RunContext::new(
            RunLog::new(run_id.clone(), self.event_log.clone()),
            store,
            self.configs.clone(),
            self.providers.clone(),
        );
        let ambient = options.override_payload.unwrap_or_default();

        tracing::info!(run_id = %run_id, pipeline = %graph.id, nodes = graph.node_count(), "Pipeline run starting");
        ctx.log(
            "pipeline:start",
            json!({
                "pipelineId": graph.id,
                "name": graph.name,
                "nodeCount": graph.node_count(),
                "startId": graph.start_id(),
            }),
        );

        let mut payload = input;
        let mut queue: VecDeque<String> = VecDeque::from([graph.start_id().to_string()]);
        let mut visited: HashSet<String> = HashSet::new();
        let mut node_results: Vec<NodeResult> = Vec::new();
        let mut failure: Option<RunError> = None;

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id.clone()) {
                continue;
            }
            let Some(node) = graph.node(&id) else {
                ctx.log("node:missing", json!({"nodeId": id}));
                continue;
            };
            let Some(agent) = self.agents.get(&node.agent_name) else {
                ctx.log(
                    "node:skipped",
                    json!({
                        "nodeId": node.id,
                        "agent": node.agent_name,
                        "reason": "agent-not-registered",
                    }),
                );
                node_results.push(NodeResult {
                    id: node.id.clone(),
                    status: NodeStatus::Skipped,
                    attempts: 0,
                    finished_at: Utc::now(),
                    error: None,
                });
                queue.extend(next_ids(&graph, node, &payload));
                continue;
            };

            let mut exec_payload = payload.merged(&ambient);
            if let Some(ref node_override) = node.override_payload {
                exec_payload.merge(Payload::from(node_override.clone()));
            }

            let mark = ctx.artifacts().mark();
            let (attempts, result) = self.execute_node(node, agent.as_ref(), &exec_payload, &ctx).await;

            match result {
                Ok(partial) => {
                    payload.merge(partial);
                    payload.merge_artifacts(ctx.artifacts().written_since(mark));
                    ctx.log(
                        "node:completed",
                        json!({"nodeId": node.id, "agent": node.agent_name, "attempts": attempts}),
                    );
                    node_results.push(NodeResult {
                        id: node.id.clone(),
                        status: NodeStatus::Completed,
                        attempts,
                        finished_at: Utc::now(),
                        error: None,
                    });
                    queue.extend(next_ids(&graph, node, &payload));
                }
                Err(message) => {
                    node_results.push(NodeResult {
                        id: node.id.clone(),
                        status: NodeStatus::Failed,
                        attempts,
                        finished_at: Utc::now(),
                        error: Some(message.clone()),
                    });
                    match node.on_error {
                        OnError::Skip => {
                            tracing::info!(run_id = %run_id, node = %node.id, "Node failed, skipping");
                        }
                        OnError::Route(ref target) => {
                            tracing::info!(run_id = %run_id, node = %node.id, target = %target, "Node failed, routing");
                            queue.push_back(target.clone());
                        }
                        OnError::Fail => {
                            failure = Some(RunError {
                                node_id: node.id.clone(),
                                message,
                            });
                            break;
                        }
                    }
                }
            }
        }

        let status = if failure.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        let artifacts = ctx.artifacts().written();
        match failure {
            Some(ref err) => {
                ctx.log(
                    "pipeline:failed",
                    json!({"nodeId": err.node_id, "message": err.message, "artifacts": artifacts.len()}),
                );
            }
            None => {
                ctx.log(
                    "pipeline:completed",
                    json!({"nodes": node_results.len(), "artifacts": artifacts.len()}),
                );
            }
        }

        Ok(RunResult {
            run_id,
            status,
            payload,
            node_results,
            artifacts,
            artifacts_dir,
            error: failure,
            events: ctx.events(),
        })
    }

    /// Invoke the node's agent with retries. Returns the attempt count and the
    /// partial payload or the last error message.
    async fn execute_node(
        &self,
        node: &NodeDefinition,
        agent: &dyn Agent,
        payload: &Payload,
        ctx: &RunContext,
    ) -> (u32, std::result::Result<Payload, String>) {
        let node_id = node.id.as_str();
        let agent_name = node.agent_name.as_str();

        let outcome = execute_with_retry(
            move |attempt| async move {
                ctx.log(
                    "node:start",
                    json!({"nodeId": node_id, "agent": agent_name, "attempt": attempt}),
                );
                let result = agent.execute(payload, ctx).await;
                if let Err(ref e) = result {
                    ctx.log(
                        "node:error",
                        json!({
                            "nodeId": node_id,
                            "agent": agent_name,
                            "attempt": attempt,
                            "code": e.code(),
                            "message": e.to_string(),
                        }),
                    );
                }
                result
            },
            node.max_attempts(),
            &self.config.node_backoff,
            node_id,
        )
        .await;

        (outcome.attempts, outcome.result.map_err(|e| e.to_string()))
    }
}

/// A run id names the run directory, so it must be a single path segment of
/// `[A-Za-z0-9._-]`.
fn check_run_id(run_id: &str) -> Result<()> {
    let valid = !matches!(run_id, "" | "." | "..")
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(PipewrightError::Config(format!("invalid run id '{run_id}'")))
    }
}

/// Successors to enqueue after `node` ran (or was skipped) with `payload`.
fn next_ids(graph: &PipelineGraph, node: &NodeDefinition, payload: &Payload) -> Vec<String> {
    let edges: Vec<_> = graph.outgoing_edges(&node.id).collect();
    match node.kind {
        NodeKind::Task => edges.iter().map(|e| e.to.clone()).collect(),
        NodeKind::Router => {
            let matched: Vec<String> = edges
                .iter()
                .filter(|e| e.condition.as_ref().is_some_and(|c| c.evaluate(payload)))
                .map(|e| e.to.clone())
                .collect();
            if !matched.is_empty() {
                return matched;
            }
            edges
                .iter()
                .filter(|e| e.condition.is_none())
                .map(|e| e.to.clone())
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::EdgeDefinition;

    fn router_graph(conditions: &[(&str, Option<&str>)]) -> (PipelineGraph, NodeDefinition) {
        let router = NodeDefinition::router("r", "StyleGuard");
        let mut def = PipelineDefinition::new("p").node(router.clone());
        for (to, cond) in conditions {
            def = def.node(NodeDefinition::task(*to, "Uploader"));
            let edge = EdgeDefinition::new("r", *to);
            def = def.edge(match cond {
                Some(c) => edge.when(*c),
                None => edge,
            });
        }
        (PipelineGraph::from_definition(&def).unwrap(), router)
    }

    fn payload(value: serde_json::Value) -> Payload {
        Payload::from_value(value).unwrap()
    }

    #[test]
    fn router_enqueues_matching_edges() {
        let (graph, router) = router_graph(&[("a", Some("status==ok")), ("b", None)]);
        assert_eq!(next_ids(&graph, &router, &payload(json!({"status": "ok"}))), ["a"]);
    }

    #[test]
    fn router_falls_through_to_unconditional_edges() {
        let (graph, router) = router_graph(&[("a", Some("status==ok")), ("b", None)]);
        assert_eq!(
            next_ids(&graph, &router, &payload(json!({"status": "needs_revision"}))),
            ["b"]
        );
    }

    #[test]
    fn router_with_no_match_and_no_fallthrough_stops() {
        let (graph, router) = router_graph(&[("a", Some("status==ok")), ("b", Some("status==bad"))]);
        assert!(next_ids(&graph, &router, &payload(json!({}))).is_empty());
    }

    #[test]
    fn task_enqueues_every_edge() {
        let def = PipelineDefinition::new("p")
            .node(NodeDefinition::task("t", "Writer"))
            .node(NodeDefinition::task("a", "Uploader"))
            .node(NodeDefinition::task("b", "Uploader"))
            .edge(EdgeDefinition::new("t", "a").when("status==never"))
            .edge(EdgeDefinition::new("t", "b"));
        let graph = PipelineGraph::from_definition(&def).unwrap();
        let task = graph.node("t").unwrap().clone();
        assert_eq!(next_ids(&graph, &task, &Payload::new()), ["a", "b"]);
    }

    #[test]
    fn run_ids_must_be_one_plain_segment() {
        for ok in ["run-1", "2024.10.19_a", "0b5e6f1c-7a2d-4c1e-9f3a-8d2b1c0e4f5a"] {
            assert!(check_run_id(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in ["", ".", "..", "../escaped", "/tmp/outside", "a/b", "a\\b", "run id"] {
            assert!(matches!(check_run_id(bad), Err(PipewrightError::Config(_))), "{bad} should be rejected");
        }
    }
}

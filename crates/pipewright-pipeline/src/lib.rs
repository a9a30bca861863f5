//! Pipeline graph executor, agents, run context, and validation.
//!
//! A pipeline is a JSON graph of agent steps. [`PipelineExecutor::run`] walks it
//! with a work queue: each node runs at most once, retries up to its budget, then
//! applies its `onError` policy. Router nodes pick successors by evaluating edge
//! conditions against the payload. Agents reach providers, artifacts and the run
//! log only through their [`RunContext`].

pub mod agent;
pub mod agents;
pub mod artifacts;
pub mod condition;
pub mod config;
pub mod context;
pub mod definition;
pub mod engine;
pub mod graph;
pub mod log;
pub mod retry;
pub mod validation;

pub use agent::{default_registry, Agent, AgentRegistry};
pub use agents::{Animator, HumanGate, Illustrator, StyleGuard, Uploader, Writer};
pub use artifacts::{sanitize_path, ArtifactInfo, ArtifactStore};
pub use condition::{evaluate_condition, parse_condition, Clause, ConditionExpr, EdgeCondition, Operator};
pub use config::{ConfigSource, StaticConfigs};
pub use context::RunContext;
pub use definition::{EdgeDefinition, NodeDefinition, NodeKind, OnError, PipelineDefinition};
pub use engine::{
    ExecutorConfig, NodeResult, NodeStatus, PipelineExecutor, RunError, RunOptions, RunResult, RunStatus,
};
pub use graph::{PipelineEdge, PipelineGraph};
pub use log::{EventLog, RunLog};
pub use retry::{execute_with_retry, RetryOutcome};
pub use validation::{validate, validate_or_raise, Diagnostic, Severity};

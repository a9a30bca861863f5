//! Agent trait and agent registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use pipewright_types::{Payload, Result};

use crate::agents::{Animator, HumanGate, Illustrator, StyleGuard, Uploader, Writer};
use crate::context::RunContext;

// ---------------------------------------------------------------------------
// Agent trait
// ---------------------------------------------------------------------------

/// One unit of pipeline work.
///
/// Receives the execution payload and returns a partial payload that the
/// executor merges on top of the running one. Side effects go through the
/// [`RunContext`]. Returning `Err` counts as a failed attempt.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Registry key, e.g. `"Writer"`.
    fn name(&self) -> &str;

    async fn execute(&self, payload: &Payload, ctx: &RunContext) -> Result<Payload>;
}

// ---------------------------------------------------------------------------
// AgentRegistry
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent: impl Agent + 'static) {
        let name = agent.name().to_string();
        self.agents.insert(name, Arc::new(agent));
    }

    /// Register under an explicit key, e.g. an alias for a built-in.
    pub fn register_as(&mut self, name: impl Into<String>, agent: Arc<dyn Agent>) {
        self.agents.insert(name.into(), agent);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.names())
            .finish()
    }
}

/// Registry with every built-in agent.
pub fn default_registry() -> AgentRegistry {
    let mut reg = AgentRegistry::new();
    reg.register(Writer);
    reg.register(Illustrator);
    reg.register(Animator);
    reg.register(StyleGuard);
    reg.register(HumanGate);
    reg.register(Uploader);
    reg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_builtins() {
        let reg = default_registry();
        assert_eq!(
            reg.names(),
            ["Animator", "HumanGate", "Illustrator", "StyleGuard", "Uploader", "Writer"]
        );
        assert!(reg.get("Writer").is_some());
        assert!(!reg.has("Publisher"));
    }

    #[test]
    fn register_as_adds_alias() {
        let mut reg = default_registry();
        let writer = reg.get("Writer").unwrap();
        reg.register_as("Copywriter", writer);
        assert_eq!(reg.get("Copywriter").unwrap().name(), "Writer");
    }
}

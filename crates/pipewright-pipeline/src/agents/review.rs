use async_trait::async_trait;
use serde_json::{json, Value};

use pipewright_types::{Payload, Result};

use crate::agent::Agent;
use crate::context::RunContext;

// ---------------------------------------------------------------------------
// StyleGuard
// ---------------------------------------------------------------------------

/// Checks the writer's draft against `bannedWords` and `maxChars` from config.
pub struct StyleGuard;

fn check_style(text: &str, config: &Value) -> Vec<String> {
    let mut violations = Vec::new();
    if text.trim().is_empty() {
        violations.push("empty draft".to_string());
    }
    let lowered = text.to_lowercase();
    for word in config
        .get("bannedWords")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
    {
        if !word.is_empty() && lowered.contains(&word.to_lowercase()) {
            violations.push(format!("banned word: {word}"));
        }
    }
    if let Some(max) = config.get("maxChars").and_then(Value::as_u64) {
        let chars = text.chars().count() as u64;
        if chars > max {
            violations.push(format!("too long: {chars} > {max} chars"));
        }
    }
    violations
}

#[async_trait]
impl Agent for StyleGuard {
    fn name(&self) -> &str {
        "StyleGuard"
    }

    async fn execute(&self, payload: &Payload, ctx: &RunContext) -> Result<Payload> {
        let config = ctx.agent_config(self.name()).unwrap_or_default();
        let text = payload
            .lookup("writer.text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let violations = check_style(text, &config);
        let passed = violations.is_empty();

        Ok(Payload::new()
            .with("style_guard", json!({"passed": passed, "violations": violations}))
            .with("status", json!(if passed { "ok" } else { "needs_revision" })))
    }
}

// ---------------------------------------------------------------------------
// HumanGate
// ---------------------------------------------------------------------------

/// Approval checkpoint. Reads `approval` from the payload (bool or
/// `"approved"`/`"rejected"`), else config `autoApprove` (default true).
pub struct HumanGate;

fn decision(payload: &Payload, config: &Value) -> bool {
    match payload.get("approval") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "approved" | "approve" | "yes" | "true"),
        _ => config.get("autoApprove").and_then(Value::as_bool).unwrap_or(true),
    }
}

#[async_trait]
impl Agent for HumanGate {
    fn name(&self) -> &str {
        "HumanGate"
    }

    async fn execute(&self, payload: &Payload, ctx: &RunContext) -> Result<Payload> {
        let config = ctx.agent_config(self.name()).unwrap_or_default();
        let label = if decision(payload, &config) { "approved" } else { "rejected" };
        ctx.log("human_gate:decision", json!({"decision": label}));

        Ok(Payload::new()
            .with("human_gate", json!({"decision": label}))
            .with("status", json!(label)))
    }
}

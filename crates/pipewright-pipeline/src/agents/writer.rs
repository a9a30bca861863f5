use async_trait::async_trait;
use serde_json::json;

use pipewright_providers::CallParams;
use pipewright_types::{Payload, Result};

use crate::agent::Agent;
use crate::context::RunContext;

/// Drafts text for the brief via the LLM provider and saves it as
/// `writer/draft.md`.
pub struct Writer;

#[async_trait]
impl Agent for Writer {
    fn name(&self) -> &str {
        "Writer"
    }

    async fn execute(&self, payload: &Payload, ctx: &RunContext) -> Result<Payload> {
        let config = ctx.agent_config(self.name()).unwrap_or_default();
        let subject = super::subject(payload).unwrap_or_else(|| "Untitled".into());

        let mut prompt = format!("Write a short piece about: {subject}");
        if let Some(tone) = payload.get("tone").and_then(|v| v.as_str()) {
            prompt.push_str(&format!("\nTone: {tone}"));
        }
        let mut params = CallParams::prompt(prompt);
        if let Some(system) = config.get("system").and_then(|v| v.as_str()) {
            params = params.with_system(system);
        }
        params.max_tokens = config
            .get("maxTokens")
            .and_then(|v| v.as_u64())
            .map(|n| n.min(u64::from(u32::MAX)) as u32);

        let result = ctx.call_llm(self.name(), &params).await?;
        let text = result.text.clone().unwrap_or_default();
        let artifact = ctx.set_artifact("writer/draft.md", text.as_bytes()).await?;

        Ok(Payload::new().with(
            "writer",
            json!({
                "text": text,
                "provider": result.provider_id,
                "model": result.model,
                "mode": result.mode,
                "artifact": artifact.path,
            }),
        ))
    }
}

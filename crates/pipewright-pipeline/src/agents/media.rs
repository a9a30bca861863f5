use async_trait::async_trait;
use serde_json::json;

use pipewright_providers::{CallParams, ProviderResult};
use pipewright_types::{Payload, Result};

use crate::agent::Agent;
use crate::artifacts::ArtifactInfo;
use crate::context::RunContext;

fn describe(result: &ProviderResult, prompt: &str) -> serde_json::Value {
    json!({
        "url": result.url,
        "mimeType": result.mime_type,
        "provider": result.provider_id,
        "model": result.model,
        "mode": result.mode,
        "prompt": prompt,
    })
}

fn with_artifact(mut described: serde_json::Value, artifact: &ArtifactInfo) -> serde_json::Value {
    described["artifact"] = json!(artifact.path);
    described
}

// ---------------------------------------------------------------------------
// Illustrator
// ---------------------------------------------------------------------------

/// Generates an image for the draft (or the brief).
pub struct Illustrator;

#[async_trait]
impl Agent for Illustrator {
    fn name(&self) -> &str {
        "Illustrator"
    }

    async fn execute(&self, payload: &Payload, ctx: &RunContext) -> Result<Payload> {
        let config = ctx.agent_config(self.name()).unwrap_or_default();
        let prompt = super::visual_prompt(payload);
        let mut params = CallParams::prompt(format!("Illustration for: {prompt}"));
        params.size = config.get("size").and_then(|v| v.as_str()).map(String::from);

        let result = ctx.call_image(self.name(), &params).await?;
        let described = describe(&result, &params.prompt);
        let artifact = ctx
            .set_artifact("illustrator/image.json", serde_json::to_vec_pretty(&described)?)
            .await?;

        Ok(Payload::new().with("illustrator", with_artifact(described, &artifact)))
    }
}

// ---------------------------------------------------------------------------
// Animator
// ---------------------------------------------------------------------------

/// Generates a short video for the draft (or the brief).
pub struct Animator;

#[async_trait]
impl Agent for Animator {
    fn name(&self) -> &str {
        "Animator"
    }

    async fn execute(&self, payload: &Payload, ctx: &RunContext) -> Result<Payload> {
        let config = ctx.agent_config(self.name()).unwrap_or_default();
        let prompt = super::visual_prompt(payload);
        let mut params = CallParams::prompt(format!("Short clip for: {prompt}"));
        params.duration_sec = config
            .get("durationSec")
            .and_then(|v| v.as_u64())
            .map(|n| n.min(600) as u32);

        let result = ctx.call_video(self.name(), &params).await?;
        let described = describe(&result, &params.prompt);
        let artifact = ctx
            .set_artifact("animator/video.json", serde_json::to_vec_pretty(&described)?)
            .await?;

        Ok(Payload::new().with("animator", with_artifact(described, &artifact)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfigs;
    use crate::context::testing::mock_context;
    use pipewright_providers::mock::{MOCK_IMAGE_URI, MOCK_VIDEO_URI};

    #[tokio::test]
    async fn illustrator_uses_writer_text() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = mock_context(dir.path(), StaticConfigs::new());
        let input = Payload::new().with("writer", json!({"text": "A lighthouse at dusk"}));

        let out = Illustrator.execute(&input, &ctx).await.unwrap();
        let illustrator = out.get("illustrator").unwrap();

        assert_eq!(illustrator["url"], MOCK_IMAGE_URI);
        assert_eq!(illustrator["artifact"], "illustrator/image.json");
        assert!(illustrator["prompt"].as_str().unwrap().contains("lighthouse"));
    }

    #[tokio::test]
    async fn animator_writes_video_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = mock_context(dir.path(), StaticConfigs::new());

        let out = Animator
            .execute(&Payload::new().with("topic", json!("waves")), &ctx)
            .await
            .unwrap();

        assert_eq!(out.get("animator").unwrap()["url"], MOCK_VIDEO_URI);
        let saved = std::fs::read_to_string(dir.path().join("test-run/animator/video.json")).unwrap();
        assert!(saved.contains("waves"));
    }
}

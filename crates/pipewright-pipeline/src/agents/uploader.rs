use async_trait::async_trait;
use serde_json::json;

use pipewright_types::{Payload, Result};

use crate::agent::Agent;
use crate::context::RunContext;

const MANIFEST: &str = "uploader/manifest.json";

/// Stages the run's artifacts by writing a manifest. Nothing leaves the host.
pub struct Uploader;

#[async_trait]
impl Agent for Uploader {
    fn name(&self) -> &str {
        "Uploader"
    }

    async fn execute(&self, payload: &Payload, ctx: &RunContext) -> Result<Payload> {
        let artifacts: Vec<String> = payload
            .artifacts()
            .into_iter()
            .filter(|path| path != MANIFEST)
            .collect();
        let manifest = json!({
            "runId": ctx.run_id(),
            "artifacts": artifacts,
        });
        let info = ctx
            .set_artifact(MANIFEST, serde_json::to_vec_pretty(&manifest)?)
            .await?;

        Ok(Payload::new().with(
            "uploader",
            json!({
                "status": "staged",
                "count": artifacts.len(),
                "manifest": info.path,
            }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfigs;
    use crate::context::testing::mock_context;

    #[tokio::test]
    async fn manifest_lists_accumulated_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = mock_context(dir.path(), StaticConfigs::new());
        let mut input = Payload::new();
        input.merge_artifacts(["writer/draft.md", "illustrator/image.json"]);

        let out = Uploader.execute(&input, &ctx).await.unwrap();

        let uploader = out.get("uploader").unwrap();
        assert_eq!(uploader["status"], "staged");
        assert_eq!(uploader["count"], 2);

        let saved: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("test-run").join(MANIFEST)).unwrap(),
        )
        .unwrap();
        assert_eq!(saved["artifacts"][1], "illustrator/image.json");
    }
}

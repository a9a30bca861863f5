//! Per-run context handed to agents.

use std::sync::Arc;

use pipewright_providers::{
    CallParams, EngineRef, EngineResolution, ProviderKind, ProviderResult, Providers,
};
use pipewright_types::{EventSink, LogEvent, Result};

use crate::artifacts::{ArtifactInfo, ArtifactStore};
use crate::config::ConfigSource;
use crate::log::RunLog;

/// Everything an agent may touch during a run: the run log, the run's artifact
/// directory, agent configuration, and the provider layer.
///
/// One per run; never shared between runs.
pub struct RunContext {
    log: RunLog,
    artifacts: ArtifactStore,
    configs: Arc<dyn ConfigSource>,
    providers: Arc<Providers>,
}

impl RunContext {
    pub fn new(
        log: RunLog,
        artifacts: ArtifactStore,
        configs: Arc<dyn ConfigSource>,
        providers: Arc<Providers>,
    ) -> Self {
        Self {
            log,
            artifacts,
            configs,
            providers,
        }
    }

    pub fn run_id(&self) -> &str {
        self.log.run_id()
    }

    pub fn log(&self, event: &str, data: serde_json::Value) {
        self.log.emit(event, data);
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.log.events()
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Write an artifact under the run directory. The path is sanitized.
    pub async fn set_artifact(&self, rel_path: &str, content: impl AsRef<[u8]> + Send) -> Result<ArtifactInfo> {
        self.artifacts.write(rel_path, content.as_ref()).await
    }

    pub fn agent_config(&self, agent_name: &str) -> Option<serde_json::Value> {
        self.configs.agent_config(agent_name)
    }

    pub fn resolve_engine(
        &self,
        agent_name: &str,
        override_engine: Option<EngineRef>,
        kind: ProviderKind,
    ) -> EngineResolution {
        let config = self.agent_config(agent_name);
        self.providers
            .resolve_engine(agent_name, config.as_ref(), override_engine, kind)
    }

    pub async fn call_llm(&self, agent_name: &str, params: &CallParams) -> Result<ProviderResult> {
        self.call(agent_name, ProviderKind::Llm, params).await
    }

    pub async fn call_image(&self, agent_name: &str, params: &CallParams) -> Result<ProviderResult> {
        self.call(agent_name, ProviderKind::Image, params).await
    }

    pub async fn call_video(&self, agent_name: &str, params: &CallParams) -> Result<ProviderResult> {
        self.call(agent_name, ProviderKind::Video, params).await
    }

    async fn call(&self, agent_name: &str, kind: ProviderKind, params: &CallParams) -> Result<ProviderResult> {
        let config = self.agent_config(agent_name);
        self.providers
            .call(agent_name, config.as_ref(), kind, params, &self.log)
            .await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;

    use pipewright_providers::{EnvelopeConfig, HttpTransport, ProviderRegistry, StaticCredentials};

    use super::*;
    use crate::config::StaticConfigs;
    use crate::log::EventLog;

    /// A context with the built-in registry and no credentials: every call is mocked.
    pub(crate) fn mock_context(root: &Path, configs: StaticConfigs) -> RunContext {
        let providers = Providers::new(
            ProviderRegistry::builtin(),
            Arc::new(StaticCredentials::new()),
            Arc::new(HttpTransport::new()),
            EnvelopeConfig::default(),
        );
        RunContext::new(
            RunLog::new("test-run", Arc::new(EventLog::new())),
            ArtifactStore::new(root, "test-run"),
            Arc::new(configs),
            Arc::new(providers),
        )
    }
}

use std::sync::Arc;

use serde_json::json;

use pipewright_types::{EventSink, Result};

use crate::credentials::{CredentialSource, EnvCredentials};
use crate::descriptor::{EngineRef, ProviderKind, ProviderRegistry};
use crate::envelope::{EnvelopeConfig, ResilienceEnvelope};
use crate::mock;
use crate::resolver::{EngineRequest, EngineResolution, ProviderResolver};
use crate::transport::{HttpTransport, ProviderTransport};
use crate::types::{CallParams, ProviderResult};

/// Entry point for agents: resolve an engine, then call it live or in mock mode.
///
/// Built once per process and shared across runs behind an `Arc`.
pub struct Providers {
    resolver: ProviderResolver,
    envelope: ResilienceEnvelope,
}

impl Providers {
    pub fn new(
        registry: ProviderRegistry,
        credentials: Arc<dyn CredentialSource>,
        transport: Arc<dyn ProviderTransport>,
        config: EnvelopeConfig,
    ) -> Self {
        let registry = Arc::new(registry);
        Self {
            resolver: ProviderResolver::new(registry.clone(), credentials),
            envelope: ResilienceEnvelope::new(registry, transport, config),
        }
    }

    /// Production wiring: HTTP transport, environment credentials, default envelope.
    pub fn from_env(registry: ProviderRegistry) -> Self {
        Self::new(
            registry,
            Arc::new(EnvCredentials),
            Arc::new(HttpTransport::new()),
            EnvelopeConfig::default(),
        )
    }

    pub fn registry(&self) -> &ProviderRegistry {
        self.resolver.registry()
    }

    pub fn envelope(&self) -> &ResilienceEnvelope {
        &self.envelope
    }

    pub fn resolve_engine(
        &self,
        agent_name: &str,
        agent_config: Option<&serde_json::Value>,
        override_engine: Option<EngineRef>,
        kind: ProviderKind,
    ) -> EngineResolution {
        let request = EngineRequest::new(agent_name, kind)
            .with_config(agent_config)
            .with_override(override_engine);
        self.resolver.resolve(&request)
    }

    /// Resolve and call. `params.engine` acts as the per-call override.
    pub async fn call(
        &self,
        agent_name: &str,
        agent_config: Option<&serde_json::Value>,
        kind: ProviderKind,
        params: &CallParams,
        sink: &dyn EventSink,
    ) -> Result<ProviderResult> {
        let resolution = self.resolve_engine(agent_name, agent_config, params.engine.clone(), kind);

        if !resolution.is_live() {
            let reason = resolution.reason.as_deref().unwrap_or("mock");
            tracing::info!(
                agent = %agent_name,
                provider = %resolution.provider_id,
                model = %resolution.model,
                reason = %reason,
                "Serving provider call from mock"
            );
            sink.emit(
                "provider:mock",
                json!({
                    "agent": agent_name,
                    "kind": kind,
                    "provider": resolution.provider_id,
                    "model": resolution.model,
                    "reason": reason,
                }),
            );
            return Ok(mock::synthesize(&resolution, kind, params));
        }

        self.envelope.call(&resolution, kind, params, sink).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticCredentials;
    use crate::descriptor::ProviderDescriptor;
    use crate::resolver::EngineMode;
    use crate::types::ProviderOutput;
    use async_trait::async_trait;
    use pipewright_types::BackoffPolicy;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct EchoTransport;

    #[async_trait]
    impl ProviderTransport for EchoTransport {
        async fn send(
            &self,
            descriptor: &ProviderDescriptor,
            resolution: &EngineResolution,
            _kind: ProviderKind,
            params: &CallParams,
        ) -> Result<ProviderOutput> {
            Ok(ProviderOutput {
                text: Some(format!("{}/{}: {}", descriptor.id, resolution.model, params.prompt)),
                ..Default::default()
            })
        }
    }

    #[derive(Default)]
    struct Events(Mutex<Vec<(String, serde_json::Value)>>);

    impl EventSink for Events {
        fn emit(&self, event: &str, data: serde_json::Value) {
            self.0.lock().unwrap().push((event.to_string(), data));
        }
    }

    fn providers(credentials: StaticCredentials) -> Providers {
        let registry = ProviderRegistry::new(
            vec![
                ProviderDescriptor::new("alpha", ProviderKind::Llm)
                    .with_models(["a-1"])
                    .with_credential("ALPHA_KEY"),
                ProviderDescriptor::new("beta", ProviderKind::Llm)
                    .with_models(["b-1"])
                    .with_credential("BETA_KEY"),
            ],
            HashMap::new(),
        )
        .unwrap();
        Providers::new(
            registry,
            Arc::new(credentials),
            Arc::new(EchoTransport),
            EnvelopeConfig {
                backoff: BackoffPolicy::None,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn no_credentials_serves_mock_and_logs_reason() {
        let providers = providers(StaticCredentials::new());
        let events = Events::default();

        let result = providers
            .call("Writer", None, ProviderKind::Llm, &CallParams::prompt("Demo"), &events)
            .await
            .unwrap();

        assert_eq!(result.mode, EngineMode::Mock);
        assert_eq!(result.provider_id, "alpha");
        assert_eq!(result.text.as_deref(), Some("[mock:a-1] Demo"));
        assert_eq!(result.reason.as_deref(), Some("missing-api-key:ALPHA_KEY"));

        let logged = events.0.lock().unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].0, "provider:mock");
        assert_eq!(logged[0].1["reason"], "missing-api-key:ALPHA_KEY");
    }

    #[tokio::test]
    async fn config_fallback_goes_live() {
        let providers = providers(StaticCredentials::new().with("BETA_KEY", "b-secret"));
        let config = json!({"engine": "alpha", "fallbacks": ["beta"]});

        let result = providers
            .call("Writer", Some(&config), ProviderKind::Llm, &CallParams::prompt("go"), &pipewright_types::NullSink)
            .await
            .unwrap();

        assert_eq!(result.mode, EngineMode::Live);
        assert_eq!(result.text.as_deref(), Some("beta/b-1: go"));
    }

    #[tokio::test]
    async fn params_engine_overrides_config() {
        let providers = providers(
            StaticCredentials::new()
                .with("ALPHA_KEY", "a-secret")
                .with("BETA_KEY", "b-secret"),
        );
        let config = json!({"engine": "alpha"});
        let params = CallParams::prompt("go").with_engine(EngineRef::parse("beta:b-2"));

        let result = providers
            .call("Writer", Some(&config), ProviderKind::Llm, &params, &pipewright_types::NullSink)
            .await
            .unwrap();

        assert_eq!(result.provider_id, "beta");
        assert_eq!(result.model, "b-2");
    }

    #[tokio::test]
    async fn missing_kind_uses_synthetic_mock() {
        let providers = providers(StaticCredentials::new());
        let result = providers
            .call("Animator", None, ProviderKind::Video, &CallParams::prompt("waves"), &pipewright_types::NullSink)
            .await
            .unwrap();

        assert_eq!(result.provider_id, "mock");
        assert_eq!(result.model, "mock-video");
        assert_eq!(result.url.as_deref(), Some(mock::MOCK_VIDEO_URI));
    }
}

//! Engine resolution: pick a concrete provider + model from a candidate chain.
//!
//! Candidates are tried in priority order: caller override, the agent's configured
//! engine, the agent's fallback list, then the registry default for the capability.
//! The first candidate whose credential is available wins in live mode. When none
//! has a credential, the first type-matching candidate is returned in mock mode with
//! a reason. Resolution never fails.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::credentials::CredentialSource;
use crate::descriptor::{EngineRef, ProviderKind, ProviderRegistry};

/// Whether calls go to the real provider or to the mock synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    Live,
    Mock,
}

/// Outcome of resolving a capability request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineResolution {
    pub provider_id: String,
    pub model: String,
    pub mode: EngineMode,
    #[serde(skip)]
    pub credential: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl EngineResolution {
    pub fn is_live(&self) -> bool {
        self.mode == EngineMode::Live
    }

    /// Synthetic resolution used when no provider of the requested kind exists.
    pub fn unavailable(kind: ProviderKind) -> Self {
        Self {
            provider_id: "mock".into(),
            model: format!("mock-{kind}"),
            mode: EngineMode::Mock,
            credential: None,
            reason: Some("no-provider-available".into()),
        }
    }
}

impl fmt::Debug for EngineResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineResolution")
            .field("provider_id", &self.provider_id)
            .field("model", &self.model)
            .field("mode", &self.mode)
            .field("credential", &self.credential.as_ref().map(|_| "***"))
            .field("reason", &self.reason)
            .finish()
    }
}

/// Input to [`ProviderResolver::resolve`].
#[derive(Debug, Clone)]
pub struct EngineRequest<'a> {
    pub agent_name: &'a str,
    /// The agent's stored configuration; `engine` and `fallbacks` keys are read.
    pub agent_config: Option<&'a serde_json::Value>,
    pub override_engine: Option<EngineRef>,
    pub required_kind: ProviderKind,
}

impl<'a> EngineRequest<'a> {
    pub fn new(agent_name: &'a str, required_kind: ProviderKind) -> Self {
        Self {
            agent_name,
            agent_config: None,
            override_engine: None,
            required_kind,
        }
    }

    pub fn with_config(mut self, config: Option<&'a serde_json::Value>) -> Self {
        self.agent_config = config;
        self
    }

    pub fn with_override(mut self, engine: Option<EngineRef>) -> Self {
        self.override_engine = engine;
        self
    }
}

/// Resolves engines against a fixed registry and a credential source.
#[derive(Clone)]
pub struct ProviderResolver {
    registry: Arc<ProviderRegistry>,
    credentials: Arc<dyn CredentialSource>,
}

impl ProviderResolver {
    pub fn new(registry: Arc<ProviderRegistry>, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            registry,
            credentials,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Build the ordered candidate chain for a request.
    pub fn candidates(&self, request: &EngineRequest<'_>) -> Vec<EngineRef> {
        let mut chain = Vec::new();
        if let Some(ref engine) = request.override_engine {
            chain.push(engine.clone());
        }
        if let Some(config) = request.agent_config {
            if let Some(engine) = config.get("engine").and_then(EngineRef::from_json) {
                chain.push(engine);
            }
            if let Some(fallbacks) = config.get("fallbacks").and_then(|v| v.as_array()) {
                chain.extend(fallbacks.iter().filter_map(EngineRef::from_json));
            }
        }
        if let Some(engine) = self.registry.default_engine(request.required_kind) {
            chain.push(engine);
        }
        chain
    }

    pub fn resolve(&self, request: &EngineRequest<'_>) -> EngineResolution {
        let mut first_match: Option<EngineResolution> = None;

        for candidate in self.candidates(request) {
            let Some(descriptor) = self.registry.get(&candidate.provider) else {
                tracing::debug!(
                    agent = %request.agent_name,
                    provider = %candidate.provider,
                    "Skipping unknown provider"
                );
                continue;
            };
            if descriptor.kind != request.required_kind {
                continue;
            }

            let model = candidate
                .model
                .clone()
                .or_else(|| candidate.models.first().cloned())
                .or_else(|| descriptor.models.first().cloned())
                .unwrap_or_default();

            let credential = match descriptor.credential_ref {
                None => Ok(None),
                Some(ref reference) => self
                    .credentials
                    .lookup(reference)
                    .map(Some)
                    .ok_or_else(|| reference.clone()),
            };

            match credential {
                Ok(credential) => {
                    return EngineResolution {
                        provider_id: descriptor.id.clone(),
                        model,
                        mode: EngineMode::Live,
                        credential,
                        reason: None,
                    };
                }
                Err(reference) => {
                    if first_match.is_none() {
                        first_match = Some(EngineResolution {
                            provider_id: descriptor.id.clone(),
                            model,
                            mode: EngineMode::Mock,
                            credential: None,
                            reason: Some(format!("missing-api-key:{reference}")),
                        });
                    }
                }
            }
        }

        first_match.unwrap_or_else(|| EngineResolution::unavailable(request.required_kind))
    }
}

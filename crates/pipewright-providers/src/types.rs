use serde::{Deserialize, Serialize};

use crate::descriptor::{EngineRef, ProviderKind};
use crate::resolver::{EngineMode, EngineResolution};

/// Parameters for one provider call, shared by every capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallParams {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Image size, e.g. `"1024x1024"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Requested clip length for video providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<u32>,
    /// Per-call engine override; first in the candidate chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineRef>,
}

impl CallParams {
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_engine(mut self, engine: EngineRef) -> Self {
        self.engine = Some(engine);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// What a provider family produced, before it is tagged with provider/model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderOutput {
    pub text: Option<String>,
    /// Remote URL or `data:` URI for image/video output.
    pub url: Option<String>,
    pub mime_type: Option<String>,
    pub usage: Option<Usage>,
}

/// Result of a provider call. Live and mock calls share this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    pub provider_id: String,
    pub model: String,
    pub mode: EngineMode,
    pub kind: ProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Why the call was served in mock mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ProviderResult {
    pub fn from_output(resolution: &EngineResolution, kind: ProviderKind, output: ProviderOutput) -> Self {
        Self {
            provider_id: resolution.provider_id.clone(),
            model: resolution.model.clone(),
            mode: resolution.mode,
            kind,
            text: output.text,
            url: output.url,
            mime_type: output.mime_type,
            usage: output.usage,
            reason: resolution.reason.clone(),
        }
    }

    pub fn is_mock(&self) -> bool {
        self.mode == EngineMode::Mock
    }
}

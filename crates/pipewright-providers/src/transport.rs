use async_trait::async_trait;

use pipewright_types::{PipewrightError, Result};

use crate::descriptor::{ProviderDescriptor, ProviderFamily, ProviderKind};
use crate::resolver::EngineResolution;
use crate::types::{CallParams, ProviderOutput};
use crate::{anthropic, gemini, media, openai};

// ---------------------------------------------------------------------------
// ProviderTransport
// ---------------------------------------------------------------------------

/// Performs one network attempt against a provider.
///
/// The resilience envelope owns retries, timeouts and circuit accounting; a
/// transport only shapes the request and the response.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    async fn send(
        &self,
        descriptor: &ProviderDescriptor,
        resolution: &EngineResolution,
        kind: ProviderKind,
        params: &CallParams,
    ) -> Result<ProviderOutput>;
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// Production transport: one `reqwest` client, request shaping per family.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn send(
        &self,
        descriptor: &ProviderDescriptor,
        resolution: &EngineResolution,
        kind: ProviderKind,
        params: &CallParams,
    ) -> Result<ProviderOutput> {
        let family = descriptor.family();
        let base_url = descriptor
            .base_url()
            .ok_or_else(|| PipewrightError::Provider {
                provider: descriptor.id.clone(),
                status: 0,
                message: "no baseUrl configured for provider".into(),
                retryable: false,
            })?;

        let builder = match family {
            ProviderFamily::OpenAi => openai::build_request(&self.client, &base_url, resolution, params),
            ProviderFamily::Anthropic => {
                anthropic::build_request(&self.client, &base_url, resolution, params)
            }
            ProviderFamily::Gemini => gemini::build_request(&self.client, &base_url, resolution, params),
            ProviderFamily::OpenAiImages => {
                media::build_image_request(&self.client, &base_url, resolution, params)
            }
            ProviderFamily::Video => media::build_video_request(&self.client, &base_url, resolution, params),
        };

        tracing::debug!(
            provider = %descriptor.id,
            model = %resolution.model,
            family = ?family,
            kind = %kind,
            "Dispatching provider request"
        );

        let resp = builder.send().await.map_err(|e| PipewrightError::Provider {
            provider: descriptor.id.clone(),
            status: 0,
            message: e.to_string(),
            retryable: true,
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| PipewrightError::Provider {
            provider: descriptor.id.clone(),
            status: 0,
            message: e.to_string(),
            retryable: true,
        })?;

        if !status.is_success() {
            return Err(map_error(&descriptor.id, status.as_u16(), &body));
        }

        let json: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| PipewrightError::Provider {
                provider: descriptor.id.clone(),
                status: status.as_u16(),
                message: format!("Failed to parse response JSON: {e}"),
                retryable: false,
            })?;

        let parsed = match family {
            ProviderFamily::OpenAi => openai::parse_response(&json),
            ProviderFamily::Anthropic => anthropic::parse_response(&json),
            ProviderFamily::Gemini => gemini::parse_response(&json),
            ProviderFamily::OpenAiImages => media::parse_image_response(&json),
            ProviderFamily::Video => media::parse_video_response(&json),
        };
        parsed.ok_or_else(|| PipewrightError::Provider {
            provider: descriptor.id.clone(),
            status: status.as_u16(),
            message: "response did not contain any output".into(),
            retryable: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Map a non-2xx response to a provider error carrying the HTTP status.
pub fn map_error(provider: &str, status: u16, body: &str) -> PipewrightError {
    let retryable = matches!(status, 408 | 409 | 425 | 429) || status >= 500;
    PipewrightError::Provider {
        provider: provider.to_string(),
        status,
        message: extract_error_message(body),
        retryable,
    }
}

fn extract_error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        v["error"]["message"]
            .as_str()
            .or_else(|| v["error"].as_str())
            .or_else(|| v["message"].as_str())
            .map(String::from)
    });
    message.unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.chars().count() > 300 {
            format!("{}...", trimmed.chars().take(300).collect::<String>())
        } else {
            trimmed.to_string()
        }
    })
}

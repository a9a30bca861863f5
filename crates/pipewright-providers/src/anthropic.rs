//! Anthropic messages API.

use serde_json::json;

use crate::resolver::EngineResolution;
use crate::types::{CallParams, ProviderOutput, Usage};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub(crate) fn build_request_body(model: &str, params: &CallParams) -> serde_json::Value {
    let mut body = json!({
        "model": model,
        "max_tokens": params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        "messages": [{"role": "user", "content": params.prompt}],
    });
    if let Some(ref system) = params.system {
        body["system"] = json!(system);
    }
    if let Some(temp) = params.temperature {
        body["temperature"] = json!(temp);
    }
    body
}

pub(crate) fn build_request(
    client: &reqwest::Client,
    base_url: &str,
    resolution: &EngineResolution,
    params: &CallParams,
) -> reqwest::RequestBuilder {
    let mut builder = client
        .post(format!("{base_url}/v1/messages"))
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("Content-Type", "application/json")
        .json(&build_request_body(&resolution.model, params));
    if let Some(ref key) = resolution.credential {
        builder = builder.header("x-api-key", key);
    }
    builder
}

pub(crate) fn parse_response(body: &serde_json::Value) -> Option<ProviderOutput> {
    let blocks = body["content"].as_array()?;
    let text: String = blocks
        .iter()
        .filter(|b| b["type"] == "text")
        .filter_map(|b| b["text"].as_str())
        .collect();
    if text.is_empty() {
        return None;
    }
    let usage = body.get("usage").map(|u| Usage {
        input_tokens: u["input_tokens"].as_u64().unwrap_or(0),
        output_tokens: u["output_tokens"].as_u64().unwrap_or(0),
    });
    Some(ProviderOutput {
        text: Some(text),
        url: None,
        mime_type: Some("text/plain".into()),
        usage,
    })
}

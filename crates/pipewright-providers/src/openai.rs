//! OpenAI-compatible chat completions.

use serde_json::json;

use crate::resolver::EngineResolution;
use crate::types::{CallParams, ProviderOutput, Usage};

pub(crate) fn build_request_body(model: &str, params: &CallParams) -> serde_json::Value {
    let mut messages = Vec::new();
    if let Some(ref system) = params.system {
        messages.push(json!({"role": "system", "content": system}));
    }
    messages.push(json!({"role": "user", "content": params.prompt}));

    let mut body = json!({
        "model": model,
        "messages": messages,
    });
    if let Some(max_tokens) = params.max_tokens {
        body["max_tokens"] = json!(max_tokens);
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
        .post(format!("{base_url}/v1/chat/completions"))
        .header("Content-Type", "application/json")
        .json(&build_request_body(&resolution.model, params));
    if let Some(ref key) = resolution.credential {
        builder = builder.bearer_auth(key);
    }
    builder
}

pub(crate) fn parse_response(body: &serde_json::Value) -> Option<ProviderOutput> {
    let text = body["choices"][0]["message"]["content"].as_str()?.to_string();
    let usage = body.get("usage").map(|u| Usage {
        input_tokens: u["prompt_tokens"].as_u64().unwrap_or(0),
        output_tokens: u["completion_tokens"].as_u64().unwrap_or(0),
    });
    Some(ProviderOutput {
        text: Some(text),
        url: None,
        mime_type: Some("text/plain".into()),
        usage,
    })
}

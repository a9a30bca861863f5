//! Google Gemini `generateContent`.

use serde_json::json;

use crate::resolver::EngineResolution;
use crate::types::{CallParams, ProviderOutput, Usage};

pub(crate) fn build_request_body(params: &CallParams) -> serde_json::Value {
    let mut body = json!({
        "contents": [{"role": "user", "parts": [{"text": params.prompt}]}],
    });
    if let Some(ref system) = params.system {
        body["systemInstruction"] = json!({"parts": [{"text": system}]});
    }
    let mut config = serde_json::Map::new();
    if let Some(max_tokens) = params.max_tokens {
        config.insert("maxOutputTokens".into(), json!(max_tokens));
    }
    if let Some(temp) = params.temperature {
        config.insert("temperature".into(), json!(temp));
    }
    if !config.is_empty() {
        body["generationConfig"] = serde_json::Value::Object(config);
    }
    body
}

pub(crate) fn build_request(
    client: &reqwest::Client,
    base_url: &str,
    resolution: &EngineResolution,
    params: &CallParams,
) -> reqwest::RequestBuilder {
    let url = format!(
        "{base_url}/v1beta/models/{}:generateContent",
        resolution.model
    );
    let mut builder = client
        .post(url)
        .header("Content-Type", "application/json")
        .json(&build_request_body(params));
    if let Some(ref key) = resolution.credential {
        builder = builder.query(&[("key", key)]);
    }
    builder
}

pub(crate) fn parse_response(body: &serde_json::Value) -> Option<ProviderOutput> {
    let parts = body["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.is_empty() {
        return None;
    }
    let usage = body.get("usageMetadata").map(|u| Usage {
        input_tokens: u["promptTokenCount"].as_u64().unwrap_or(0),
        output_tokens: u["candidatesTokenCount"].as_u64().unwrap_or(0),
    });
    Some(ProviderOutput {
        text: Some(text),
        url: None,
        mime_type: Some("text/plain".into()),
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_config_only_when_options_set() {
        let plain = build_request_body(&CallParams::prompt("hi"));
        assert!(plain.get("generationConfig").is_none());

        let tuned = build_request_body(&CallParams {
            max_tokens: Some(64),
            ..CallParams::prompt("hi").with_system("sys")
        });
        assert_eq!(tuned["generationConfig"]["maxOutputTokens"], 64);
        assert_eq!(tuned["systemInstruction"]["parts"][0]["text"], "sys");
    }

    #[test]
    fn parses_candidate_parts() {
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "a"}, {"text": "b"}]}}],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 1}
        });
        let out = parse_response(&body).unwrap();
        assert_eq!(out.text.as_deref(), Some("ab"));
        assert_eq!(out.usage.unwrap().input_tokens, 4);
    }
}

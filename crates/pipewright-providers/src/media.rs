//! Image and video generation families.

use serde_json::json;

use crate::resolver::EngineResolution;
use crate::types::{CallParams, ProviderOutput};

const DEFAULT_IMAGE_SIZE: &str = "1024x1024";

// ---------------------------------------------------------------------------
// Images (OpenAI images API)
// ---------------------------------------------------------------------------

pub(crate) fn build_image_body(model: &str, params: &CallParams) -> serde_json::Value {
    json!({
        "model": model,
        "prompt": params.prompt,
        "size": params.size.as_deref().unwrap_or(DEFAULT_IMAGE_SIZE),
        "n": 1,
    })
}

pub(crate) fn build_image_request(
    client: &reqwest::Client,
    base_url: &str,
    resolution: &EngineResolution,
    params: &CallParams,
) -> reqwest::RequestBuilder {
    let mut builder = client
        .post(format!("{base_url}/v1/images/generations"))
        .json(&build_image_body(&resolution.model, params));
    if let Some(ref key) = resolution.credential {
        builder = builder.bearer_auth(key);
    }
    builder
}

pub(crate) fn parse_image_response(body: &serde_json::Value) -> Option<ProviderOutput> {
    let first = &body["data"][0];
    let url = match (first["url"].as_str(), first["b64_json"].as_str()) {
        (Some(url), _) => url.to_string(),
        (None, Some(b64)) => format!("data:image/png;base64,{b64}"),
        (None, None) => return None,
    };
    Some(ProviderOutput {
        text: first["revised_prompt"].as_str().map(String::from),
        url: Some(url),
        mime_type: Some("image/png".into()),
        usage: None,
    })
}

// ---------------------------------------------------------------------------
// Video (generic JSON video API)
// ---------------------------------------------------------------------------

pub(crate) fn build_video_body(model: &str, params: &CallParams) -> serde_json::Value {
    let mut body = json!({
        "model": model,
        "prompt": params.prompt,
    });
    if let Some(duration) = params.duration_sec {
        body["duration"] = json!(duration);
    }
    body
}

pub(crate) fn build_video_request(
    client: &reqwest::Client,
    base_url: &str,
    resolution: &EngineResolution,
    params: &CallParams,
) -> reqwest::RequestBuilder {
    let mut builder = client
        .post(format!("{base_url}/v1/videos"))
        .json(&build_video_body(&resolution.model, params));
    if let Some(ref key) = resolution.credential {
        builder = builder.bearer_auth(key);
    }
    builder
}

/// Accepts `{url}`, `{output: [url, ...]}`, or a bare job `{id}`; a job id is
/// reported as text so the caller can poll for it out of band.
pub(crate) fn parse_video_response(body: &serde_json::Value) -> Option<ProviderOutput> {
    let url = body["url"]
        .as_str()
        .or_else(|| body["output"][0].as_str())
        .or_else(|| body["output"].as_str())
        .map(String::from);
    let job = body["id"].as_str().map(String::from);
    if url.is_none() && job.is_none() {
        return None;
    }
    Some(ProviderOutput {
        text: job,
        url,
        mime_type: Some("video/mp4".into()),
        usage: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_body_defaults_size() {
        let body = build_image_body("gpt-image-1", &CallParams::prompt("a lighthouse"));
        assert_eq!(body["size"], DEFAULT_IMAGE_SIZE);
        assert_eq!(body["n"], 1);
    }

    #[test]
    fn image_response_url_or_base64() {
        let by_url = parse_image_response(&json!({"data": [{"url": "https://img/x.png"}]})).unwrap();
        assert_eq!(by_url.url.as_deref(), Some("https://img/x.png"));

        let by_b64 = parse_image_response(&json!({"data": [{"b64_json": "AAAA"}]})).unwrap();
        assert_eq!(by_b64.url.as_deref(), Some("data:image/png;base64,AAAA"));

        assert!(parse_image_response(&json!({"data": []})).is_none());
    }

    #[test]
    fn video_response_shapes() {
        let direct = parse_video_response(&json!({"url": "https://v/1.mp4"})).unwrap();
        assert_eq!(direct.url.as_deref(), Some("https://v/1.mp4"));

        let listed = parse_video_response(&json!({"id": "job-1", "output": ["https://v/2.mp4"]})).unwrap();
        assert_eq!(listed.url.as_deref(), Some("https://v/2.mp4"));
        assert_eq!(listed.text.as_deref(), Some("job-1"));

        let queued = parse_video_response(&json!({"id": "job-2", "status": "PENDING"})).unwrap();
        assert!(queued.url.is_none());

        assert!(parse_video_response(&json!({})).is_none());
    }

    #[test]
    fn video_body_includes_duration() {
        let body = build_video_body(
            "gen4_turbo",
            &CallParams {
                duration_sec: Some(5),
                ..CallParams::prompt("waves")
            },
        );
        assert_eq!(body["duration"], 5);
    }
}

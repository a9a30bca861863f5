//! Deterministic placeholder output for mock-mode resolutions.

use crate::descriptor::ProviderKind;
use crate::resolver::EngineResolution;
use crate::types::{CallParams, ProviderOutput, ProviderResult, Usage};

/// Characters of the prompt echoed back in mock text.
pub const MOCK_ECHO_CHARS: usize = 160;

/// 1x1 transparent PNG.
pub const MOCK_IMAGE_URI: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// A bare MP4 `ftyp` box.
pub const MOCK_VIDEO_URI: &str = "data:video/mp4;base64,AAAAIGZ0eXBpc29tAAACAGlzb21pc28yYXZjMW1wNDE=";

/// Synthesize a result with the same shape a live call would return.
pub fn synthesize(resolution: &EngineResolution, kind: ProviderKind, params: &CallParams) -> ProviderResult {
    let output = match kind {
        ProviderKind::Llm => {
            let echo: String = params.prompt.chars().take(MOCK_ECHO_CHARS).collect();
            let text = format!("[mock:{}] {}", resolution.model, echo.trim());
            ProviderOutput {
                usage: Some(Usage {
                    input_tokens: params.prompt.split_whitespace().count() as u64,
                    output_tokens: text.split_whitespace().count() as u64,
                }),
                text: Some(text),
                url: None,
                mime_type: Some("text/plain".into()),
            }
        }
        ProviderKind::Image => ProviderOutput {
            url: Some(MOCK_IMAGE_URI.into()),
            mime_type: Some("image/png".into()),
            ..Default::default()
        },
        ProviderKind::Video => ProviderOutput {
            url: Some(MOCK_VIDEO_URI.into()),
            mime_type: Some("video/mp4".into()),
            ..Default::default()
        },
    };
    ProviderResult::from_output(resolution, kind, output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_echo_is_truncated_and_deterministic() {
        let res = EngineResolution::unavailable(ProviderKind::Llm);
        let params = CallParams::prompt("x".repeat(500));

        let a = synthesize(&res, ProviderKind::Llm, &params);
        let b = synthesize(&res, ProviderKind::Llm, &params);
        assert_eq!(a, b);

        let text = a.text.unwrap();
        assert!(text.starts_with("[mock:mock-llm] "));
        assert_eq!(text.len(), "[mock:mock-llm] ".len() + MOCK_ECHO_CHARS);
        assert_eq!(a.reason.as_deref(), Some("no-provider-available"));
    }

    #[test]
    fn image_and_video_placeholders() {
        let img = synthesize(
            &EngineResolution::unavailable(ProviderKind::Image),
            ProviderKind::Image,
            &CallParams::prompt("a cat"),
        );
        assert!(img.is_mock());
        assert_eq!(img.url.as_deref(), Some(MOCK_IMAGE_URI));
        assert!(img.text.is_none());

        let vid = synthesize(
            &EngineResolution::unavailable(ProviderKind::Video),
            ProviderKind::Video,
            &CallParams::prompt("a cat"),
        );
        assert_eq!(vid.mime_type.as_deref(), Some("video/mp4"));
    }
}

//! Secret redaction for error messages that end up in structured events.

use std::sync::OnceLock;

use regex::Regex;

const MASK: &str = "***";

fn secret_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"sk-[A-Za-z0-9_\-]{8,}",
            r"AIza[0-9A-Za-z_\-]{20,}",
            r"(?i)bearer\s+[A-Za-z0-9._\-]+",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn query_secret() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"(?i)\b(api[_-]?key|key|token|secret)=([^&\s"']+)"#).ok())
        .as_ref()
}

/// Mask `credential` and anything shaped like an API key or bearer token.
pub fn redact(message: &str, credential: Option<&str>) -> String {
    let mut out = message.to_string();
    if let Some(secret) = credential.filter(|s| s.len() >= 4) {
        out = out.replace(secret, MASK);
    }
    for pattern in secret_patterns() {
        out = pattern.replace_all(&out, MASK).into_owned();
    }
    if let Some(pattern) = query_secret() {
        out = pattern.replace_all(&out, format!("$1={MASK}")).into_owned();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_the_live_credential() {
        let msg = redact("auth failed for token abcd-1234-efgh", Some("abcd-1234-efgh"));
        assert_eq!(msg, "auth failed for token ***");
    }

    #[test]
    fn masks_key_shaped_strings() {
        let msg = redact("Incorrect API key provided: sk-proj-ABCDEFGH12345", None);
        assert!(!msg.contains("sk-proj-ABCDEFGH12345"));
        assert!(msg.contains(MASK));

        let msg = redact("GET /v1beta/models/x?key=AIzaSyA123&alt=json failed", None);
        assert!(!msg.contains("AIzaSyA123"));
        assert!(msg.contains("key=***"));

        let msg = redact("header Authorization: Bearer abc.def-ghi", None);
        assert!(!msg.contains("abc.def-ghi"));
    }

    #[test]
    fn leaves_ordinary_text_alone() {
        let msg = "Provider openai returned HTTP 503: upstream overloaded";
        assert_eq!(redact(msg, None), msg);
    }
}

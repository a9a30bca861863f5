//! Structured log events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One structured, timestamped event. Serialized as a single JSON line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    #[serde(rename = "runId", default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub data: serde_json::Value,
}

impl LogEvent {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            event: event.into(),
            run_id: None,
            data,
        }
    }

    pub fn for_run(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    /// Serialize to one line of JSON (no trailing newline).
    pub fn to_json_line(&self) -> String {
        // A LogEvent holds only JSON-representable data.
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"timestamp\":\"{}\",\"event\":\"{}\",\"data\":null}}",
                self.timestamp.to_rfc3339(),
                self.event
            )
        })
    }
}

/// Destination for structured events.
///
/// Implementations must accept concurrent writers; each call records one complete
/// event.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &str, data: serde_json::Value);
}

/// Sink that drops every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &str, _data: serde_json::Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_line_has_contract_fields() {
        let ev = LogEvent::new("node:start", json!({"node": "n1"})).for_run("run-1");
        let line = ev.to_json_line();
        assert!(!line.contains('\n'));

        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["event"], "node:start");
        assert_eq!(parsed["runId"], "run-1");
        assert_eq!(parsed["data"]["node"], "n1");
        assert!(parsed["timestamp"].is_string());
    }

    #[test]
    fn run_id_omitted_when_absent() {
        let line = LogEvent::new("circuit_open", json!({})).to_json_line();
        assert!(!line.contains("runId"));
    }
}

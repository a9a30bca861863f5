//! Shared types, errors, payload, and structured events for the Pipewright engine.
//!
//! This crate provides the foundational types used across the other Pipewright crates:
//! - `PipewrightError`: unified error taxonomy
//! - `Payload`: the record threaded through pipeline nodes
//! - `LogEvent` / `EventSink`: the structured event surface
//! - `BackoffPolicy`: delay schedule shared by node retries and provider retries

mod backoff;
mod event;
mod payload;

pub use backoff::BackoffPolicy;
pub use event::{EventSink, LogEvent, NullSink};
pub use payload::{Payload, ARTIFACTS_KEY};

/// Unified error type for all Pipewright subsystems.
#[derive(Debug, thiserror::Error)]
pub enum PipewrightError {
    // === Pipeline Errors ===
    #[error("Pipeline structure error: {0}")]
    Structure(String),

    #[error("Agent '{agent}' failed on node '{node}': {message}")]
    NodeExecution {
        node: String,
        agent: String,
        message: String,
    },

    // === Provider Errors ===
    #[error("Provider {provider} returned HTTP {status}: {message}")]
    Provider {
        provider: String,
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("Circuit open for provider {provider}, retry after {retry_after_ms}ms")]
    CircuitOpen {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Request to {provider} timed out after {timeout_ms}ms")]
    RequestTimeout { provider: String, timeout_ms: u64 },

    // === Run plumbing ===
    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl PipewrightError {
    /// Returns `true` if the error is transient and the call may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipewrightError::RequestTimeout { .. }
                | PipewrightError::Provider {
                    retryable: true,
                    ..
                }
        )
    }

    /// Returns `true` for errors that describe a malformed pipeline rather than a
    /// runtime failure.
    pub fn is_structural(&self) -> bool {
        matches!(self, PipewrightError::Structure(_))
    }

    /// HTTP status carried by the error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            PipewrightError::Provider { status, .. } if *status > 0 => Some(*status),
            PipewrightError::CircuitOpen { .. } => Some(503),
            PipewrightError::RequestTimeout { .. } => Some(504),
            _ => None,
        }
    }

    /// Short machine-readable code used in structured events.
    pub fn code(&self) -> &'static str {
        match self {
            PipewrightError::Structure(_) => "structure",
            PipewrightError::NodeExecution { .. } => "node-execution",
            PipewrightError::Provider { .. } => "provider",
            PipewrightError::CircuitOpen { .. } => "circuit-open",
            PipewrightError::RequestTimeout { .. } => "timeout",
            PipewrightError::Artifact(_) => "artifact",
            PipewrightError::Config(_) => "config",
            PipewrightError::Io(_) => "io",
            PipewrightError::Json(_) => "json",
            PipewrightError::Other(_) => "other",
        }
    }
}

/// A convenience alias for `Result<T, PipewrightError>`.
pub type Result<T> = std::result::Result<T, PipewrightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_structure() {
        let err = PipewrightError::Structure("pipeline has no nodes".into());
        assert_eq!(
            err.to_string(),
            "Pipeline structure error: pipeline has no nodes"
        );
    }

    #[test]
    fn error_display_node_execution() {
        let err = PipewrightError::NodeExecution {
            node: "n1".into(),
            agent: "Writer".into(),
            message: "empty brief".into(),
        };
        assert_eq!(
            err.to_string(),
            "Agent 'Writer' failed on node 'n1': empty brief"
        );
    }

    #[test]
    fn error_display_provider() {
        let err = PipewrightError::Provider {
            provider: "openai".into(),
            status: 500,
            message: "internal server error".into(),
            retryable: true,
        };
        assert_eq!(
            err.to_string(),
            "Provider openai returned HTTP 500: internal server error"
        );
    }

    #[test]
    fn error_display_circuit_open() {
        let err = PipewrightError::CircuitOpen {
            provider: "anthropic".into(),
            retry_after_ms: 30_000,
        };
        assert_eq!(
            err.to_string(),
            "Circuit open for provider anthropic, retry after 30000ms"
        );
    }

    // --- is_retryable ---

    #[test]
    fn retryable_when_provider_flagged() {
        let err = PipewrightError::Provider {
            provider: "x".into(),
            status: 503,
            message: "unavailable".into(),
            retryable: true,
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn not_retryable_when_provider_not_flagged() {
        let err = PipewrightError::Provider {
            provider: "x".into(),
            status: 400,
            message: "bad request".into(),
            retryable: false,
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn timeout_is_retryable() {
        let err = PipewrightError::RequestTimeout {
            provider: "x".into(),
            timeout_ms: 60_000,
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn circuit_open_is_not_retryable() {
        let err = PipewrightError::CircuitOpen {
            provider: "x".into(),
            retry_after_ms: 10,
        };
        assert!(!err.is_retryable());
        assert_eq!(err.code(), "circuit-open");
    }

    // --- http_status ---

    #[test]
    fn http_status_passes_provider_status_through() {
        let err = PipewrightError::Provider {
            provider: "x".into(),
            status: 502,
            message: "bad gateway".into(),
            retryable: true,
        };
        assert_eq!(err.http_status(), Some(502));
    }

    #[test]
    fn http_status_none_for_transport_failure() {
        let err = PipewrightError::Provider {
            provider: "x".into(),
            status: 0,
            message: "connection refused".into(),
            retryable: true,
        };
        assert_eq!(err.http_status(), None);
    }

    #[test]
    fn structural_errors_are_flagged() {
        assert!(PipewrightError::Structure("x".into()).is_structural());
        assert!(!PipewrightError::Other("x".into()).is_structural());
    }

    // --- From impls ---

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PipewrightError = io_err.into();
        assert!(matches!(err, PipewrightError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: PipewrightError = json_err.into();
        assert!(matches!(err, PipewrightError::Json(_)));
    }
}

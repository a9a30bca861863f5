//! Resilience envelope around live provider calls.
//!
//! Each attempt runs, in order: circuit check, token-bucket admission, then a
//! timeout-bounded dispatch through the [`ProviderTransport`]. Failures feed the
//! provider's circuit breaker; retryable failures back off and try again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::Mutex;

use pipewright_types::{BackoffPolicy, EventSink, PipewrightError, Result};

use crate::breaker::{CircuitBreaker, CircuitCheck};
use crate::bucket::TokenBucket;
use crate::descriptor::{ProviderKind, ProviderRegistry};
use crate::redact::redact;
use crate::resolver::EngineResolution;
use crate::transport::ProviderTransport;
use crate::types::{CallParams, ProviderResult};

/// Tunables for the envelope. The defaults are the production values.
#[derive(Debug, Clone)]
pub struct EnvelopeConfig {
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    pub request_timeout: Duration,
    pub admission_poll: Duration,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffPolicy::default(),
            request_timeout: Duration::from_secs(60),
            admission_poll: Duration::from_millis(25),
        }
    }
}

/// Mutable per-provider state. One per descriptor, for the life of the process.
#[derive(Debug)]
struct ProviderState {
    bucket: TokenBucket,
    breaker: CircuitBreaker,
}

/// Rate limiting, circuit breaking, timeouts and retries for live calls.
///
/// Shared by every run in the process; state is locked per provider so calls to
/// different providers never contend.
pub struct ResilienceEnvelope {
    registry: Arc<ProviderRegistry>,
    transport: Arc<dyn ProviderTransport>,
    config: EnvelopeConfig,
    states: HashMap<String, Arc<Mutex<ProviderState>>>,
}

// Paused tokio clocks advance this instant too, which keeps tests deterministic.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

impl ResilienceEnvelope {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        transport: Arc<dyn ProviderTransport>,
        config: EnvelopeConfig,
    ) -> Self {
        let started = now();
        let states = registry
            .iter()
            .map(|d| {
                let state = ProviderState {
                    bucket: TokenBucket::new(&d.rate_limit, started),
                    breaker: CircuitBreaker::new(&d.circuit_breaker),
                };
                (d.id.clone(), Arc::new(Mutex::new(state)))
            })
            .collect();
        Self {
            registry,
            transport,
            config,
            states,
        }
    }

    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    /// Whether the provider's circuit is currently open.
    pub async fn is_circuit_open(&self, provider_id: &str) -> bool {
        match self.states.get(provider_id) {
            Some(state) => state.lock().await.breaker.is_open(now()),
            None => false,
        }
    }

    /// Run a live call through the envelope.
    pub async fn call(
        &self,
        resolution: &EngineResolution,
        kind: ProviderKind,
        params: &CallParams,
        sink: &dyn EventSink,
    ) -> Result<ProviderResult> {
        let provider = resolution.provider_id.as_str();
        if !resolution.is_live() {
            return Err(PipewrightError::Other(format!(
                "resolution for '{provider}' is not live"
            )));
        }
        let descriptor = self.registry.get(provider).ok_or_else(|| {
            PipewrightError::Config(format!("unknown provider '{provider}'"))
        })?;
        let state = self.states.get(provider).cloned().ok_or_else(|| {
            PipewrightError::Config(format!("no state for provider '{provider}'"))
        })?;
        let credential = resolution.credential.as_deref();
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_err: Option<PipewrightError> = None;
        let mut attempts = 0;

        for attempt in 1..=max_attempts {
            // --- circuit + admission ---
            if let Err(rejected) = self.admit(provider, &state, sink).await {
                // A circuit opened by this call's own failures reports the provider error.
                let err = last_err.take().unwrap_or(rejected);
                sink.emit(
                    "call_failed",
                    json!({
                        "provider": provider,
                        "model": resolution.model,
                        "attempts": attempts,
                        "code": err.code(),
                        "message": err.to_string(),
                    }),
                );
                return Err(err);
            }

            // --- dispatch ---
            attempts = attempt;
            tracing::debug!(provider = %provider, model = %resolution.model, attempt, "Provider call attempt");
            sink.emit(
                "call_attempt",
                json!({
                    "provider": provider,
                    "model": resolution.model,
                    "kind": kind,
                    "attempt": attempt,
                }),
            );

            let started = Instant::now();
            let outcome = match tokio::time::timeout(
                self.config.request_timeout,
                self.transport.send(descriptor, resolution, kind, params),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(PipewrightError::RequestTimeout {
                    provider: provider.to_string(),
                    timeout_ms: self.config.request_timeout.as_millis() as u64,
                }),
            };

            match outcome {
                Ok(output) => {
                    let was_open = {
                        let mut st = state.lock().await;
                        let open = st.breaker.is_open(now());
                        st.breaker.record_success();
                        open
                    };
                    if was_open {
                        sink.emit(
                            "circuit_reset",
                            json!({"provider": provider, "reason": "success"}),
                        );
                    }
                    tracing::info!(provider = %provider, model = %resolution.model, attempt, "Provider call succeeded");
                    sink.emit(
                        "call_success",
                        json!({
                            "provider": provider,
                            "model": resolution.model,
                            "attempt": attempt,
                            "elapsedMs": started.elapsed().as_millis() as u64,
                        }),
                    );
                    return Ok(ProviderResult::from_output(resolution, kind, output));
                }
                Err(err) => {
                    let err = redact_error(err, credential);
                    let retryable = err.is_retryable();
                    let (tripped, recent_failures) = {
                        let mut st = state.lock().await;
                        let at = now();
                        let tripped = st.breaker.record_failure(at);
                        (tripped, st.breaker.recent_failures(at))
                    };
                    tracing::warn!(provider = %provider, attempt, retryable, error = %err, "Provider call failed");
                    sink.emit(
                        "call_error",
                        json!({
                            "provider": provider,
                            "model": resolution.model,
                            "attempt": attempt,
                            "status": err.http_status(),
                            "code": err.code(),
                            "retryable": retryable,
                            "recentFailures": recent_failures,
                            "message": err.to_string(),
                        }),
                    );
                    if tripped {
                        tracing::warn!(
                            provider = %provider,
                            threshold = descriptor.circuit_breaker.threshold,
                            cooldown_sec = descriptor.circuit_breaker.cooldown_sec,
                            "Circuit opened"
                        );
                        sink.emit(
                            "circuit_open",
                            json!({
                                "provider": provider,
                                "threshold": descriptor.circuit_breaker.threshold,
                                "cooldownSec": descriptor.circuit_breaker.cooldown_sec,
                            }),
                        );
                    }

                    last_err = Some(err);
                    if !retryable {
                        break;
                    }
                    if attempt < max_attempts {
                        let delay = self.config.backoff.delay_for_attempt(attempt as usize - 1);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let err = last_err.unwrap_or_else(|| {
            PipewrightError::Other(format!("no attempt was made against '{provider}'"))
        });
        tracing::error!(provider = %provider, attempts, error = %err, "Provider call exhausted");
        sink.emit(
            "call_failed",
            json!({
                "provider": provider,
                "model": resolution.model,
                "attempts": attempts,
                "code": err.code(),
                "message": err.to_string(),
            }),
        );
        Err(err)
    }

    /// Wait for a token, polling the bucket.
    ///
    /// The circuit is checked in the same critical section as every token take,
    /// so a circuit opened by another caller while this one waits rejects it
    /// before any dispatch.
    async fn admit(&self, provider: &str, state: &Mutex<ProviderState>, sink: &dyn EventSink) -> Result<()> {
        let started = now();
        loop {
            let pause = {
                let mut st = state.lock().await;
                let at = now();
                match st.breaker.check(at) {
                    CircuitCheck::Closed => {}
                    CircuitCheck::Reset => {
                        tracing::info!(provider = %provider, "Circuit reset after cooldown");
                        sink.emit(
                            "circuit_reset",
                            json!({"provider": provider, "reason": "cooldown-elapsed"}),
                        );
                    }
                    CircuitCheck::Open { remaining } => {
                        tracing::warn!(provider = %provider, retry_after_ms = %remaining.as_millis(), "Circuit open, rejecting call");
                        return Err(PipewrightError::CircuitOpen {
                            provider: provider.to_string(),
                            retry_after_ms: remaining.as_millis() as u64,
                        });
                    }
                }
                if st.bucket.try_take(at) {
                    let waited = at.saturating_duration_since(started);
                    let tokens_left = st.bucket.available(at);
                    tracing::debug!(provider = %provider, waited_ms = %waited.as_millis(), "Call admitted");
                    sink.emit(
                        "call_admitted",
                        json!({
                            "provider": provider,
                            "waitedMs": waited.as_millis() as u64,
                            "tokensLeft": tokens_left.floor() as u64,
                        }),
                    );
                    return Ok(());
                }
                st.bucket
                    .wait_time(at)
                    .clamp(Duration::from_millis(1), self.config.admission_poll)
            };
            tokio::time::sleep(pause).await;
        }
    }
}

fn redact_error(err: PipewrightError, credential: Option<&str>) -> PipewrightError {
    match err {
        PipewrightError::Provider {
            provider,
            status,
            message,
            retryable,
        } => PipewrightError::Provider {
            provider,
            status,
            message: redact(&message, credential),
            retryable,
        },
        PipewrightError::Other(message) => PipewrightError::Other(redact(&message, credential)),
        other => other,
    }
}

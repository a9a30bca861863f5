//! Provider layer: registry, engine resolution, and resilient provider calls.
//!
//! Agents never talk to a provider directly. They go through [`Providers`], which
//! resolves an engine over a fallback chain and either synthesizes mock output or
//! runs the call through the [`ResilienceEnvelope`] (token bucket, circuit breaker,
//! retries, request timeout).

mod anthropic;
mod breaker;
mod bucket;
mod credentials;
mod descriptor;
mod envelope;
mod facade;
mod gemini;
mod media;
pub mod mock;
mod openai;
mod redact;
mod resolver;
mod transport;
mod types;

pub use breaker::{CircuitBreaker, CircuitCheck};
pub use bucket::TokenBucket;
pub use credentials::{CredentialSource, EnvCredentials, StaticCredentials};
pub use descriptor::{
    CircuitBreakerPolicy, EngineRef, ProviderDescriptor, ProviderFamily, ProviderKind,
    ProviderRegistry, RateLimitPolicy,
};
pub use envelope::{EnvelopeConfig, ResilienceEnvelope};
pub use facade::Providers;
pub use redact::redact;
pub use resolver::{EngineMode, EngineRequest, EngineResolution, ProviderResolver};
pub use transport::{map_error, HttpTransport, ProviderTransport};
pub use types::{CallParams, ProviderOutput, ProviderResult, Usage};

//! Provider descriptors and the static provider registry.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use pipewright_types::{PipewrightError, Result};

// ---------------------------------------------------------------------------
// ProviderKind / ProviderFamily
// ---------------------------------------------------------------------------

/// Capability a provider offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Llm,
    Image,
    Video,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Llm => "llm",
            ProviderKind::Image => "image",
            ProviderKind::Video => "video",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request/response shaping used when dispatching to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderFamily {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "openai-images")]
    OpenAiImages,
    #[serde(rename = "video")]
    Video,
}

impl ProviderFamily {
    /// Family assumed when a descriptor does not name one.
    pub fn default_for(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::Llm => ProviderFamily::OpenAi,
            ProviderKind::Image => ProviderFamily::OpenAiImages,
            ProviderKind::Video => ProviderFamily::Video,
        }
    }

    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            ProviderFamily::OpenAi | ProviderFamily::OpenAiImages => Some("https://api.openai.com"),
            ProviderFamily::Anthropic => Some("https://api.anthropic.com"),
            ProviderFamily::Gemini => Some("https://generativelanguage.googleapis.com"),
            ProviderFamily::Video => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitPolicy {
    pub capacity: u32,
    pub refill_per_sec: f64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            capacity: 5,
            refill_per_sec: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerPolicy {
    pub threshold: u32,
    pub window_sec: u64,
    pub cooldown_sec: u64,
}

impl Default for CircuitBreakerPolicy {
    fn default() -> Self {
        Self {
            threshold: 5,
            window_sec: 60,
            cooldown_sec: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// ProviderDescriptor
// ---------------------------------------------------------------------------

/// Static description of one upstream provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub credential_ref: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub family: Option<ProviderFamily>,
    #[serde(default)]
    pub rate_limit: RateLimitPolicy,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerPolicy,
}

impl ProviderDescriptor {
    pub fn new(id: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            id: id.into(),
            kind,
            models: Vec::new(),
            credential_ref: None,
            base_url: None,
            family: None,
            rate_limit: RateLimitPolicy::default(),
            circuit_breaker: CircuitBreakerPolicy::default(),
        }
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_credential(mut self, credential_ref: impl Into<String>) -> Self {
        self.credential_ref = Some(credential_ref.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_family(mut self, family: ProviderFamily) -> Self {
        self.family = Some(family);
        self
    }

    pub fn with_rate_limit(mut self, capacity: u32, refill_per_sec: f64) -> Self {
        self.rate_limit = RateLimitPolicy {
            capacity,
            refill_per_sec,
        };
        self
    }

    pub fn with_circuit_breaker(mut self, threshold: u32, window_sec: u64, cooldown_sec: u64) -> Self {
        self.circuit_breaker = CircuitBreakerPolicy {
            threshold,
            window_sec,
            cooldown_sec,
        };
        self
    }

    pub fn family(&self) -> ProviderFamily {
        self.family.unwrap_or_else(|| ProviderFamily::default_for(self.kind))
    }

    /// Explicit base URL, or the family default.
    pub fn base_url(&self) -> Option<String> {
        self.base_url
            .as_deref()
            .or_else(|| self.family().default_base_url())
            .map(|u| u.trim_end_matches('/').to_string())
    }

    fn check(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(PipewrightError::Config("provider id must not be empty".into()));
        }
        if self.rate_limit.capacity == 0 || self.rate_limit.refill_per_sec <= 0.0 {
            return Err(PipewrightError::Config(format!(
                "provider '{}': rateLimit needs capacity >= 1 and refillPerSec > 0",
                self.id
            )));
        }
        if self.circuit_breaker.threshold == 0 {
            return Err(PipewrightError::Config(format!(
                "provider '{}': circuitBreaker.threshold must be >= 1",
                self.id
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EngineRef: "provider", "provider:model", or {provider, model?, models?}
// ---------------------------------------------------------------------------

/// A reference to a provider (and optionally a model) in a candidate chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EngineRefRepr")]
pub struct EngineRef {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EngineRefRepr {
    Short(String),
    Full {
        #[serde(alias = "id")]
        provider: String,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        models: Vec<String>,
    },
}

impl From<EngineRefRepr> for EngineRef {
    fn from(repr: EngineRefRepr) -> Self {
        match repr {
            EngineRefRepr::Short(s) => EngineRef::parse(&s),
            EngineRefRepr::Full {
                provider,
                model,
                models,
            } => EngineRef {
                provider,
                model,
                models,
            },
        }
    }
}

impl EngineRef {
    pub fn provider(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: None,
            models: Vec::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Parse `"provider"` or `"provider:model"`.
    pub fn parse(s: &str) -> Self {
        match s.trim().split_once(':') {
            Some((provider, model)) if !model.trim().is_empty() => {
                EngineRef::provider(provider.trim()).with_model(model.trim())
            }
            Some((provider, _)) => EngineRef::provider(provider.trim()),
            None => EngineRef::provider(s.trim()),
        }
    }

    /// Read an engine reference out of an arbitrary JSON value. Malformed values
    /// yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            other => serde_json::from_value(other.clone()).ok(),
        }
    }
}

// ---------------------------------------------------------------------------
// ProviderRegistry
// ---------------------------------------------------------------------------

/// Read-only set of provider descriptors plus the per-capability default engine.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    order: Vec<String>,
    providers: HashMap<String, ProviderDescriptor>,
    defaults: HashMap<ProviderKind, EngineRef>,
}

#[derive(Deserialize)]
struct RegistryFile {
    providers: Vec<ProviderDescriptor>,
    #[serde(default)]
    defaults: HashMap<ProviderKind, EngineRef>,
}

impl ProviderRegistry {
    pub fn new(
        descriptors: Vec<ProviderDescriptor>,
        defaults: HashMap<ProviderKind, EngineRef>,
    ) -> Result<Self> {
        let mut registry = ProviderRegistry {
            order: Vec::new(),
            providers: HashMap::new(),
            defaults,
        };
        for descriptor in descriptors {
            descriptor.check()?;
            if registry.providers.contains_key(&descriptor.id) {
                return Err(PipewrightError::Config(format!(
                    "duplicate provider id '{}'",
                    descriptor.id
                )));
            }
            registry.order.push(descriptor.id.clone());
            registry.providers.insert(descriptor.id.clone(), descriptor);
        }
        Ok(registry)
    }

    /// Parse a registry document: `{ "providers": [...], "defaults": { "llm": "openai" } }`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: RegistryFile = serde_json::from_str(json)?;
        Self::new(file.providers, file.defaults)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    /// The providers shipped with Pipewright. Credentials are read from the
    /// environment variables named in each descriptor.
    pub fn builtin() -> Self {
        let descriptors = vec![
            ProviderDescriptor::new("openai", ProviderKind::Llm)
                .with_family(ProviderFamily::OpenAi)
                .with_models(["gpt-4o-mini", "gpt-4o"])
                .with_credential("OPENAI_API_KEY"),
            ProviderDescriptor::new("anthropic", ProviderKind::Llm)
                .with_family(ProviderFamily::Anthropic)
                .with_models(["claude-3-5-haiku-latest", "claude-3-5-sonnet-latest"])
                .with_credential("ANTHROPIC_API_KEY"),
            ProviderDescriptor::new("gemini", ProviderKind::Llm)
                .with_family(ProviderFamily::Gemini)
                .with_models(["gemini-2.5-flash", "gemini-2.5-pro"])
                .with_credential("GEMINI_API_KEY"),
            ProviderDescriptor::new("openai-images", ProviderKind::Image)
                .with_family(ProviderFamily::OpenAiImages)
                .with_models(["gpt-image-1", "dall-e-3"])
                .with_credential("OPENAI_API_KEY")
                .with_rate_limit(2, 0.2),
            ProviderDescriptor::new("runway", ProviderKind::Video)
                .with_family(ProviderFamily::Video)
                .with_models(["gen4_turbo"])
                .with_credential("RUNWAY_API_KEY")
                .with_rate_limit(1, 0.1),
        ];
        let mut defaults = HashMap::new();
        defaults.insert(ProviderKind::Llm, EngineRef::provider("openai"));
        defaults.insert(ProviderKind::Image, EngineRef::provider("openai-images"));
        defaults.insert(ProviderKind::Video, EngineRef::provider("runway"));

        let mut registry = ProviderRegistry {
            order: Vec::new(),
            providers: HashMap::new(),
            defaults,
        };
        for d in descriptors {
            registry.order.push(d.id.clone());
            registry.providers.insert(d.id.clone(), d);
        }
        registry
    }

    pub fn get(&self, id: &str) -> Option<&ProviderDescriptor> {
        self.providers.get(id)
    }

    /// Descriptors in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.order.iter().filter_map(|id| self.providers.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Global default engine for a capability: the configured default, else the
    /// first registered provider of that kind.
    pub fn default_engine(&self, kind: ProviderKind) -> Option<EngineRef> {
        if let Some(engine) = self.defaults.get(&kind) {
            return Some(engine.clone());
        }
        self.iter()
            .find(|d| d.kind == kind)
            .map(|d| EngineRef::provider(d.id.clone()))
    }
}

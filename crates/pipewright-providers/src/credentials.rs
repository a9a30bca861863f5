//! Credential lookup by reference name.

use std::collections::HashMap;

/// Looks up a credential (API key, token) by the reference named in a
/// [`ProviderDescriptor`](crate::ProviderDescriptor).
pub trait CredentialSource: Send + Sync {
    fn lookup(&self, reference: &str) -> Option<String>;
}

/// Reads credentials from process environment variables. Empty values count as
/// missing.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn lookup(&self, reference: &str) -> Option<String> {
        std::env::var(reference)
            .ok()
            .filter(|v| !v.trim().is_empty())
    }
}

/// In-memory credentials, for host-injected secrets and tests.
#[derive(Default, Clone)]
pub struct StaticCredentials {
    values: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reference: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(reference.into(), value.into());
        self
    }
}

impl CredentialSource for StaticCredentials {
    fn lookup(&self, reference: &str) -> Option<String> {
        self.values
            .get(reference)
            .filter(|v| !v.trim().is_empty())
            .cloned()
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("references", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

use std::collections::HashMap;

use crate::chain::{ChainId, NetworkTier};

/// Key/value lookup supplying endpoints and API keys. The core performs no
/// file parsing itself; callers wire in whatever source they load from.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Source backed by process environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl ConfigSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// In-memory source, used in tests and for embedding fixed settings.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    values: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl ConfigSource for MemorySource {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Resolve the RPC endpoint for one tier: tier-specific key, then the
/// chain-generic key, then the built-in public endpoint.
pub fn resolve_endpoint(
    source: &dyn ConfigSource,
    chain: ChainId,
    tier: NetworkTier,
) -> Option<String> {
    let prefix = chain.env_prefix();
    non_empty(source.get(&format!("{}_{}_RPC_URL", prefix, tier.key_fragment())))
        .or_else(|| non_empty(source.get(&format!("{}_RPC_URL", prefix))))
        .or_else(|| Some(chain.default_endpoint(tier).to_string()))
}

/// Resolve the API key for one tier: tier-specific key, then the
/// chain-generic key. API keys have no built-in default.
pub fn resolve_api_key(
    source: &dyn ConfigSource,
    chain: ChainId,
    tier: NetworkTier,
) -> Option<String> {
    let prefix = chain.env_prefix();
    non_empty(source.get(&format!("{}_{}_API_KEY", prefix, tier.key_fragment())))
        .or_else(|| non_empty(source.get(&format!("{}_API_KEY", prefix))))
}

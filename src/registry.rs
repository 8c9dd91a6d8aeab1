use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::debug;

use crate::chain::{ChainId, NetworkTier};
use crate::config::ConfigSource;
use crate::error::{Error, Result};
use crate::model::BalancesResponse;
use crate::provider::ChainProvider;
use crate::strategy::GasEstimateRequest;
use crate::transport::{HttpTransport, RpcTransport};

/// Context-owned provider cache: constructed once at process start and
/// handed to callers by reference. The same chain always resolves to the
/// same instance for the life of the registry, because provider
/// construction resolves credentials and strategy clients that should not
/// be rebuilt per call.
pub struct ProviderRegistry {
    source: Arc<dyn ConfigSource>,
    transport: Arc<dyn RpcTransport>,
    providers: Mutex<HashMap<String, Arc<ChainProvider>>>,
}

impl ProviderRegistry {
    pub fn new(source: Arc<dyn ConfigSource>) -> Self {
        Self::with_transport(source, Arc::new(HttpTransport::new()))
    }

    pub fn with_transport(source: Arc<dyn ConfigSource>, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            source,
            transport,
            providers: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a chain name to its provider, building it on first use.
    /// Construction happens under the cache lock, so concurrent cold starts
    /// still produce exactly one instance.
    pub fn resolve(&self, chain: &str) -> Result<Arc<ChainProvider>> {
        let key = chain.to_ascii_lowercase();
        let mut providers = self.providers.lock().expect("registry lock poisoned");
        if let Some(provider) = providers.get(&key) {
            return Ok(provider.clone());
        }
        let chain_id: ChainId = key.parse()?;
        debug!(chain = %chain_id, "constructing provider");
        let provider = Arc::new(ChainProvider::from_chain(
            chain_id,
            self.source.as_ref(),
            self.transport.clone(),
        ));
        providers.insert(key, provider.clone());
        Ok(provider)
    }

    /// Register a provider under an explicit name: test doubles, or chains
    /// added at runtime without extending the static table.
    pub fn register(&self, chain: &str, provider: Arc<ChainProvider>) {
        self.providers
            .lock()
            .expect("registry lock poisoned")
            .insert(chain.to_ascii_lowercase(), provider);
    }

    /// Balances for an address on a chain. Unknown chains propagate;
    /// everything downstream degrades inside the provider.
    pub async fn get_balances(
        &self,
        chain: &str,
        address: &str,
        tier: NetworkTier,
    ) -> Result<BalancesResponse> {
        let provider = self.resolve(chain)?;
        Ok(provider.get_balances(address, tier).await)
    }

    pub async fn gas_price(&self, chain: &str, tier: NetworkTier) -> Result<String> {
        self.resolve(chain)?.gas_price(tier).await
    }

    pub async fn estimate_gas(
        &self,
        chain: &str,
        tx: &GasEstimateRequest,
        tier: NetworkTier,
    ) -> Result<String> {
        self.resolve(chain)?.estimate_gas(tx, tier).await
    }

    pub async fn call_rpc_method(
        &self,
        chain: &str,
        method: &str,
        params: Value,
        tier: NetworkTier,
    ) -> Result<Value> {
        self.resolve(chain)?.call_rpc_method(method, params, tier).await
    }

    pub async fn check_health(&self, chain: &str, tier: NetworkTier) -> Result<bool> {
        Ok(self.resolve(chain)?.check_health(tier).await)
    }
}

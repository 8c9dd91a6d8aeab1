use std::sync::{Arc, OnceLock};

use serde_json::{json, Value};
use tracing::{info_span, warn, Instrument};

use crate::adapter;
use crate::chain::{ChainConfig, ChainFamily, ChainId, NetworkTier, WatchList};
use crate::config::{resolve_api_key, resolve_endpoint, ConfigSource};
use crate::error::{Error, Result};
use crate::model::BalancesResponse;
use crate::strategy::{
    build_strategy, BalanceStrategy, GasEstimateRequest, StrategyKind, TokenAccountLayout,
};
use crate::transport::{rpc_call, RpcTransport};

/// Per-tier slice of a provider: the resolved credentials and the lazily
/// constructed strategy clients. Write-once after construction, so sharing
/// across in-flight requests needs no locking beyond the cells.
struct TierState {
    endpoint: Option<String>,
    api_key: Option<String>,
    watch_list: WatchList,
    primary: OnceLock<Arc<dyn BalanceStrategy>>,
    fallback: OnceLock<Arc<dyn BalanceStrategy>>,
}

impl TierState {
    fn empty() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            watch_list: WatchList::default(),
            primary: OnceLock::new(),
            fallback: OnceLock::new(),
        }
    }
}

/// One chain's provider: chain metadata plus a strategy per tier. Chain
/// behavior is supplied by composing a different strategy and config, not
/// by subclassing.
pub struct ChainProvider {
    name: String,
    family: ChainFamily,
    config: ChainConfig,
    kind: StrategyKind,
    fallback_kind: Option<StrategyKind>,
    layout: TokenAccountLayout,
    transport: Arc<dyn RpcTransport>,
    mainnet: TierState,
    testnet: TierState,
}

impl ChainProvider {
    /// Build a provider for a chain in the static table, resolving both
    /// tiers' credentials from the configuration source up front.
    pub fn from_chain(
        chain: ChainId,
        source: &dyn ConfigSource,
        transport: Arc<dyn RpcTransport>,
    ) -> Self {
        let kind = resolve_kind(chain, source);
        Self {
            name: chain.to_string(),
            family: chain.family(),
            config: chain.config(),
            kind,
            fallback_kind: kind.fallback(),
            layout: resolve_layout(source),
            transport,
            mainnet: resolve_tier(chain, source, NetworkTier::Mainnet),
            testnet: resolve_tier(chain, source, NetworkTier::Testnet),
        }
    }

    /// Build a provider around a pre-built strategy, used for test doubles
    /// and runtime-added chains.
    pub fn with_strategy(
        name: &str,
        family: ChainFamily,
        config: ChainConfig,
        strategy: Arc<dyn BalanceStrategy>,
        transport: Arc<dyn RpcTransport>,
    ) -> Self {
        let seeded = |endpoint: &str| {
            let mut state = TierState::empty();
            state.endpoint = Some(endpoint.to_string());
            state.primary.set(strategy.clone()).ok();
            state
        };
        Self {
            name: name.to_string(),
            family,
            config,
            kind: StrategyKind::EvmRpc,
            fallback_kind: None,
            layout: TokenAccountLayout::default(),
            transport,
            mainnet: seeded("mock://mainnet"),
            testnet: seeded("mock://testnet"),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chain_config(&self) -> &ChainConfig {
        &self.config
    }

    fn tier(&self, tier: NetworkTier) -> &TierState {
        match tier {
            NetworkTier::Mainnet => &self.mainnet,
            NetworkTier::Testnet => &self.testnet,
        }
    }

    pub fn base_url(&self, tier: NetworkTier) -> Result<String> {
        self.tier(tier).endpoint.clone().ok_or_else(|| {
            Error::Configuration(format!("no endpoint resolved for {} {}", self.name, tier))
        })
    }

    pub fn api_key(&self, tier: NetworkTier) -> Result<String> {
        self.tier(tier).api_key.clone().ok_or_else(|| {
            Error::Configuration(format!("no API key resolved for {} {}", self.name, tier))
        })
    }

    /// True iff at least one tier resolved an endpoint.
    pub fn is_supported(&self) -> bool {
        self.mainnet.endpoint.is_some() || self.testnet.endpoint.is_some()
    }

    fn strategy(&self, tier: NetworkTier) -> Result<Arc<dyn BalanceStrategy>> {
        let state = self.tier(tier);
        if let Some(strategy) = state.primary.get() {
            return Ok(strategy.clone());
        }
        let endpoint = self.base_url(tier)?;
        let built = build_strategy(
            self.kind,
            &endpoint,
            self.transport.clone(),
            &state.watch_list,
            self.layout,
        )?;
        // racing first calls may build twice; the first insert wins and the
        // cached client is what every later call sees
        Ok(state.primary.get_or_init(|| built).clone())
    }

    fn fallback_strategy(&self, tier: NetworkTier) -> Option<Arc<dyn BalanceStrategy>> {
        let kind = self.fallback_kind?;
        let state = self.tier(tier);
        if let Some(strategy) = state.fallback.get() {
            return Some(strategy.clone());
        }
        let endpoint = self.base_url(tier).ok()?;
        let built = build_strategy(
            kind,
            &endpoint,
            self.transport.clone(),
            &state.watch_list,
            self.layout,
        )
        .ok()?;
        Some(state.fallback.get_or_init(|| built).clone())
    }

    /// Fetch and normalize all balances for an address. Never fails: any
    /// error on the primary source is retried once on the family's
    /// alternate source, then degrades to the zero-value response.
    pub async fn get_balances(&self, address: &str, tier: NetworkTier) -> BalancesResponse {
        // every event recorded below this point, strategy-level failures
        // included, carries the chain/tier/operation fields
        let span = info_span!(
            "balances",
            chain = %self.name,
            tier = %tier,
            operation = %"get_balances"
        );
        match self.fetch_balances(address, tier).instrument(span).await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    chain = %self.name,
                    tier = %tier,
                    operation = "get_balances",
                    error = %err,
                    "degrading to zero-value response"
                );
                BalancesResponse::zeroed()
            }
        }
    }

    async fn fetch_balances(&self, address: &str, tier: NetworkTier) -> Result<BalancesResponse> {
        let strategy = self.strategy(tier)?;
        let raw = match strategy.raw_balances(address).await {
            Ok(raw) => raw,
            Err(err) => match self.fallback_strategy(tier) {
                Some(fallback) => {
                    warn!(
                        chain = %self.name,
                        tier = %tier,
                        operation = "get_balances",
                        error = %err,
                        "primary source failed, trying fallback source"
                    );
                    fallback.raw_balances(address).await?
                }
                None => return Err(err),
            },
        };
        adapter::normalize_balances(raw, &self.config)
    }

    /// Effective gas price in the chain's smallest unit. Propagates errors;
    /// callers of fee primitives decide how to react.
    pub async fn gas_price(&self, tier: NetworkTier) -> Result<String> {
        let span = info_span!(
            "gas_price",
            chain = %self.name,
            tier = %tier,
            operation = %"gas_price"
        );
        async {
            let fee = self.strategy(tier)?.raw_gas_price().await?;
            adapter::select_gas_price(&fee)
        }
        .instrument(span)
        .await
    }

    /// Upstream gas estimate for a transaction descriptor. Fails loudly.
    pub async fn estimate_gas(&self, tx: &GasEstimateRequest, tier: NetworkTier) -> Result<String> {
        let span = info_span!(
            "estimate_gas",
            chain = %self.name,
            tier = %tier,
            operation = %"estimate_gas"
        );
        async {
            let raw = self.strategy(tier)?.raw_estimate_gas(tx).await?;
            adapter::normalize_gas_estimate(&raw)
        }
        .instrument(span)
        .await
    }

    /// Thin pass-through for arbitrary JSON-RPC calls against the resolved
    /// endpoint. Propagates errors.
    pub async fn call_rpc_method(
        &self,
        method: &str,
        params: Value,
        tier: NetworkTier,
    ) -> Result<Value> {
        let endpoint = self.base_url(tier)?;
        rpc_call(self.transport.as_ref(), &endpoint, method, params).await
    }

    /// Cheap read-only probe; every error collapses to `false`.
    pub async fn check_health(&self, tier: NetworkTier) -> bool {
        let method = match self.family {
            ChainFamily::Evm => "eth_blockNumber",
            ChainFamily::Solana => "getHealth",
        };
        match self.call_rpc_method(method, json!([]), tier).await {
            Ok(_) => true,
            Err(err) => {
                warn!(
                    chain = %self.name,
                    tier = %tier,
                    operation = "check_health",
                    error = %err,
                    "health probe failed"
                );
                false
            }
        }
    }
}

fn resolve_tier(chain: ChainId, source: &dyn ConfigSource, tier: NetworkTier) -> TierState {
    TierState {
        endpoint: resolve_endpoint(source, chain, tier),
        api_key: resolve_api_key(source, chain, tier),
        watch_list: chain.default_watch_list(tier),
        primary: OnceLock::new(),
        fallback: OnceLock::new(),
    }
}

fn resolve_kind(chain: ChainId, source: &dyn ConfigSource) -> StrategyKind {
    let key = format!("{}_SOURCE", chain.env_prefix());
    match source.get(&key).as_deref() {
        Some("sdk") => match chain.family() {
            ChainFamily::Evm => StrategyKind::EvmSdk,
            ChainFamily::Solana => StrategyKind::SolanaSdk,
        },
        Some("rpc") => match chain.family() {
            ChainFamily::Evm => StrategyKind::EvmRpc,
            ChainFamily::Solana => StrategyKind::SolanaRpc,
        },
        Some(other) => {
            warn!(chain = %chain, value = %other, "unknown source override, using default");
            chain.default_strategy_kind()
        }
        None => chain.default_strategy_kind(),
    }
}

fn resolve_layout(source: &dyn ConfigSource) -> TokenAccountLayout {
    let mut layout = TokenAccountLayout::default();
    if let Some(size) = source
        .get("SOLANA_TOKEN_ACCOUNT_SIZE")
        .and_then(|v| v.parse().ok())
    {
        layout.data_size = size;
    }
    if let Some(offset) = source
        .get("SOLANA_TOKEN_ACCOUNT_OWNER_OFFSET")
        .and_then(|v| v.parse().ok())
    {
        layout.owner_offset = offset;
    }
    layout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemorySource;
    use crate::strategy::{EvmRawBalances, EvmRawToken, RawBalances, RawFeeData};
    use crate::transport::testing::MockTransport;
    use async_trait::async_trait;

    struct StubStrategy {
        raw: EvmRawBalances,
        fee: RawFeeData,
    }

    #[async_trait]
    impl BalanceStrategy for StubStrategy {
        async fn raw_balances(&self, _address: &str) -> Result<RawBalances> {
            Ok(RawBalances::Evm(self.raw.clone()))
        }

        async fn raw_gas_price(&self) -> Result<RawFeeData> {
            Ok(self.fee.clone())
        }

        async fn raw_estimate_gas(&self, _tx: &GasEstimateRequest) -> Result<String> {
            Ok("21000".to_string())
        }
    }

    struct FailingStrategy;

    #[async_trait]
    impl BalanceStrategy for FailingStrategy {
        async fn raw_balances(&self, _address: &str) -> Result<RawBalances> {
            Err(Error::Transport("upstream down".to_string()))
        }

        async fn raw_gas_price(&self) -> Result<RawFeeData> {
            Err(Error::Transport("upstream down".to_string()))
        }

        async fn raw_estimate_gas(&self, _tx: &GasEstimateRequest) -> Result<String> {
            Err(Error::Transport("upstream down".to_string()))
        }
    }

    fn stub_provider(strategy: Arc<dyn BalanceStrategy>) -> ChainProvider {
        ChainProvider::with_strategy(
            "ethereum",
            ChainFamily::Evm,
            ChainId::Ethereum.config(),
            strategy,
            Arc::new(MockTransport::new()),
        )
    }

    #[tokio::test]
    async fn test_get_balances_normalizes_strategy_output() {
        let provider = stub_provider(Arc::new(StubStrategy {
            raw: EvmRawBalances {
                native: Some("1000000000000000000".to_string()),
                tokens: vec![EvmRawToken {
                    contract: "0xaaa".to_string(),
                    amount: "2000000".to_string(),
                    symbol: Some("USDC".to_string()),
                    name: Some("USD Coin".to_string()),
                    decimals: Some(6),
                }],
                nfts: vec![],
            },
            fee: RawFeeData::default(),
        }));

        let response = provider.get_balances("0xabc", NetworkTier::Mainnet).await;
        assert_eq!(response.native_balance.balance, "1");
        assert_eq!(response.tokens[0].balance, "2");
    }

    #[tokio::test]
    async fn test_get_balances_never_fails() {
        let provider = stub_provider(Arc::new(FailingStrategy));
        let response = provider.get_balances("0xabc", NetworkTier::Mainnet).await;
        assert_eq!(response, BalancesResponse::zeroed());
    }

    #[tokio::test]
    async fn test_total_transport_outage_yields_zeroed_response() {
        // every sub-fetch fails individually: no fabricated zero-balance
        // watch-list entries, the response collapses to the zero values
        let provider = ChainProvider::from_chain(
            ChainId::Bsc,
            &MemorySource::new(),
            Arc::new(MockTransport::new()),
        );
        let response = provider
            .get_balances(
                "0x78697a9cfc48C1e9d1040172d51833EF78083b10",
                NetworkTier::Mainnet,
            )
            .await;
        assert_eq!(response, BalancesResponse::zeroed());
    }

    #[tokio::test]
    async fn test_failed_primary_falls_back_to_alternate_source() {
        let mut provider = stub_provider(Arc::new(FailingStrategy));
        provider.fallback_kind = Some(StrategyKind::EvmRpc);
        provider
            .mainnet
            .fallback
            .set(Arc::new(StubStrategy {
                raw: EvmRawBalances {
                    native: Some("3000000000000000000".to_string()),
                    tokens: vec![],
                    nfts: vec![],
                },
                fee: RawFeeData::default(),
            }))
            .ok();

        let response = provider.get_balances("0xabc", NetworkTier::Mainnet).await;
        assert_eq!(response.native_balance.balance, "3");
    }

    #[tokio::test]
    async fn test_gas_price_selection_and_estimate() {
        let provider = stub_provider(Arc::new(StubStrategy {
            raw: EvmRawBalances::default(),
            fee: RawFeeData {
                gas_price: Some("10000000000".to_string()),
                max_fee_per_gas: Some("20000000000".to_string()),
                max_priority_fee_per_gas: None,
            },
        }));

        let price = provider.gas_price(NetworkTier::Mainnet).await.unwrap();
        assert_eq!(price, "20000000000");

        let tx = GasEstimateRequest {
            from: "0xabc".to_string(),
            to: "0xdef".to_string(),
            data: None,
            value: None,
        };
        let gas = provider
            .estimate_gas(&tx, NetworkTier::Mainnet)
            .await
            .unwrap();
        assert_eq!(gas, "21000");
    }

    #[tokio::test]
    async fn test_gas_price_propagates_errors() {
        let provider = stub_provider(Arc::new(FailingStrategy));
        assert!(provider.gas_price(NetworkTier::Mainnet).await.is_err());
    }

    #[test]
    fn test_credential_resolution_and_support() {
        let source = MemorySource::new().with("ETHEREUM_MAINNET_API_KEY", "key-1");
        let provider = ChainProvider::from_chain(
            ChainId::Ethereum,
            &source,
            Arc::new(MockTransport::new()),
        );

        assert!(provider.is_supported());
        assert_eq!(provider.api_key(NetworkTier::Mainnet).unwrap(), "key-1");
        assert!(matches!(
            provider.api_key(NetworkTier::Testnet),
            Err(Error::Configuration(_))
        ));
        // no explicit endpoint configured, the built-in default applies
        assert_eq!(
            provider.base_url(NetworkTier::Mainnet).unwrap(),
            "https://ethereum-rpc.publicnode.com"
        );
    }

    #[test]
    fn test_unconfigured_provider_is_unsupported() {
        let mut provider = stub_provider(Arc::new(FailingStrategy));
        provider.mainnet.endpoint = None;
        provider.testnet.endpoint = None;
        assert!(!provider.is_supported());
        assert!(matches!(
            provider.base_url(NetworkTier::Mainnet),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_source_override_switches_strategy_kind() {
        let source = MemorySource::new().with("ETHEREUM_SOURCE", "rpc");
        let provider = ChainProvider::from_chain(
            ChainId::Ethereum,
            &source,
            Arc::new(MockTransport::new()),
        );
        assert_eq!(provider.kind, StrategyKind::EvmRpc);
        assert_eq!(provider.fallback_kind, Some(StrategyKind::EvmSdk));
    }

    #[test]
    fn test_token_account_layout_override() {
        let source = MemorySource::new()
            .with("SOLANA_TOKEN_ACCOUNT_SIZE", "182")
            .with("SOLANA_TOKEN_ACCOUNT_OWNER_OFFSET", "40");
        let layout = resolve_layout(&source);
        assert_eq!(layout.data_size, 182);
        assert_eq!(layout.owner_offset, 40);
    }

    #[tokio::test]
    async fn test_check_health_swallows_errors() {
        let healthy = ChainProvider::from_chain(
            ChainId::Ethereum,
            &MemorySource::new(),
            Arc::new(MockTransport::new().with_result("eth_blockNumber", json!("0x10"))),
        );
        assert!(healthy.check_health(NetworkTier::Mainnet).await);

        let unhealthy = ChainProvider::from_chain(
            ChainId::Ethereum,
            &MemorySource::new(),
            Arc::new(MockTransport::new()),
        );
        assert!(!unhealthy.check_health(NetworkTier::Mainnet).await);
    }

    #[tokio::test]
    async fn test_call_rpc_method_propagates_errors() {
        let provider = ChainProvider::from_chain(
            ChainId::Solana,
            &MemorySource::new(),
            Arc::new(MockTransport::new()),
        );
        let err = provider
            .call_rpc_method("getSlot", json!([]), NetworkTier::Mainnet)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[derive(Clone)]
    struct CaptureWriter(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CaptureWriter {
        type Writer = CaptureWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_strategy_failure_events_carry_chain_and_tier() {
        let sink = Arc::new(std::sync::Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::fmt()
            .with_writer(CaptureWriter(sink.clone()))
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        // sub-fetch failures are recorded inside the strategy, below the
        // provider span that supplies the routing fields
        let provider = ChainProvider::from_chain(
            ChainId::Bsc,
            &MemorySource::new(),
            Arc::new(MockTransport::new()),
        );
        provider
            .get_balances(
                "0x78697a9cfc48C1e9d1040172d51833EF78083b10",
                NetworkTier::Mainnet,
            )
            .await;

        let output = String::from_utf8(sink.lock().unwrap().clone()).unwrap();
        assert!(output.contains("balanceOf failed"), "{}", output);
        assert!(output.contains("chain=bsc"), "{}", output);
        assert!(output.contains("tier=mainnet"), "{}", output);
        assert!(output.contains("operation=get_balances"), "{}", output);
    }
}

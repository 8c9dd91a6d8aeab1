mod evm_rpc;
mod evm_sdk;
mod solana_rpc;
mod solana_sdk;

pub use evm_rpc::EvmRpcStrategy;
pub use evm_sdk::EvmSdkStrategy;
pub use solana_rpc::SolanaRpcStrategy;
pub use solana_sdk::SolanaSdkStrategy;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::chain::WatchList;
use crate::error::Result;
use crate::transport::RpcTransport;

/// Fetches raw, source-shaped data from one upstream. A strategy instance
/// binds to exactly one endpoint (one chain, one tier); it performs no unit
/// conversion and no default substitution, which is strictly the adapter's
/// job.
#[async_trait]
pub trait BalanceStrategy: Send + Sync {
    /// Fetch native balance, token list, and NFT list in parallel. A failed
    /// sub-fetch never fails the whole call: a failed native read is
    /// recorded as an absent slot, a watch-list entry whose balance read
    /// failed is dropped (a failed read is not a zero holding).
    async fn raw_balances(&self, address: &str) -> Result<RawBalances>;

    /// Fetch fee data, including EIP-1559 fields when the source exposes
    /// them. Selection between the fields happens downstream.
    async fn raw_gas_price(&self) -> Result<RawFeeData>;

    /// Forward a gas-estimation call and return the raw integer string.
    /// Fails loudly: an estimate is needed synchronously by callers that
    /// cannot proceed with a wrong value.
    async fn raw_estimate_gas(&self, tx: &GasEstimateRequest) -> Result<String>;
}

/// Concrete strategy implementations, keyed per chain in the routing table
/// and overridable through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    EvmSdk,
    EvmRpc,
    SolanaSdk,
    SolanaRpc,
}

impl StrategyKind {
    /// The alternate source for the same family, tried once before a
    /// request degrades to the zero-value response.
    pub fn fallback(self) -> Option<StrategyKind> {
        match self {
            StrategyKind::EvmSdk => Some(StrategyKind::EvmRpc),
            StrategyKind::EvmRpc => Some(StrategyKind::EvmSdk),
            StrategyKind::SolanaSdk => Some(StrategyKind::SolanaRpc),
            StrategyKind::SolanaRpc => Some(StrategyKind::SolanaSdk),
        }
    }
}

/// Construct a strategy bound to one endpoint. Strategies validate the
/// endpoint and build their client here, once, so calls reuse it.
pub fn build_strategy(
    kind: StrategyKind,
    endpoint: &str,
    transport: Arc<dyn RpcTransport>,
    watch_list: &WatchList,
    layout: TokenAccountLayout,
) -> Result<Arc<dyn BalanceStrategy>> {
    Ok(match kind {
        StrategyKind::EvmSdk => Arc::new(EvmSdkStrategy::new(endpoint, watch_list.clone())?),
        StrategyKind::EvmRpc => Arc::new(EvmRpcStrategy::new(
            endpoint,
            transport,
            watch_list.clone(),
        )),
        StrategyKind::SolanaSdk => Arc::new(SolanaSdkStrategy::new(endpoint)),
        StrategyKind::SolanaRpc => Arc::new(SolanaRpcStrategy::new(endpoint, transport, layout)),
    })
}

/// Raw payloads, tagged per chain family. Each variant is consumed only by
/// its matching adapter; the unified model is the only cross-cutting type.
#[derive(Debug, Clone)]
pub enum RawBalances {
    Evm(EvmRawBalances),
    Solana(SolanaRawBalances),
}

/// Unnormalized EVM payload. Amounts are integer strings in the smallest
/// unit, either decimal (SDK source) or 0x-hex (raw RPC source).
#[derive(Debug, Clone, Default)]
pub struct EvmRawBalances {
    pub native: Option<String>,
    pub tokens: Vec<EvmRawToken>,
    pub nfts: Vec<EvmRawNft>,
}

#[derive(Debug, Clone)]
pub struct EvmRawToken {
    pub contract: String,
    pub amount: String,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub decimals: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct EvmRawNft {
    pub contract: String,
    pub token_id: String,
    pub collection: Option<String>,
    pub image: Option<String>,
}

/// Unnormalized Solana payload. Token-account order is preserved as the
/// upstream returned it.
#[derive(Debug, Clone, Default)]
pub struct SolanaRawBalances {
    pub lamports: Option<u64>,
    pub token_accounts: Vec<SolanaRawTokenAccount>,
    pub nfts: Vec<SolanaRawNft>,
}

#[derive(Debug, Clone)]
pub struct SolanaRawTokenAccount {
    pub mint: String,
    pub amount: String,
    pub decimals: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct SolanaRawNft {
    pub mint: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

/// Fee data as reported by one source; fields are absent when the source
/// does not expose them.
#[derive(Debug, Clone, Default)]
pub struct RawFeeData {
    pub gas_price: Option<String>,
    pub max_fee_per_gas: Option<String>,
    pub max_priority_fee_per_gas: Option<String>,
}

/// Minimal transaction descriptor forwarded to upstream gas estimation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GasEstimateRequest {
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// SPL token-account layout used by the RPC-based NFT scan. The expected
/// account size and owner byte offset ride along as configuration because
/// the upstream schema can change underneath a hardcoded constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccountLayout {
    pub data_size: u64,
    pub owner_offset: u64,
}

impl Default for TokenAccountLayout {
    fn default() -> Self {
        Self {
            data_size: 165,
            owner_offset: 32,
        }
    }
}

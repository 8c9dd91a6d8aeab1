mod adapter;
mod chain;
mod config;
mod error;
mod model;
mod provider;
mod registry;
mod strategy;
mod transport;

pub use chain::{ChainConfig, ChainFamily, ChainId, NetworkTier, WatchList};
pub use config::{ConfigSource, EnvSource, MemorySource};
pub use error::{Error, Result};
pub use model::{
    BalancesResponse, NativeBalance, NftBalance, NftCollection, NftMetadata, TokenBalance,
    TokenMetadata,
};
pub use provider::ChainProvider;
pub use registry::ProviderRegistry;
pub use strategy::{
    BalanceStrategy, EvmRawBalances, EvmRawNft, EvmRawToken, GasEstimateRequest, RawBalances,
    RawFeeData, SolanaRawBalances, SolanaRawNft, SolanaRawTokenAccount, StrategyKind,
    TokenAccountLayout,
};
pub use transport::{HttpTransport, RpcTransport};

use std::sync::Arc;

/// One-shot balances lookup reading configuration from the environment.
/// Long-lived callers should hold a [`ProviderRegistry`] instead, so
/// provider and strategy clients are reused across calls.
pub async fn get_balances(
    chain: &str,
    address: &str,
    tier: NetworkTier,
) -> Result<BalancesResponse> {
    let registry = ProviderRegistry::new(Arc::new(EnvSource));
    registry.get_balances(chain, address, tier).await
}

use alloy::primitives::{Address, Bytes, TxKind, U256};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{BlockNumberOrTag, TransactionInput, TransactionRequest};
use alloy::sol;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::chain::WatchList;
use crate::error::{Error, Result};
use crate::model::parse_raw_amount;
use crate::strategy::{
    BalanceStrategy, EvmRawBalances, EvmRawNft, EvmRawToken, GasEstimateRequest, RawBalances,
    RawFeeData,
};

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function symbol() external view returns (string);
        function name() external view returns (string);
        function decimals() external view returns (uint8);
    }

    #[sol(rpc)]
    interface IERC721 {
        function balanceOf(address owner) external view returns (uint256);
        function tokenOfOwnerByIndex(address owner, uint256 index) external view returns (uint256);
        function name() external view returns (string);
    }
}

/// NFT enumeration cap per contract; wallets holding more than this many
/// pieces of one collection get a truncated listing.
const MAX_NFTS_PER_CONTRACT: u64 = 20;

/// EVM strategy backed by the alloy SDK client. The HTTP client is built
/// once at construction and shared by every call.
pub struct EvmSdkStrategy {
    provider: RootProvider<Http<Client>>,
    watch_list: WatchList,
}

impl EvmSdkStrategy {
    pub fn new(rpc_url: &str, watch_list: WatchList) -> Result<Self> {
        let url = rpc_url
            .parse()
            .map_err(|e| Error::Configuration(format!("invalid rpc url {}: {}", rpc_url, e)))?;
        Ok(Self {
            provider: RootProvider::new_http(url),
            watch_list,
        })
    }

    async fn fetch_token(&self, owner: Address, contract: &str) -> Option<EvmRawToken> {
        let token_addr: Address = match contract.parse() {
            Ok(addr) => addr,
            Err(err) => {
                warn!(contract = %contract, error = %err, "skipping unparseable token contract");
                return None;
            }
        };
        let erc20 = IERC20::new(token_addr, self.provider.clone());
        let balance_call = erc20.balanceOf(owner);
        let symbol_call = erc20.symbol();
        let name_call = erc20.name();
        let decimals_call = erc20.decimals();
        let (balance, symbol, name, decimals) = tokio::join!(
            balance_call.call(),
            symbol_call.call(),
            name_call.call(),
            decimals_call.call(),
        );
        let amount = match balance {
            Ok(value) => value._0.to_string(),
            Err(err) => {
                warn!(contract = %contract, error = %err, "balanceOf failed, dropping watch-list entry");
                return None;
            }
        };
        Some(EvmRawToken {
            contract: contract.to_string(),
            amount,
            symbol: symbol.ok().map(|v| v._0),
            name: name.ok().map(|v| v._0),
            decimals: decimals.ok().map(|v| v._0),
        })
    }

    async fn fetch_tokens(&self, owner: Address) -> Vec<EvmRawToken> {
        // metadata lookups complete out of order; join_all re-associates
        // each result to its originating watch-list entry by index
        join_all(
            self.watch_list
                .tokens
                .iter()
                .map(|contract| self.fetch_token(owner, contract)),
        )
        .await
        .into_iter()
        .flatten()
        .collect()
    }

    async fn fetch_nfts(&self, owner: Address) -> Vec<EvmRawNft> {
        let mut nfts = Vec::new();
        for contract in &self.watch_list.nft_contracts {
            let addr: Address = match contract.parse() {
                Ok(addr) => addr,
                Err(err) => {
                    warn!(contract = %contract, error = %err, "skipping unparseable NFT contract");
                    continue;
                }
            };
            let erc721 = IERC721::new(addr, self.provider.clone());
            let held = match erc721.balanceOf(owner).call().await {
                Ok(value) => value._0,
                Err(err) => {
                    warn!(contract = %contract, error = %err, "NFT balanceOf failed");
                    continue;
                }
            };
            let collection = erc721.name().call().await.ok().map(|v| v._0);
            let held = held.min(U256::from(MAX_NFTS_PER_CONTRACT)).to::<u64>();
            let ids = join_all((0..held).map(|index| {
                let call = erc721.tokenOfOwnerByIndex(owner, U256::from(index));
                async move { call.call().await }
            }))
            .await;
            for id in ids.into_iter().flatten() {
                nfts.push(EvmRawNft {
                    contract: contract.clone(),
                    token_id: id._0.to_string(),
                    collection: collection.clone(),
                    image: None,
                });
            }
        }
        nfts
    }
}

#[async_trait]
impl BalanceStrategy for EvmSdkStrategy {
    async fn raw_balances(&self, address: &str) -> Result<RawBalances> {
        let owner: Address = address
            .parse()
            .map_err(|e| Error::Transport(format!("invalid address '{}': {}", address, e)))?;

        let (native, tokens, nfts) = tokio::join!(
            async {
                self.provider
                    .get_balance(owner)
                    .block_id(BlockNumberOrTag::Latest.into())
                    .await
            },
            self.fetch_tokens(owner),
            self.fetch_nfts(owner),
        );

        let native = match native {
            Ok(value) => Some(value.to_string()),
            Err(err) => {
                warn!(error = %err, "native balance fetch failed, recording empty slot");
                None
            }
        };

        Ok(RawBalances::Evm(EvmRawBalances {
            native,
            tokens,
            nfts,
        }))
    }

    async fn raw_gas_price(&self) -> Result<RawFeeData> {
        let gas_price = self
            .provider
            .get_gas_price()
            .await
            .map_err(Error::transport)?;
        let mut fee = RawFeeData {
            gas_price: Some(gas_price.to_string()),
            ..Default::default()
        };
        match self.provider.estimate_eip1559_fees(None).await {
            Ok(estimate) => {
                fee.max_fee_per_gas = Some(estimate.max_fee_per_gas.to_string());
                fee.max_priority_fee_per_gas = Some(estimate.max_priority_fee_per_gas.to_string());
            }
            Err(err) => {
                debug!(error = %err, "EIP-1559 estimation unavailable, legacy gas price only")
            }
        }
        Ok(fee)
    }

    async fn raw_estimate_gas(&self, tx: &GasEstimateRequest) -> Result<String> {
        let from: Address = tx
            .from
            .parse()
            .map_err(|e| Error::Transport(format!("invalid from address: {}", e)))?;
        let to: Address = tx
            .to
            .parse()
            .map_err(|e| Error::Transport(format!("invalid to address: {}", e)))?;

        let mut request = TransactionRequest {
            from: Some(from),
            to: Some(TxKind::Call(to)),
            ..Default::default()
        };
        if let Some(value) = &tx.value {
            request.value = Some(parse_raw_amount(value)?);
        }
        if let Some(data) = &tx.data {
            let bytes: Bytes = data
                .parse()
                .map_err(|e| Error::Transport(format!("invalid calldata: {}", e)))?;
            request.input = TransactionInput::new(bytes);
        }

        let gas = self
            .provider
            .estimate_gas(&request)
            .await
            .map_err(Error::transport)?;
        Ok(gas.to_string())
    }
}

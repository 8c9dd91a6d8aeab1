use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{json, Value};
use tracing::warn;

use crate::chain::WatchList;
use crate::error::{Error, Result};
use crate::model::parse_raw_amount;
use crate::strategy::{
    BalanceStrategy, EvmRawBalances, EvmRawNft, EvmRawToken, GasEstimateRequest, RawBalances,
    RawFeeData,
};
use crate::transport::{rpc_call, RpcTransport};

// 4-byte function selectors for the eth_call-encoded reads
const SEL_BALANCE_OF: &str = "0x70a08231"; // balanceOf(address)
const SEL_DECIMALS: &str = "0x313ce567"; // decimals()
const SEL_TOKEN_OF_OWNER_BY_INDEX: &str = "0x2f745c59"; // tokenOfOwnerByIndex(address,uint256)

const MAX_NFTS_PER_CONTRACT: u64 = 20;

/// EVM strategy over a bare JSON-RPC endpoint. Exposes the same raw shape
/// as the SDK strategy, minus ABI string decoding: symbol and name stay
/// absent here and the adapter substitutes the documented defaults.
pub struct EvmRpcStrategy {
    endpoint: String,
    transport: Arc<dyn RpcTransport>,
    watch_list: WatchList,
}

impl EvmRpcStrategy {
    pub fn new(endpoint: &str, transport: Arc<dyn RpcTransport>, watch_list: WatchList) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            transport,
            watch_list,
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        rpc_call(self.transport.as_ref(), &self.endpoint, method, params).await
    }

    async fn eth_call(&self, to: &str, data: String) -> Result<String> {
        let result = self
            .call("eth_call", json!([{"to": to, "data": data}, "latest"]))
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Transport("eth_call returned a non-string result".to_string()))
    }

    async fn fetch_token(&self, owner_word: &str, contract: &str) -> Option<EvmRawToken> {
        let balance_data = format!("{}{}", SEL_BALANCE_OF, owner_word);
        let amount = match self.eth_call(contract, balance_data).await {
            Ok(balance) => balance,
            Err(err) => {
                warn!(contract = %contract, error = %err, "balanceOf failed, dropping watch-list entry");
                return None;
            }
        };
        let decimals = self
            .eth_call(contract, SEL_DECIMALS.to_string())
            .await
            .ok()
            .and_then(|word| decode_u8_word(&word));
        Some(EvmRawToken {
            contract: contract.to_string(),
            amount,
            symbol: None,
            name: None,
            decimals,
        })
    }

    async fn fetch_nfts(&self, owner_word: &str) -> Vec<EvmRawNft> {
        let mut nfts = Vec::new();
        for contract in &self.watch_list.nft_contracts {
            let balance_data = format!("{}{}", SEL_BALANCE_OF, owner_word);
            let held = match self.eth_call(contract, balance_data).await {
                Ok(word) => parse_raw_amount(&word)
                    .map(|v| v.min(alloy::primitives::U256::from(MAX_NFTS_PER_CONTRACT)).to::<u64>())
                    .unwrap_or(0),
                Err(err) => {
                    warn!(contract = %contract, error = %err, "NFT balanceOf failed");
                    continue;
                }
            };
            let ids = join_all((0..held).map(|index| {
                let data = format!(
                    "{}{}{:064x}",
                    SEL_TOKEN_OF_OWNER_BY_INDEX, owner_word, index
                );
                self.eth_call(contract, data)
            }))
            .await;
            for id in ids.into_iter().flatten() {
                nfts.push(EvmRawNft {
                    contract: contract.clone(),
                    token_id: id,
                    collection: None,
                    image: None,
                });
            }
        }
        nfts
    }
}

#[async_trait]
impl BalanceStrategy for EvmRpcStrategy {
    async fn raw_balances(&self, address: &str) -> Result<RawBalances> {
        let owner_word = encode_address_word(address)?;

        let (native, tokens, nfts) = tokio::join!(
            self.call("eth_getBalance", json!([address, "latest"])),
            async {
                join_all(
                    self.watch_list
                        .tokens
                        .iter()
                        .map(|contract| self.fetch_token(&owner_word, contract)),
                )
                .await
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
            },
            self.fetch_nfts(&owner_word),
        );

        let native = match native {
            Ok(value) => value.as_str().map(str::to_string),
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
        let gas_price = self.call("eth_gasPrice", json!([])).await?;
        let gas_price = gas_price
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Transport("eth_gasPrice returned a non-string".to_string()))?;
        // this source only exposes the legacy price; the priority fee rides
        // along when the node supports it, maxFeePerGas stays absent
        let max_priority_fee_per_gas = self
            .call("eth_maxPriorityFeePerGas", json!([]))
            .await
            .ok()
            .and_then(|v| v.as_str().map(str::to_string));
        Ok(RawFeeData {
            gas_price: Some(gas_price),
            max_fee_per_gas: None,
            max_priority_fee_per_gas,
        })
    }

    async fn raw_estimate_gas(&self, tx: &GasEstimateRequest) -> Result<String> {
        let mut descriptor = json!({"from": tx.from, "to": tx.to});
        if let Some(data) = &tx.data {
            descriptor["data"] = json!(data);
        }
        if let Some(value) = &tx.value {
            // the wire format wants hex; accept decimal input too
            let amount = parse_raw_amount(value)?;
            descriptor["value"] = json!(format!("0x{:x}", amount));
        }
        let result = self.call("eth_estimateGas", json!([descriptor])).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::Transport("eth_estimateGas returned a non-string".to_string()))
    }
}

/// ABI-encode an address as one 32-byte word (no 0x prefix).
fn encode_address_word(address: &str) -> Result<String> {
    let hex = address.strip_prefix("0x").unwrap_or(address);
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(Error::Transport(format!(
            "'{}' is not a 20-byte hex address",
            address
        )));
    }
    Ok(format!("{:0>64}", hex.to_ascii_lowercase()))
}

/// Decode a uint8 from a 32-byte return word.
fn decode_u8_word(word: &str) -> Option<u8> {
    let value = parse_raw_amount(word).ok()?;
    if value <= alloy::primitives::U256::from(u8::MAX) {
        Some(value.to::<u8>())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::MockTransport;

    const OWNER: &str = "0x78697a9cfc48C1e9d1040172d51833EF78083b10";
    const USDC: &str = "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238";
    const DAI: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";

    fn watch_list() -> WatchList {
        WatchList {
            tokens: vec![USDC.to_string(), DAI.to_string()],
            nft_contracts: vec![],
        }
    }

    #[test]
    fn test_encode_address_word() {
        let word = encode_address_word(OWNER).unwrap();
        assert_eq!(word.len(), 64);
        assert!(word.starts_with("000000000000000000000000"));
        assert!(word.ends_with("78083b10"));
        assert!(encode_address_word("0x123").is_err());
    }

    #[tokio::test]
    async fn test_raw_balances_preserves_watch_list_order() {
        let transport = MockTransport::new()
            .with_result("eth_getBalance", json!("0xde0b6b3a7640000"))
            .with_result("eth_call:0x70a08231", json!("0x0f4240"))
            .with_result(
                "eth_call:0x313ce567",
                json!("0x0000000000000000000000000000000000000000000000000000000000000006"),
            );
        let strategy = EvmRpcStrategy::new("http://unused", Arc::new(transport), watch_list());

        let RawBalances::Evm(raw) = strategy.raw_balances(OWNER).await.unwrap() else {
            panic!("expected EVM payload");
        };
        assert_eq!(raw.native.as_deref(), Some("0xde0b6b3a7640000"));
        assert_eq!(raw.tokens.len(), 2);
        assert_eq!(raw.tokens[0].contract, USDC);
        assert_eq!(raw.tokens[1].contract, DAI);
        assert_eq!(raw.tokens[0].decimals, Some(6));
        // this source never decodes ABI strings
        assert_eq!(raw.tokens[0].symbol, None);
    }

    #[tokio::test]
    async fn test_failed_sub_fetch_degrades_to_partial_payload() {
        // no eth_getBalance registered: that slot fails, tokens still land
        let transport =
            MockTransport::new().with_result("eth_call:0x70a08231", json!("0x0f4240"));
        let strategy = EvmRpcStrategy::new("http://unused", Arc::new(transport), watch_list());

        let RawBalances::Evm(raw) = strategy.raw_balances(OWNER).await.unwrap() else {
            panic!("expected EVM payload");
        };
        assert_eq!(raw.native, None);
        assert_eq!(raw.tokens.len(), 2);
        assert_eq!(raw.tokens[0].amount, "0x0f4240");
        assert_eq!(raw.tokens[0].decimals, None);
    }

    #[tokio::test]
    async fn test_failed_token_reads_drop_the_entries() {
        // every call fails: a failed read is not a zero holding, so the
        // payload must carry no fabricated watch-list entries
        let strategy = EvmRpcStrategy::new(
            "http://unused",
            Arc::new(MockTransport::new()),
            watch_list(),
        );

        let RawBalances::Evm(raw) = strategy.raw_balances(OWNER).await.unwrap() else {
            panic!("expected EVM payload");
        };
        assert_eq!(raw.native, None);
        assert!(raw.tokens.is_empty());
        assert!(raw.nfts.is_empty());
    }

    #[tokio::test]
    async fn test_gas_price_without_priority_fee() {
        let transport = MockTransport::new().with_result("eth_gasPrice", json!("0x2540be400"));
        let strategy = EvmRpcStrategy::new("http://unused", Arc::new(transport), watch_list());

        let fee = strategy.raw_gas_price().await.unwrap();
        assert_eq!(fee.gas_price.as_deref(), Some("0x2540be400"));
        assert_eq!(fee.max_fee_per_gas, None);
        assert_eq!(fee.max_priority_fee_per_gas, None);
    }

    #[tokio::test]
    async fn test_estimate_gas_fails_loudly() {
        let strategy = EvmRpcStrategy::new(
            "http://unused",
            Arc::new(MockTransport::new()),
            watch_list(),
        );
        let tx = GasEstimateRequest {
            from: OWNER.to_string(),
            to: USDC.to_string(),
            data: None,
            value: Some("1000".to_string()),
        };
        assert!(matches!(
            strategy.raw_estimate_gas(&tx).await,
            Err(Error::Transport(_))
        ));
    }
}

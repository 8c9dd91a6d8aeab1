use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::{Error, Result};
use crate::strategy::{
    BalanceStrategy, GasEstimateRequest, RawBalances, RawFeeData, SolanaRawBalances, SolanaRawNft,
    SolanaRawTokenAccount, TokenAccountLayout,
};
use crate::transport::{rpc_call, RpcTransport};

const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Solana strategy over a bare JSON-RPC endpoint. Token accounts arrive
/// jsonParsed; the NFT scan goes through `getProgramAccounts` filtered on
/// the configured token-account layout.
pub struct SolanaRpcStrategy {
    endpoint: String,
    transport: Arc<dyn RpcTransport>,
    layout: TokenAccountLayout,
}

impl SolanaRpcStrategy {
    pub fn new(endpoint: &str, transport: Arc<dyn RpcTransport>, layout: TokenAccountLayout) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            transport,
            layout,
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        rpc_call(self.transport.as_ref(), &self.endpoint, method, params).await
    }

    async fn fetch_token_accounts(&self, address: &str) -> Result<Vec<SolanaRawTokenAccount>> {
        let result = self
            .call(
                "getTokenAccountsByOwner",
                json!([
                    address,
                    {"programId": TOKEN_PROGRAM_ID},
                    {"encoding": "jsonParsed"},
                ]),
            )
            .await?;
        Ok(parse_keyed_accounts(result.get("value").unwrap_or(&Value::Null)))
    }

    async fn fetch_nfts(&self, address: &str) -> Result<Vec<SolanaRawNft>> {
        let result = self
            .call(
                "getProgramAccounts",
                json!([
                    TOKEN_PROGRAM_ID,
                    {
                        "encoding": "jsonParsed",
                        "filters": [
                            {"dataSize": self.layout.data_size},
                            {"memcmp": {"offset": self.layout.owner_offset, "bytes": address}},
                        ],
                    },
                ]),
            )
            .await?;
        // getProgramAccounts returns a bare array unless context is requested
        let accounts = result.get("value").unwrap_or(&result);
        Ok(parse_keyed_accounts(accounts)
            .into_iter()
            .filter(|a| a.decimals == Some(0) && a.amount == "1")
            .map(|a| SolanaRawNft {
                mint: a.mint,
                name: None,
                image: None,
            })
            .collect())
    }
}

fn parse_keyed_accounts(value: &Value) -> Vec<SolanaRawTokenAccount> {
    value
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(parse_keyed_account)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default()
}

fn parse_keyed_account(entry: &Value) -> Option<SolanaRawTokenAccount> {
    let info = entry.pointer("/account/data/parsed/info")?;
    let mint = info.get("mint")?.as_str()?.to_string();
    let token_amount = info.get("tokenAmount")?;
    let amount = token_amount.get("amount")?.as_str()?.to_string();
    let decimals = token_amount
        .get("decimals")
        .and_then(Value::as_u64)
        .map(|d| d as u8);
    Some(SolanaRawTokenAccount {
        mint,
        amount,
        decimals,
    })
}

#[async_trait]
impl BalanceStrategy for SolanaRpcStrategy {
    async fn raw_balances(&self, address: &str) -> Result<RawBalances> {
        let (lamports, token_accounts, nfts) = tokio::join!(
            self.call("getBalance", json!([address])),
            self.fetch_token_accounts(address),
            self.fetch_nfts(address),
        );

        let lamports = match lamports {
            Ok(result) => result.pointer("/value").and_then(Value::as_u64),
            Err(err) => {
                warn!(error = %err, "native balance fetch failed, recording empty slot");
                None
            }
        };
        let token_accounts = token_accounts.unwrap_or_else(|err| {
            warn!(error = %err, "token account fetch failed, recording empty slot");
            Vec::new()
        });
        // fungible list may double-report NFT accounts; keep the lists disjoint
        let token_accounts = token_accounts
            .into_iter()
            .filter(|a| !(a.decimals == Some(0) && a.amount == "1"))
            .collect();
        let nfts = nfts.unwrap_or_else(|err| {
            warn!(error = %err, "NFT scan failed, recording empty slot");
            Vec::new()
        });

        Ok(RawBalances::Solana(SolanaRawBalances {
            lamports,
            token_accounts,
            nfts,
        }))
    }

    async fn raw_gas_price(&self) -> Result<RawFeeData> {
        Err(Error::Configuration(
            "gas price is not defined for the solana family".to_string(),
        ))
    }

    async fn raw_estimate_gas(&self, _tx: &GasEstimateRequest) -> Result<String> {
        Err(Error::Configuration(
            "gas estimation is not defined for the solana family".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::MockTransport;

    const OWNER: &str = "8vJ1EEeJBSX8UZetuHY7d2SiGjdw2AhfamzfxokPsCF4";
    const USDC_MINT: &str = "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU";
    const NFT_MINT: &str = "HzwqbKZw8HxMN6bF2yFZNrht3c2iXXzpKcFu7uBEDKtr";

    fn keyed_account(mint: &str, amount: &str, decimals: u8) -> Value {
        json!({
            "pubkey": "11111111111111111111111111111111",
            "account": {
                "data": {
                    "program": "spl-token",
                    "parsed": {
                        "info": {
                            "mint": mint,
                            "tokenAmount": {"amount": amount, "decimals": decimals},
                        },
                        "type": "account",
                    },
                    "space": 165,
                },
            },
        })
    }

    fn transport() -> MockTransport {
        MockTransport::new()
            .with_result("getBalance", json!({"context": {"slot": 1}, "value": 1_500_000_000u64}))
            .with_result(
                "getTokenAccountsByOwner",
                json!({
                    "context": {"slot": 1},
                    "value": [
                        keyed_account(USDC_MINT, "20000", 6),
                        keyed_account(NFT_MINT, "1", 0),
                    ],
                }),
            )
            .with_result(
                "getProgramAccounts",
                json!([
                    keyed_account(USDC_MINT, "20000", 6),
                    keyed_account(NFT_MINT, "1", 0),
                ]),
            )
    }

    #[tokio::test]
    async fn test_raw_balances_separates_nfts_from_tokens() {
        let strategy = SolanaRpcStrategy::new(
            "http://unused",
            Arc::new(transport()),
            TokenAccountLayout::default(),
        );
        let RawBalances::Solana(raw) = strategy.raw_balances(OWNER).await.unwrap() else {
            panic!("expected Solana payload");
        };
        assert_eq!(raw.lamports, Some(1_500_000_000));
        assert_eq!(raw.token_accounts.len(), 1);
        assert_eq!(raw.token_accounts[0].mint, USDC_MINT);
        assert_eq!(raw.nfts.len(), 1);
        assert_eq!(raw.nfts[0].mint, NFT_MINT);
    }

    #[tokio::test]
    async fn test_every_sub_fetch_failing_yields_empty_payload() {
        let strategy = SolanaRpcStrategy::new(
            "http://unused",
            Arc::new(MockTransport::new()),
            TokenAccountLayout::default(),
        );
        let RawBalances::Solana(raw) = strategy.raw_balances(OWNER).await.unwrap() else {
            panic!("expected Solana payload");
        };
        assert_eq!(raw.lamports, None);
        assert!(raw.token_accounts.is_empty());
        assert!(raw.nfts.is_empty());
    }
}

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use async_trait::async_trait;
use base64::Engine;
use futures::future::join_all;
use solana_account_decoder::UiAccountData;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::program_pack::Pack;
use solana_sdk::pubkey::Pubkey;
use tracing::warn;

use crate::error::{Error, Result};
use crate::strategy::{
    BalanceStrategy, GasEstimateRequest, RawBalances, RawFeeData, SolanaRawBalances, SolanaRawNft,
    SolanaRawTokenAccount,
};

/// Solana strategy backed by the solana-client SDK.
pub struct SolanaSdkStrategy {
    client: RpcClient,
}

impl SolanaSdkStrategy {
    pub fn new(rpc_url: &str) -> Self {
        Self {
            client: RpcClient::new(rpc_url.to_string()),
        }
    }

    async fn mint_decimals(&self, mint: &str) -> Option<u8> {
        let pubkey = Pubkey::from_str(mint).ok()?;
        let account = self.client.get_account(&pubkey).await.ok()?;
        spl_token::state::Mint::unpack(&account.data)
            .ok()
            .map(|m| m.decimals)
    }

    /// Backfill decimals for accounts whose binary data carries none. Mint
    /// lookups run in parallel and are re-associated by mint address, not
    /// completion order.
    async fn backfill_decimals(&self, accounts: &mut [SolanaRawTokenAccount]) {
        let mut seen = HashSet::new();
        let missing: Vec<String> = accounts
            .iter()
            .filter(|a| a.decimals.is_none())
            .filter(|a| seen.insert(a.mint.clone()))
            .map(|a| a.mint.clone())
            .collect();
        if missing.is_empty() {
            return;
        }
        let fetched = join_all(missing.iter().map(|mint| self.mint_decimals(mint))).await;
        let resolved: HashMap<&String, u8> = missing
            .iter()
            .zip(fetched)
            .filter_map(|(mint, decimals)| decimals.map(|d| (mint, d)))
            .collect();
        for account in accounts.iter_mut() {
            if account.decimals.is_none() {
                account.decimals = resolved.get(&account.mint).copied();
            }
        }
    }
}

/// Decode one token account in either encoding the RPC may return.
fn decode_token_account(data: &UiAccountData) -> Option<SolanaRawTokenAccount> {
    match data {
        UiAccountData::Binary(encoded, _) | UiAccountData::LegacyBinary(encoded) => {
            let engine = base64::engine::general_purpose::STANDARD;
            let decoded = engine.decode(encoded).ok()?;
            let account = spl_token::state::Account::unpack(&decoded).ok()?;
            Some(SolanaRawTokenAccount {
                mint: account.mint.to_string(),
                amount: account.amount.to_string(),
                decimals: None,
            })
        }
        UiAccountData::Json(parsed) => {
            let info = parsed.parsed.get("info")?;
            let mint = info.get("mint")?.as_str()?.to_string();
            let token_amount = info.get("tokenAmount")?;
            let amount = token_amount.get("amount")?.as_str()?.to_string();
            let decimals = token_amount
                .get("decimals")
                .and_then(serde_json::Value::as_u64)
                .map(|d| d as u8);
            Some(SolanaRawTokenAccount {
                mint,
                amount,
                decimals,
            })
        }
    }
}

#[async_trait]
impl BalanceStrategy for SolanaSdkStrategy {
    async fn raw_balances(&self, address: &str) -> Result<RawBalances> {
        let owner = Pubkey::from_str(address)
            .map_err(|e| Error::Transport(format!("invalid address '{}': {}", address, e)))?;

        let (lamports, token_accounts) = tokio::join!(
            self.client.get_balance(&owner),
            self.client
                .get_token_accounts_by_owner(&owner, TokenAccountsFilter::ProgramId(spl_token::ID)),
        );

        let lamports = match lamports {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(error = %err, "native balance fetch failed, recording empty slot");
                None
            }
        };

        let mut accounts: Vec<SolanaRawTokenAccount> = match token_accounts {
            Ok(list) => list
                .iter()
                .filter_map(|keyed| decode_token_account(&keyed.account.data))
                .collect(),
            Err(err) => {
                warn!(error = %err, "token account fetch failed, recording empty slot");
                Vec::new()
            }
        };
        self.backfill_decimals(&mut accounts).await;

        // single-unit zero-decimal holdings are NFTs, everything else is a
        // fungible position
        let (nft_accounts, token_accounts): (Vec<_>, Vec<_>) = accounts
            .into_iter()
            .partition(|a| a.decimals == Some(0) && a.amount == "1");

        Ok(RawBalances::Solana(SolanaRawBalances {
            lamports,
            token_accounts,
            nfts: nft_accounts
                .into_iter()
                .map(|a| SolanaRawNft {
                    mint: a.mint,
                    name: None,
                    image: None,
                })
                .collect(),
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

use alloy::primitives::U256;
use tracing::warn;

use crate::chain::ChainConfig;
use crate::error::Result;
use crate::model::{
    format_units, parse_raw_amount, BalancesResponse, NativeBalance, NftBalance, NftMetadata,
    TokenBalance, TokenMetadata, DEFAULT_SOLANA_DECIMALS, UNKNOWN_SYMBOL, UNKNOWN_TOKEN_NAME,
};
use crate::strategy::SolanaRawBalances;

/// Normalize a Solana-family payload. Lamports convert at the chain's
/// native precision; SPL amounts use the account's reported decimals, else
/// the documented default. Solana has no ERC-style token ids, so every NFT
/// carries an empty `token_id`.
pub fn normalize_balances(
    raw: SolanaRawBalances,
    config: &ChainConfig,
) -> Result<BalancesResponse> {
    let lamports = U256::from(raw.lamports.unwrap_or(0));

    let tokens = raw
        .token_accounts
        .into_iter()
        .map(|account| {
            let decimals = account.decimals.unwrap_or(DEFAULT_SOLANA_DECIMALS);
            let amount = parse_raw_amount(&account.amount).unwrap_or_else(|err| {
                warn!(error = %err, mint = %account.mint, "unparseable amount, substituting zero");
                U256::ZERO
            });
            TokenBalance {
                mint: account.mint,
                balance: format_units(amount, decimals),
                token_metadata: Some(TokenMetadata {
                    symbol: UNKNOWN_SYMBOL.to_string(),
                    decimals,
                    name: UNKNOWN_TOKEN_NAME.to_string(),
                }),
            }
        })
        .collect();

    let nfts = raw
        .nfts
        .into_iter()
        .map(|nft| NftBalance {
            mint: nft.mint,
            token_id: String::new(),
            token_metadata: Some(NftMetadata {
                collection: None,
                name: nft.name.unwrap_or_default(),
                image: nft.image.unwrap_or_default(),
            }),
        })
        .collect();

    Ok(BalancesResponse {
        native_balance: NativeBalance {
            balance: format_units(lamports, config.decimals),
        },
        tokens,
        nfts,
    })
}

use alloy::primitives::U256;
use tracing::warn;

use crate::chain::ChainConfig;
use crate::error::Result;
use crate::model::{
    format_units, parse_raw_amount, BalancesResponse, NativeBalance, NftBalance, NftCollection,
    NftMetadata, TokenBalance, TokenMetadata, DEFAULT_EVM_DECIMALS, UNKNOWN_SYMBOL,
    UNKNOWN_TOKEN_NAME,
};
use crate::strategy::EvmRawBalances;

/// Normalize an EVM-family payload. Works the same for both EVM sources:
/// amounts may be decimal or 0x-hex, metadata may be missing entirely.
pub fn normalize_balances(raw: EvmRawBalances, config: &ChainConfig) -> Result<BalancesResponse> {
    let native = raw.native.as_deref().map(amount_or_zero).unwrap_or(U256::ZERO);

    let tokens = raw
        .tokens
        .into_iter()
        .map(|token| {
            let decimals = token.decimals.unwrap_or(DEFAULT_EVM_DECIMALS);
            let amount = amount_or_zero(&token.amount);
            TokenBalance {
                mint: token.contract,
                balance: format_units(amount, decimals),
                token_metadata: Some(TokenMetadata {
                    symbol: token.symbol.unwrap_or_else(|| UNKNOWN_SYMBOL.to_string()),
                    decimals,
                    name: token.name.unwrap_or_else(|| UNKNOWN_TOKEN_NAME.to_string()),
                }),
            }
        })
        .collect();

    let nfts = raw
        .nfts
        .into_iter()
        .map(|nft| {
            let token_id = match parse_raw_amount(&nft.token_id) {
                Ok(id) => id.to_string(),
                Err(_) => nft.token_id.clone(),
            };
            let name = nft
                .collection
                .as_deref()
                .map(|collection| format!("{} #{}", collection, token_id))
                .unwrap_or_default();
            NftBalance {
                mint: nft.contract,
                token_id,
                token_metadata: Some(NftMetadata {
                    collection: nft.collection.map(|name| NftCollection { name }),
                    name,
                    image: nft.image.unwrap_or_default(),
                }),
            }
        })
        .collect();

    Ok(BalancesResponse {
        native_balance: NativeBalance {
            balance: format_units(native, config.decimals),
        },
        tokens,
        nfts,
    })
}

fn amount_or_zero(raw: &str) -> U256 {
    parse_raw_amount(raw).unwrap_or_else(|err| {
        warn!(error = %err, "unparseable amount, substituting zero");
        U256::ZERO
    })
}

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default decimal precision for EVM-family assets when the source did not
/// report one.
pub const DEFAULT_EVM_DECIMALS: u8 = 18;
/// Decimal precision of the Solana native asset (lamports per SOL), also
/// the default for SPL tokens whose mint could not be read.
pub const DEFAULT_SOLANA_DECIMALS: u8 = 9;

pub const UNKNOWN_SYMBOL: &str = "UNKNOWN";
pub const UNKNOWN_TOKEN_NAME: &str = "Unknown Token";

/// Native-asset balance in human-readable units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeBalance {
    pub balance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    pub symbol: String,
    pub decimals: u8,
    pub name: String,
}

/// One fungible-token position. `mint` is the on-chain asset identifier:
/// the contract address on EVM chains, the mint address on Solana.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub mint: String,
    pub balance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_metadata: Option<TokenMetadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftCollection {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<NftCollection>,
    pub name: String,
    pub image: String,
}

/// One NFT position. `token_id` is the empty string on chains without
/// ERC-style token ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NftBalance {
    pub mint: String,
    pub token_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_metadata: Option<NftMetadata>,
}

/// The single output contract every provider produces. There is no error
/// variant at this boundary: failures degrade to [`BalancesResponse::zeroed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancesResponse {
    pub native_balance: NativeBalance,
    pub tokens: Vec<TokenBalance>,
    pub nfts: Vec<NftBalance>,
}

impl BalancesResponse {
    /// The degraded response returned when every upstream fetch failed.
    pub fn zeroed() -> Self {
        Self {
            native_balance: NativeBalance {
                balance: "0".to_string(),
            },
            tokens: Vec::new(),
            nfts: Vec::new(),
        }
    }
}

/// Parse a raw amount string as emitted by either strategy flavor: decimal
/// (`"1000"`) or 0x-prefixed hex (`"0x3e8"`).
pub fn parse_raw_amount(raw: &str) -> Result<U256> {
    let raw = raw.trim();
    let parsed = if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        if hex.is_empty() {
            Ok(U256::ZERO)
        } else {
            U256::from_str_radix(hex, 16)
        }
    } else {
        U256::from_str_radix(raw, 10)
    };
    parsed.map_err(|e| Error::Transport(format!("malformed amount '{}': {}", raw, e)))
}

/// Render a smallest-unit integer as a human-readable decimal string:
/// `value / 10^decimals`, no scientific notation, trailing fractional
/// zeros trimmed.
pub fn format_units(value: U256, decimals: u8) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let scale = U256::from(10u8)
        .checked_pow(U256::from(decimals))
        .unwrap_or(U256::MAX);
    let whole = value / scale;
    let fractional = value % scale;

    if fractional.is_zero() {
        whole.to_string()
    } else {
        let frac_str = format!("{:0>width$}", fractional.to_string(), width = decimals as usize);
        format!("{}.{}", whole, frac_str.trim_end_matches('0'))
    }
}

/// Inverse of [`format_units`]: human-readable decimal string back to the
/// smallest-unit integer.
pub fn parse_units(human: &str, decimals: u8) -> Result<U256> {
    let human = human.trim();
    let (whole, frac) = human.split_once('.').unwrap_or((human, ""));
    if frac.len() > decimals as usize {
        return Err(Error::Transport(format!(
            "'{}' has more than {} fractional digits",
            human, decimals
        )));
    }
    let mut digits = String::with_capacity(whole.len() + decimals as usize);
    digits.push_str(whole);
    digits.push_str(frac);
    for _ in 0..(decimals as usize - frac.len()) {
        digits.push('0');
    }
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(&digits, 10)
        .map_err(|e| Error::Transport(format!("malformed amount '{}': {}", human, e)))
}

mod evm;
mod solana;

use crate::chain::ChainConfig;
use crate::error::{Error, Result};
use crate::model::{parse_raw_amount, BalancesResponse};
use crate::strategy::{RawBalances, RawFeeData};

/// Map one raw strategy payload to the unified model. Dispatches on the
/// payload tag; each family's rules live in its own module.
pub fn normalize_balances(raw: RawBalances, config: &ChainConfig) -> Result<BalancesResponse> {
    match raw {
        RawBalances::Evm(raw) => evm::normalize_balances(raw, config),
        RawBalances::Solana(raw) => solana::normalize_balances(raw, config),
    }
}

/// Pick the effective gas price from raw fee data. `maxFeePerGas` wins when
/// present (the authoritative upper bound on EIP-1559 chains); `gasPrice` is
/// the fallback for legacy-fee chains and sources that only expose it.
pub fn select_gas_price(fee: &RawFeeData) -> Result<String> {
    let selected = fee
        .max_fee_per_gas
        .as_deref()
        .or(fee.gas_price.as_deref())
        .ok_or_else(|| Error::Transport("source reported no fee data".to_string()))?;
    Ok(parse_raw_amount(selected)?.to_string())
}

/// Gas estimates stay in the chain's smallest unit; only the hex/decimal
/// representation is unified.
pub fn normalize_gas_estimate(raw: &str) -> Result<String> {
    Ok(parse_raw_amount(raw)?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_fee_wins_over_gas_price() {
        let fee = RawFeeData {
            gas_price: Some("10000000000".to_string()),
            max_fee_per_gas: Some("20000000000".to_string()),
            max_priority_fee_per_gas: Some("1500000000".to_string()),
        };
        assert_eq!(select_gas_price(&fee).unwrap(), "20000000000");
    }

    #[test]
    fn test_gas_price_is_the_fallback() {
        let fee = RawFeeData {
            gas_price: Some("10000000000".to_string()),
            ..Default::default()
        };
        assert_eq!(select_gas_price(&fee).unwrap(), "10000000000");
    }

    #[test]
    fn test_no_fee_data_is_an_error() {
        assert!(select_gas_price(&RawFeeData::default()).is_err());
    }

    #[test]
    fn test_gas_estimate_representation() {
        assert_eq!(normalize_gas_estimate("21000").unwrap(), "21000");
        assert_eq!(normalize_gas_estimate("0x5208").unwrap(), "21000");
        assert!(normalize_gas_estimate("garbage").is_err());
    }
}

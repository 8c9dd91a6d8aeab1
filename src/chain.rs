use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::strategy::StrategyKind;

/// The fixed set of chains with a built-in routing entry. Registry keys are
/// plain lowercase strings, so additional chains can still be registered at
/// runtime without extending this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainId {
    Ethereum,
    Polygon,
    Bsc,
    Solana,
}

impl ChainId {
    pub const ALL: [ChainId; 4] = [
        ChainId::Ethereum,
        ChainId::Polygon,
        ChainId::Bsc,
        ChainId::Solana,
    ];

    pub fn family(self) -> ChainFamily {
        match self {
            ChainId::Ethereum | ChainId::Polygon | ChainId::Bsc => ChainFamily::Evm,
            ChainId::Solana => ChainFamily::Solana,
        }
    }

    /// Prefix used when resolving credentials from the configuration source,
    /// e.g. `ETHEREUM_MAINNET_RPC_URL`.
    pub fn env_prefix(self) -> &'static str {
        match self {
            ChainId::Ethereum => "ETHEREUM",
            ChainId::Polygon => "POLYGON",
            ChainId::Bsc => "BSC",
            ChainId::Solana => "SOLANA",
        }
    }

    pub fn config(self) -> ChainConfig {
        match self {
            ChainId::Ethereum => ChainConfig {
                chain_id: 1,
                name: "Ethereum".to_string(),
                symbol: "ETH".to_string(),
                decimals: 18,
                testnet_chain_id: Some(11155111),
                testnet_name: Some("Sepolia".to_string()),
            },
            ChainId::Polygon => ChainConfig {
                chain_id: 137,
                name: "Polygon".to_string(),
                symbol: "MATIC".to_string(),
                decimals: 18,
                testnet_chain_id: Some(80002),
                testnet_name: Some("Amoy".to_string()),
            },
            ChainId::Bsc => ChainConfig {
                chain_id: 56,
                name: "BNB Smart Chain".to_string(),
                symbol: "BNB".to_string(),
                decimals: 18,
                testnet_chain_id: Some(97),
                testnet_name: Some("BSC Testnet".to_string()),
            },
            ChainId::Solana => ChainConfig {
                chain_id: 101,
                name: "Solana".to_string(),
                symbol: "SOL".to_string(),
                decimals: 9,
                testnet_chain_id: Some(103),
                testnet_name: Some("Devnet".to_string()),
            },
        }
    }

    /// Built-in public endpoint used when the configuration source supplies
    /// nothing for either key of the fallback chain.
    pub fn default_endpoint(self, tier: NetworkTier) -> &'static str {
        match (self, tier) {
            (ChainId::Ethereum, NetworkTier::Mainnet) => "https://ethereum-rpc.publicnode.com",
            (ChainId::Ethereum, NetworkTier::Testnet) => {
                "https://ethereum-sepolia-rpc.publicnode.com"
            }
            (ChainId::Polygon, NetworkTier::Mainnet) => "https://polygon-bor-rpc.publicnode.com",
            (ChainId::Polygon, NetworkTier::Testnet) => {
                "https://polygon-amoy-bor-rpc.publicnode.com"
            }
            (ChainId::Bsc, NetworkTier::Mainnet) => "https://bsc-rpc.publicnode.com",
            (ChainId::Bsc, NetworkTier::Testnet) => "https://bsc-testnet-rpc.publicnode.com",
            (ChainId::Solana, NetworkTier::Mainnet) => "https://api.mainnet-beta.solana.com",
            (ChainId::Solana, NetworkTier::Testnet) => "https://api.devnet.solana.com",
        }
    }

    /// Preferred data source for the chain; overridable per chain via the
    /// `{PREFIX}_SOURCE` configuration key.
    pub fn default_strategy_kind(self) -> StrategyKind {
        match self {
            ChainId::Ethereum | ChainId::Polygon => StrategyKind::EvmSdk,
            ChainId::Bsc => StrategyKind::EvmRpc,
            ChainId::Solana => StrategyKind::SolanaSdk,
        }
    }

    /// Tokens and NFT contracts queried for chains whose upstream cannot
    /// enumerate holdings (EVM family). Solana enumerates token accounts
    /// directly and needs no list.
    pub fn default_watch_list(self, tier: NetworkTier) -> WatchList {
        let tokens: &[&str] = match (self, tier) {
            (ChainId::Ethereum, NetworkTier::Mainnet) => &[
                "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", // USDC
                "0xdAC17F958D2ee523a2206206994597C13D831ec7", // USDT
                "0x6B175474E89094C44Da98b954EedeAC495271d0F", // DAI
            ],
            (ChainId::Ethereum, NetworkTier::Testnet) => &[
                "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238", // Sepolia USDC
            ],
            (ChainId::Polygon, NetworkTier::Mainnet) => &[
                "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359", // USDC
                "0xc2132D05D31c914a87C6611C10748AEb04B58e8F", // USDT
            ],
            (ChainId::Bsc, NetworkTier::Mainnet) => &[
                "0x55d398326f99059fF775485246999027B3197955", // USDT
                "0xe9e7CEA3DedcA5984780Bafc599bD69ADd087D56", // BUSD
            ],
            _ => &[],
        };
        WatchList {
            tokens: tokens.iter().map(|s| s.to_string()).collect(),
            nft_contracts: Vec::new(),
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChainId::Ethereum => "ethereum",
            ChainId::Polygon => "polygon",
            ChainId::Bsc => "bsc",
            ChainId::Solana => "solana",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ChainId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ethereum" | "eth" => Ok(ChainId::Ethereum),
            "polygon" | "matic" => Ok(ChainId::Polygon),
            "bsc" | "bnb" => Ok(ChainId::Bsc),
            "solana" | "sol" => Ok(ChainId::Solana),
            other => Err(Error::UnsupportedChain(other.to_string())),
        }
    }
}

/// Group of chains sharing a wire format and SDK style. The partitioning
/// only picks the concrete strategy/adapter; it carries no behavior itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFamily {
    Evm,
    Solana,
}

/// Mainnet vs. testnet deployment of the same chain. Selects which
/// endpoint/credential pair a provider uses; the chain identity is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkTier {
    #[default]
    Mainnet,
    Testnet,
}

impl NetworkTier {
    /// Fragment used in configuration keys, e.g. `SOLANA_TESTNET_RPC_URL`.
    pub fn key_fragment(self) -> &'static str {
        match self {
            NetworkTier::Mainnet => "MAINNET",
            NetworkTier::Testnet => "TESTNET",
        }
    }
}

impl fmt::Display for NetworkTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkTier::Mainnet => write!(f, "mainnet"),
            NetworkTier::Testnet => write!(f, "testnet"),
        }
    }
}

/// Descriptive metadata for a chain, one per [`ChainId`], created at
/// provider construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(rename = "chainId")]
    pub chain_id: u64,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(rename = "testnetChainId", skip_serializing_if = "Option::is_none")]
    pub testnet_chain_id: Option<u64>,
    #[serde(rename = "testnetName", skip_serializing_if = "Option::is_none")]
    pub testnet_name: Option<String>,
}

/// Token contracts and NFT contracts a provider queries on EVM chains.
#[derive(Debug, Clone, Default)]
pub struct WatchList {
    pub tokens: Vec<String>,
    pub nft_contracts: Vec<String>,
}

use std::sync::Arc;

use anyhow::Result;
use balance_gateway::{EnvSource, GasEstimateRequest, NetworkTier, ProviderRegistry};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "balance-gateway")]
#[command(about = "Query wallet balances across EVM chains and Solana", long_about = None)]
struct Args {
    /// Chain to query (ethereum, polygon, bsc, solana)
    #[arg(short, long, default_value = "ethereum", global = true)]
    chain: String,

    /// Query the chain's testnet tier instead of mainnet
    #[arg(short, long, global = true)]
    testnet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Native, token, and NFT balances for an address
    Balances {
        /// The wallet address to query
        #[arg(short, long)]
        address: String,
    },
    /// Effective gas price in the chain's smallest unit
    GasPrice,
    /// Estimate gas for a value transfer
    EstimateGas {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        value: Option<String>,
        #[arg(long)]
        data: Option<String>,
    },
    /// Probe the chain's RPC endpoint
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let tier = if args.testnet {
        NetworkTier::Testnet
    } else {
        NetworkTier::Mainnet
    };
    let registry = ProviderRegistry::new(Arc::new(EnvSource));

    match args.command {
        Command::Balances { address } => {
            let response = registry.get_balances(&args.chain, &address, tier).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::GasPrice => {
            let price = registry.gas_price(&args.chain, tier).await?;
            println!("{}", price);
        }
        Command::EstimateGas {
            from,
            to,
            value,
            data,
        } => {
            let tx = GasEstimateRequest {
                from,
                to,
                data,
                value,
            };
            let gas = registry.estimate_gas(&args.chain, &tx, tier).await?;
            println!("{}", gas);
        }
        Command::Health => {
            let healthy = registry.check_health(&args.chain, tier).await?;
            println!("{} {}: {}", args.chain, tier, if healthy { "healthy" } else { "unreachable" });
            if !healthy {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

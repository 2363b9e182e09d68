use anyhow::Result;
use chain::dev::{dev_account, DevChain};
use chain::TokenContract;
use clap::Parser;
use shared::domain::Address;

const DEFAULT_BASE_URI: &str =
    "ipfs://ipfs/QmbRcjZLuyFcBRmspTnxjex5SaYAFXhqcUffXQYJdi5vuh/metadata/";

/// Deploys the token contract to an in-process dev chain and optionally
/// pre-mints tokens to the deployer.
#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "MetaBots")]
    name: String,
    #[arg(long, default_value = "MTB")]
    symbol: String,
    #[arg(long, default_value = DEFAULT_BASE_URI)]
    base_token_uri: String,
    /// Deployer account; defaults to the first dev account.
    #[arg(long)]
    deployer: Option<String>,
    /// Tokens to mint to the deployer after deployment.
    #[arg(long, default_value_t = 0)]
    premint: u32,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let deployer = match &cli.deployer {
        Some(raw) => Address::parse(raw)?,
        None => dev_account(0),
    };

    let contract = DevChain::deploy(&cli.name, &cli.symbol, &cli.base_token_uri, deployer.clone());
    for _ in 0..cli.premint {
        let token_id = contract.mint(&deployer).await?;
        println!("minted token_id={token_id} to {deployer}");
    }

    println!("{} deployed to: {}", cli.name, contract.contract_address());
    println!(
        "symbol={} total_supply={} base_token_uri={}",
        contract.symbol(),
        contract.total_supply().await?,
        cli.base_token_uri
    );

    Ok(())
}

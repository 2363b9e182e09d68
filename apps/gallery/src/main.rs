use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chain::dev::{dev_account, DevChain, DevWallet};
use chain::{TokenContract, WalletProvider};
use clap::Parser;
use mint_core::{
    ListingState, MetadataFetcher, MintWorkflow, PurchaseIntent, TokenListing, TransferIntent,
    WorkflowEvent, WorkflowState,
};
use shared::domain::{NativeAmount, TokenId};
use shared::metadata::{TokenMetadata, TokenRecord};
use tokio::sync::broadcast;

mod config;

const DEFAULT_BASE_URI: &str =
    "ipfs://ipfs/QmbRcjZLuyFcBRmspTnxjex5SaYAFXhqcUffXQYJdi5vuh/metadata/";

/// Terminal gallery over an in-process dev chain: lists minted tokens, buys
/// one, then gifts it, printing each workflow phase as a wallet UI would.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "MetaBots")]
    name: String,
    #[arg(long, default_value = "MTB")]
    symbol: String,
    #[arg(long, default_value = DEFAULT_BASE_URI)]
    base_token_uri: String,
    /// Tokens minted to the deployer before the gallery opens.
    #[arg(long, default_value_t = 2)]
    premint: u32,
}

/// Synthesizes metadata locally so dev sessions need no gateway access.
struct DevMetadataFetcher;

#[async_trait]
impl MetadataFetcher for DevMetadataFetcher {
    async fn fetch(&self, url: &str) -> Result<TokenMetadata> {
        let id = url.rsplit('/').next().unwrap_or("?");
        Ok(TokenMetadata {
            name: format!("MetaBot #{id}"),
            description: "locally minted dev token".to_string(),
            image: format!("ipfs://ipfs/QmImages/{id}.png"),
        })
    }
}

fn phase_line(state: &WorkflowState) -> Option<String> {
    match state {
        WorkflowState::Idle => None,
        WorkflowState::AwaitingWalletConnection => Some("Connecting wallet...".to_string()),
        WorkflowState::AwaitingSignature => Some("Waiting for signed transaction".to_string()),
        WorkflowState::AwaitingConfirmation => {
            Some("Waiting for block confirmation".to_string())
        }
        WorkflowState::Succeeded(receipt) => Some(format!(
            "Confirmed in block {} ({})",
            receipt.block_number, receipt.tx_hash
        )),
        WorkflowState::Failed(reason) => Some(format!("Failed: {reason}")),
    }
}

fn print_events(events: &mut broadcast::Receiver<WorkflowEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            WorkflowEvent::StateChanged(state) => {
                if let Some(line) = phase_line(&state) {
                    println!("  [{line}]");
                }
            }
            WorkflowEvent::Notice(notice) => println!("  [{notice}]"),
        }
    }
}

fn print_records(records: &[TokenRecord]) {
    if records.is_empty() {
        println!("no tokens minted yet");
        return;
    }
    for record in records {
        println!("#{} {}", record.token_id, record.name);
        println!("    {}", record.description);
        println!("    image: {}", record.image);
        println!("    owned by: {}", record.owner);
    }
}

fn render(state: &ListingState) {
    match state {
        ListingState::Uninitialized => {}
        ListingState::Loading => println!("LOADING..."),
        ListingState::Loaded(records) => print_records(records),
        ListingState::Failed(message) => println!("failed to load tokens: {message}"),
    }
}

async fn refresh_listing(listing: &TokenListing, state: &mut ListingState) {
    *state = ListingState::Loading;
    render(state);
    *state = match listing.load().await {
        Ok(records) => ListingState::Loaded(records),
        Err(err) => ListingState::Failed(err.to_string()),
    };
    render(state);
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();
    let settings = config::load_settings();

    let deployer = dev_account(0);
    let buyer = dev_account(1);
    let friend = dev_account(2);

    let contract = Arc::new(DevChain::deploy(
        &args.name,
        &args.symbol,
        &args.base_token_uri,
        deployer.clone(),
    ));
    for _ in 0..args.premint {
        contract.mint(&deployer).await?;
    }
    contract.fund(&buyer, NativeAmount::coins(10)).await;

    let wallet = Arc::new(DevWallet::new(buyer.clone()));
    let mut workflow = MintWorkflow::new(
        Arc::clone(&wallet) as Arc<dyn WalletProvider>,
        Arc::clone(&contract) as Arc<dyn TokenContract>,
    );
    if let Some(secs) = settings.confirmation_timeout_secs {
        workflow = workflow.with_confirmation_timeout(Duration::from_secs(secs));
    }
    let listing = TokenListing::new(
        Arc::clone(&contract) as Arc<dyn TokenContract>,
        Arc::new(DevMetadataFetcher),
    )
    .with_gateway(settings.ipfs_gateway.clone());

    println!(
        "{} ({}) at {}",
        contract.name(),
        contract.symbol(),
        contract.contract_address()
    );

    let mut listing_state = ListingState::Uninitialized;
    refresh_listing(&listing, &mut listing_state).await;

    let mut events = workflow.subscribe();

    println!();
    println!(
        "Buy NFT for {} native unit as {}",
        contract.purchase_price(),
        buyer
    );
    let settled = workflow.submit(PurchaseIntent::default()).await?;
    print_events(&mut events);
    if !matches!(settled, WorkflowState::Succeeded(_)) {
        println!("purchase did not complete; reload and retry");
        return Ok(());
    }

    // The listing is the caller's to refresh after a success.
    refresh_listing(&listing, &mut listing_state).await;
    workflow.reset().await?;

    let minted = contract.total_supply().await?;
    let purchased = TokenId(minted.saturating_sub(1));

    println!();
    println!("Gift NFT #{purchased} to {friend}");
    let settled = workflow
        .submit(TransferIntent {
            from: buyer.clone(),
            to: friend.clone(),
            token_id: purchased,
        })
        .await?;
    print_events(&mut events);
    if !matches!(settled, WorkflowState::Succeeded(_)) {
        println!("gift did not complete; reload and retry");
        return Ok(());
    }

    refresh_listing(&listing, &mut listing_state).await;

    Ok(())
}

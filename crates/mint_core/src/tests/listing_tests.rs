use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Path;
use axum::routing::get;
use axum::{Json, Router};
use chain::dev::{dev_account, DevChain};
use chain::{PendingTx, TokenContract, WalletError, WalletSigner};
use shared::domain::{Address, NativeAmount, TokenId};
use shared::metadata::TokenMetadata;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use super::listing::to_gateway_url;
use super::*;

struct StaticContract {
    base_uri: String,
    owners: Vec<Address>,
    fail_owner_of: Option<TokenId>,
}

impl StaticContract {
    fn with_owners(owners: Vec<Address>) -> Self {
        Self {
            base_uri: "ipfs://ipfs/QmMeta/metadata/".to_string(),
            owners,
            fail_owner_of: None,
        }
    }
}

#[async_trait]
impl TokenContract for StaticContract {
    async fn total_supply(&self) -> anyhow::Result<u64> {
        Ok(self.owners.len() as u64)
    }

    async fn owner_of(&self, token_id: TokenId) -> anyhow::Result<Address> {
        if self.fail_owner_of == Some(token_id) {
            return Err(anyhow::anyhow!("owner lookup failed"));
        }
        self.owners
            .get(token_id.0 as usize)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("token {token_id} has not been minted"))
    }

    async fn token_uri(&self, token_id: TokenId) -> anyhow::Result<String> {
        Ok(format!("{}{}", self.base_uri, token_id))
    }

    async fn purchase(
        &self,
        _signer: Arc<dyn WalletSigner>,
        _value: NativeAmount,
    ) -> Result<Box<dyn PendingTx>, WalletError> {
        Err(WalletError::Backend("read-only test contract".to_string()))
    }

    async fn transfer_from(
        &self,
        _signer: Arc<dyn WalletSigner>,
        _from: Address,
        _to: Address,
        _token_id: TokenId,
    ) -> Result<Box<dyn PendingTx>, WalletError> {
        Err(WalletError::Backend("read-only test contract".to_string()))
    }
}

struct RecordingFetcher {
    fetched: Arc<Mutex<Vec<String>>>,
    /// When set, earlier token ids resolve later, reversing completion order.
    stagger: bool,
}

impl RecordingFetcher {
    fn new() -> Self {
        Self {
            fetched: Arc::new(Mutex::new(Vec::new())),
            stagger: false,
        }
    }

    fn staggered() -> Self {
        Self {
            fetched: Arc::new(Mutex::new(Vec::new())),
            stagger: true,
        }
    }
}

fn trailing_id(url: &str) -> u64 {
    url.rsplit('/')
        .next()
        .and_then(|tail| tail.parse().ok())
        .unwrap_or(0)
}

#[async_trait]
impl MetadataFetcher for RecordingFetcher {
    async fn fetch(&self, url: &str) -> anyhow::Result<TokenMetadata> {
        self.fetched.lock().await.push(url.to_string());
        let id = trailing_id(url);
        if self.stagger {
            let slowdown = 40u64.saturating_sub(id * 10);
            tokio::time::sleep(Duration::from_millis(slowdown)).await;
        }
        Ok(TokenMetadata {
            name: format!("MetaBot #{id}"),
            description: format!("dev token {id}"),
            image: format!("ipfs://ipfs/QmImages/{id}.png"),
        })
    }
}

#[test]
fn gateway_rewrite_replaces_the_ipfs_scheme() {
    assert_eq!(
        to_gateway_url("ipfs://ipfs/QmMeta/metadata/0", DEFAULT_IPFS_GATEWAY),
        "https://cloudflare-ipfs.com/ipfs/QmMeta/metadata/0"
    );
    assert_eq!(
        to_gateway_url("https://example.com/already-http.json", DEFAULT_IPFS_GATEWAY),
        "https://example.com/already-http.json"
    );
}

#[tokio::test]
async fn listing_orders_records_by_id_despite_reversed_fetch_completion() {
    let owners: Vec<Address> = (0..5).map(dev_account).collect();
    let contract = Arc::new(StaticContract::with_owners(owners.clone()));
    let fetcher = Arc::new(RecordingFetcher::staggered());
    let listing = TokenListing::new(contract, Arc::clone(&fetcher) as Arc<dyn MetadataFetcher>);

    let records = listing.load().await.expect("load");

    assert_eq!(records.len(), 5);
    for (index, record) in records.iter().enumerate() {
        assert_eq!(record.token_id, TokenId(index as u64));
        assert_eq!(record.owner, owners[index]);
        assert_eq!(record.name, format!("MetaBot #{index}"));
    }
}

#[tokio::test]
async fn empty_collection_produces_empty_listing() {
    let contract = Arc::new(StaticContract::with_owners(Vec::new()));
    let fetcher = Arc::new(RecordingFetcher::new());
    let fetched = Arc::clone(&fetcher.fetched);
    let listing = TokenListing::new(contract, fetcher);

    let records = listing.load().await.expect("load");

    assert!(records.is_empty());
    assert!(fetched.lock().await.is_empty());
}

#[tokio::test]
async fn listing_refresh_is_idempotent_without_chain_changes() {
    let owners: Vec<Address> = vec![dev_account(1), dev_account(2)];
    let contract = Arc::new(StaticContract::with_owners(owners));
    let listing = TokenListing::new(contract, Arc::new(RecordingFetcher::new()));

    let first = listing.load().await.expect("first load");
    let second = listing.load().await.expect("second load");

    assert_eq!(first, second);
}

#[tokio::test]
async fn ipfs_uris_are_rewritten_through_the_configured_gateway() {
    let contract = Arc::new(StaticContract::with_owners(vec![dev_account(1)]));
    let fetcher = Arc::new(RecordingFetcher::new());
    let fetched = Arc::clone(&fetcher.fetched);
    let listing =
        TokenListing::new(contract, fetcher).with_gateway("https://gateway.example/");

    let records = listing.load().await.expect("load");

    assert_eq!(
        fetched.lock().await.clone(),
        vec!["https://gateway.example/ipfs/QmMeta/metadata/0".to_string()]
    );
    assert_eq!(
        records[0].image,
        "https://gateway.example/ipfs/QmImages/0.png"
    );
}

#[tokio::test]
async fn failed_token_read_is_attributed_to_the_token() {
    let mut contract = StaticContract::with_owners((0..4).map(dev_account).collect());
    contract.fail_owner_of = Some(TokenId(2));
    let listing = TokenListing::new(Arc::new(contract), Arc::new(RecordingFetcher::new()));

    let err = listing.load().await.err().expect("must fail");

    match err {
        ListingError::Token { token_id, .. } => assert_eq!(token_id, TokenId(2)),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn listing_projects_dev_chain_ownership() {
    let deployer = dev_account(0);
    let first_owner = dev_account(1);
    let second_owner = dev_account(2);
    let contract = Arc::new(DevChain::deploy(
        "MetaBots",
        "MTB",
        "ipfs://ipfs/QmMeta/metadata/",
        deployer,
    ));
    contract.mint(&first_owner).await.expect("mint 0");
    contract.mint(&second_owner).await.expect("mint 1");

    let listing = TokenListing::new(
        Arc::clone(&contract) as Arc<dyn TokenContract>,
        Arc::new(RecordingFetcher::new()),
    );
    let records = listing.load().await.expect("load");

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].owner, first_owner);
    assert_eq!(records[1].owner, second_owner);
    assert!(records[0]
        .image
        .starts_with("https://cloudflare-ipfs.com/"));
}

async fn serve_metadata(Path(id): Path<u64>) -> Json<TokenMetadata> {
    Json(TokenMetadata {
        name: format!("MetaBot #{id}"),
        description: "served over http".to_string(),
        image: format!("ipfs://ipfs/QmImages/{id}.png"),
    })
}

async fn spawn_metadata_server() -> anyhow::Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new().route("/metadata/:id", get(serve_metadata));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

#[tokio::test]
async fn http_metadata_fetcher_parses_gateway_documents() {
    let server_url = spawn_metadata_server().await.expect("spawn server");
    let fetcher = HttpMetadataFetcher::new();

    let doc = fetcher
        .fetch(&format!("{server_url}/metadata/7"))
        .await
        .expect("fetch");

    assert_eq!(doc.name, "MetaBot #7");
    assert_eq!(doc.description, "served over http");
    assert_eq!(doc.image, "ipfs://ipfs/QmImages/7.png");
}

#[tokio::test]
async fn http_metadata_fetcher_rejects_missing_documents() {
    let server_url = spawn_metadata_server().await.expect("spawn server");
    let fetcher = HttpMetadataFetcher::new();

    let url = format!("{server_url}/nothing-here");
    let err = fetcher.fetch(&url).await.err().expect("must fail");

    assert!(err.to_string().contains(&url));
}

//! Token listing: a wholesale projection of every minted token, joining
//! on-chain ownership with off-chain metadata.

use std::sync::Arc;

use chain::TokenContract;
use futures::future;
use shared::domain::TokenId;
use shared::metadata::TokenRecord;
use thiserror::Error;
use tracing::info;

use crate::metadata::MetadataFetcher;

/// Default public IPFS gateway used to rewrite `ipfs://` URIs.
pub const DEFAULT_IPFS_GATEWAY: &str = "https://cloudflare-ipfs.com/";

/// Rewrites every `ipfs://` scheme prefix in `url` against an HTTPS gateway.
pub fn to_gateway_url(url: &str, gateway: &str) -> String {
    url.replace("ipfs://", gateway)
}

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("failed to read the collection size: {0}")]
    Supply(#[source] anyhow::Error),
    #[error("failed to load token {token_id}: {source}")]
    Token {
        token_id: TokenId,
        #[source]
        source: anyhow::Error,
    },
}

/// Lifecycle of one listing refresh, for presentation layers that render a
/// loading indicator before the records arrive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingState {
    Uninitialized,
    Loading,
    Loaded(Vec<TokenRecord>),
    Failed(String),
}

/// Read-side companion of the workflow controller. Callers refresh it after
/// every successful workflow completion; records are always rebuilt from
/// scratch.
pub struct TokenListing {
    contract: Arc<dyn TokenContract>,
    metadata: Arc<dyn MetadataFetcher>,
    gateway: String,
}

impl TokenListing {
    pub fn new(contract: Arc<dyn TokenContract>, metadata: Arc<dyn MetadataFetcher>) -> Self {
        Self {
            contract,
            metadata,
            gateway: DEFAULT_IPFS_GATEWAY.to_string(),
        }
    }

    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = gateway.into();
        self
    }

    /// Rebuilds the projection from chain state. Per-token metadata fetches
    /// run concurrently; the result is ordered by ascending token id
    /// regardless of completion order. Token ids are assumed dense,
    /// 0..total_supply. An empty collection is not an error.
    pub async fn load(&self) -> Result<Vec<TokenRecord>, ListingError> {
        let total = self
            .contract
            .total_supply()
            .await
            .map_err(ListingError::Supply)?;
        let fetches = (0..total).map(|raw| self.load_token(TokenId(raw)));
        let records = future::try_join_all(fetches).await?;
        info!(tokens = records.len(), "token listing refreshed");
        Ok(records)
    }

    async fn load_token(&self, token_id: TokenId) -> Result<TokenRecord, ListingError> {
        self.try_load_token(token_id)
            .await
            .map_err(|source| ListingError::Token { token_id, source })
    }

    async fn try_load_token(&self, token_id: TokenId) -> anyhow::Result<TokenRecord> {
        let uri = self.contract.token_uri(token_id).await?;
        let owner = self.contract.owner_of(token_id).await?;
        let doc = self
            .metadata
            .fetch(&to_gateway_url(&uri, &self.gateway))
            .await?;
        Ok(TokenRecord {
            token_id,
            owner,
            name: doc.name,
            description: doc.description,
            image: to_gateway_url(&doc.image, &self.gateway),
        })
    }
}

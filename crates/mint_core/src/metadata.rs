//! Metadata-fetch capability: resolves a token's metadata URI to its
//! off-chain document.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use shared::metadata::TokenMetadata;

#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<TokenMetadata>;
}

/// Fetches metadata documents over HTTP(S), typically through an IPFS
/// gateway.
pub struct HttpMetadataFetcher {
    http: reqwest::Client,
}

impl HttpMetadataFetcher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

impl Default for HttpMetadataFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, url: &str) -> Result<TokenMetadata> {
        let doc = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to fetch metadata from {url}"))?
            .error_for_status()
            .with_context(|| format!("metadata request to {url} was refused"))?
            .json::<TokenMetadata>()
            .await
            .with_context(|| format!("invalid metadata document at {url}"))?;
        Ok(doc)
    }
}

/// Null fetcher for environments without metadata access.
pub struct MissingMetadataFetcher;

#[async_trait]
impl MetadataFetcher for MissingMetadataFetcher {
    async fn fetch(&self, url: &str) -> Result<TokenMetadata> {
        Err(anyhow!("no metadata fetcher configured (requested {url})"))
    }
}

use serde::{Deserialize, Serialize};

use crate::domain::{Address, TokenId};

/// Off-chain metadata document as served from a token's metadata URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub image: String,
}

/// Application-level projection of one minted token: on-chain ownership
/// joined with its off-chain metadata. Rebuilt wholesale on every listing
/// refresh, never patched incrementally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token_id: TokenId,
    pub owner: Address,
    pub name: String,
    pub description: String,
    pub image: String,
}

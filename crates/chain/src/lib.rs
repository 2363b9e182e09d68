use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::domain::{Address, NativeAmount, TokenId};
use thiserror::Error;

pub mod dev;

/// Network acknowledgment that a submitted transaction has been durably
/// included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: String,
    pub block_number: u64,
    pub from: Address,
    pub confirmed_at: DateTime<Utc>,
}

/// Failure kinds for wallet-mediated calls. The user rejecting a signature
/// prompt is its own variant so callers can branch on it without inspecting
/// backend-specific error encodings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("signature request rejected by the user")]
    Rejected,
    #[error("no wallet provider is available in this environment")]
    Unavailable,
    #[error("wallet backend failure: {0}")]
    Backend(String),
}

/// A signing capability bound to one connected account.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn address(&self) -> Address;

    /// Resolves once the user has approved the pending signature prompt, or
    /// fails with [`WalletError::Rejected`] when they decline it.
    /// Non-interactive signers approve immediately.
    async fn approve_signature(&self) -> Result<(), WalletError>;
}

/// End-user key-custody software exposing account and signature capabilities.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;
    async fn signer(&self) -> Result<Arc<dyn WalletSigner>, WalletError>;
}

/// A submitted transaction that has not yet been confirmed by the network.
#[async_trait]
pub trait PendingTx: Send + Sync {
    async fn wait(&self) -> Result<TxReceipt, WalletError>;
}

/// Handle to the deployed token contract. Reads go straight to chain state;
/// writes are authorized by a [`WalletSigner`] and return a [`PendingTx`] to
/// await confirmation on.
#[async_trait]
pub trait TokenContract: Send + Sync {
    async fn total_supply(&self) -> anyhow::Result<u64>;
    async fn owner_of(&self, token_id: TokenId) -> anyhow::Result<Address>;
    async fn token_uri(&self, token_id: TokenId) -> anyhow::Result<String>;

    async fn purchase(
        &self,
        signer: Arc<dyn WalletSigner>,
        value: NativeAmount,
    ) -> Result<Box<dyn PendingTx>, WalletError>;

    async fn transfer_from(
        &self,
        signer: Arc<dyn WalletSigner>,
        from: Address,
        to: Address,
        token_id: TokenId,
    ) -> Result<Box<dyn PendingTx>, WalletError>;
}

/// Null provider for environments without a wallet extension.
pub struct MissingWalletProvider;

#[async_trait]
impl WalletProvider for MissingWalletProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        Err(WalletError::Unavailable)
    }

    async fn signer(&self) -> Result<Arc<dyn WalletSigner>, WalletError> {
        Err(WalletError::Unavailable)
    }
}

/// Null contract handle for sessions that have not been pointed at a
/// deployment yet.
pub struct MissingTokenContract;

#[async_trait]
impl TokenContract for MissingTokenContract {
    async fn total_supply(&self) -> anyhow::Result<u64> {
        Err(anyhow!("no token contract handle configured"))
    }

    async fn owner_of(&self, token_id: TokenId) -> anyhow::Result<Address> {
        Err(anyhow!(
            "no token contract handle configured (owner_of {token_id})"
        ))
    }

    async fn token_uri(&self, token_id: TokenId) -> anyhow::Result<String> {
        Err(anyhow!(
            "no token contract handle configured (token_uri {token_id})"
        ))
    }

    async fn purchase(
        &self,
        _signer: Arc<dyn WalletSigner>,
        _value: NativeAmount,
    ) -> Result<Box<dyn PendingTx>, WalletError> {
        Err(WalletError::Backend(
            "no token contract handle configured".to_string(),
        ))
    }

    async fn transfer_from(
        &self,
        _signer: Arc<dyn WalletSigner>,
        _from: Address,
        _to: Address,
        _token_id: TokenId,
    ) -> Result<Box<dyn PendingTx>, WalletError> {
        Err(WalletError::Backend(
            "no token contract handle configured".to_string(),
        ))
    }
}

#[cfg(test)]
#[path = "tests/dev_tests.rs"]
mod tests;

//! In-memory ERC-721-style ledger and wallet for local development and
//! tests: sequential minting from id 0, a fixed purchase price credited to
//! the deployer, ownership-checked transfers, and `base_uri + id` token URIs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use shared::domain::{Address, NativeAmount, TokenId};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::{PendingTx, TokenContract, TxReceipt, WalletError, WalletProvider, WalletSigner};

/// Deterministic funded dev account, hardhat-style: `dev_account(0)` is
/// `0x…01`, `dev_account(1)` is `0x…02`, and so on.
pub fn dev_account(index: u8) -> Address {
    let addr = format!("0x{:040x}", u128::from(index) + 1);
    Address::parse(&addr).expect("dev account addresses are well-formed")
}

fn pseudo_address() -> Address {
    let a = Uuid::new_v4().simple().to_string();
    let b = Uuid::new_v4().simple().to_string();
    Address::parse(&format!("0x{}{}", a, &b[..8]))
        .expect("generated contract addresses are well-formed")
}

fn pseudo_tx_hash() -> String {
    let a = Uuid::new_v4().simple().to_string();
    let b = Uuid::new_v4().simple().to_string();
    format!("0x{a}{b}")
}

/// Single-account wallet whose signature prompts can be scripted to reject,
/// standing in for the browser extension during development.
pub struct DevWallet {
    account: Address,
    reject_signature: Arc<AtomicBool>,
}

impl DevWallet {
    pub fn new(account: Address) -> Self {
        Self {
            account,
            reject_signature: Arc::new(AtomicBool::new(false)),
        }
    }

    /// When set, the next signature prompts resolve as user rejections until
    /// cleared again.
    pub fn set_reject_signature(&self, reject: bool) {
        self.reject_signature.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl WalletProvider for DevWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        Ok(vec![self.account.clone()])
    }

    async fn signer(&self) -> Result<Arc<dyn WalletSigner>, WalletError> {
        Ok(Arc::new(DevSigner {
            address: self.account.clone(),
            reject_signature: Arc::clone(&self.reject_signature),
        }))
    }
}

struct DevSigner {
    address: Address,
    reject_signature: Arc<AtomicBool>,
}

#[async_trait]
impl WalletSigner for DevSigner {
    fn address(&self) -> Address {
        self.address.clone()
    }

    async fn approve_signature(&self) -> Result<(), WalletError> {
        if self.reject_signature.load(Ordering::SeqCst) {
            return Err(WalletError::Rejected);
        }
        Ok(())
    }
}

struct LedgerState {
    /// Owner per token; the index is the token id, so ids are dense and
    /// sequential by construction.
    owners: Vec<Address>,
    balances: HashMap<Address, NativeAmount>,
    block_number: u64,
}

/// In-memory deployment of the token contract.
pub struct DevChain {
    name: String,
    symbol: String,
    base_token_uri: String,
    contract_address: Address,
    deployer: Address,
    price: NativeAmount,
    confirmation_delay: Duration,
    inner: Mutex<LedgerState>,
}

impl DevChain {
    pub fn deploy(
        name: impl Into<String>,
        symbol: impl Into<String>,
        base_token_uri: impl Into<String>,
        deployer: Address,
    ) -> Self {
        let name = name.into();
        let contract_address = pseudo_address();
        info!(
            contract = %contract_address,
            name = %name,
            deployer = %deployer,
            "deployed dev token contract"
        );
        Self {
            name,
            symbol: symbol.into(),
            base_token_uri: base_token_uri.into(),
            contract_address,
            deployer,
            price: NativeAmount::coins(1),
            confirmation_delay: Duration::ZERO,
            inner: Mutex::new(LedgerState {
                owners: Vec::new(),
                balances: HashMap::new(),
                block_number: 0,
            }),
        }
    }

    /// Delays confirmation of every pending transaction, simulating a slow
    /// network.
    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = delay;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn contract_address(&self) -> &Address {
        &self.contract_address
    }

    pub fn purchase_price(&self) -> NativeAmount {
        self.price
    }

    /// Credits native currency to an account, the faucet for dev sessions.
    pub async fn fund(&self, account: &Address, amount: NativeAmount) {
        let mut state = self.inner.lock().await;
        let balance = state
            .balances
            .entry(account.clone())
            .or_insert(NativeAmount::ZERO);
        *balance = balance
            .checked_add(amount)
            .unwrap_or(NativeAmount(u128::MAX));
    }

    pub async fn balance_of(&self, account: &Address) -> NativeAmount {
        let state = self.inner.lock().await;
        state
            .balances
            .get(account)
            .copied()
            .unwrap_or(NativeAmount::ZERO)
    }

    /// Deployer-side mint, the analog of calling `mint(to)` from the deploy
    /// script.
    pub async fn mint(&self, to: &Address) -> Result<TokenId> {
        if to.is_zero() {
            return Err(anyhow!("cannot mint to the zero address"));
        }
        let mut state = self.inner.lock().await;
        let token_id = TokenId(state.owners.len() as u64);
        state.owners.push(to.clone());
        state.block_number += 1;
        info!(token_id = token_id.0, owner = %to, "minted token");
        Ok(token_id)
    }

    fn receipt(&self, state: &LedgerState, from: Address) -> TxReceipt {
        TxReceipt {
            tx_hash: pseudo_tx_hash(),
            block_number: state.block_number,
            from,
            confirmed_at: Utc::now(),
        }
    }

    fn pending(&self, receipt: TxReceipt) -> Box<dyn PendingTx> {
        Box::new(DevPendingTx {
            receipt,
            delay: self.confirmation_delay,
        })
    }
}

#[async_trait]
impl TokenContract for DevChain {
    async fn total_supply(&self) -> Result<u64> {
        let state = self.inner.lock().await;
        Ok(state.owners.len() as u64)
    }

    async fn owner_of(&self, token_id: TokenId) -> Result<Address> {
        let state = self.inner.lock().await;
        state
            .owners
            .get(token_id.0 as usize)
            .cloned()
            .ok_or_else(|| anyhow!("token {token_id} has not been minted"))
    }

    async fn token_uri(&self, token_id: TokenId) -> Result<String> {
        let state = self.inner.lock().await;
        if token_id.0 as usize >= state.owners.len() {
            return Err(anyhow!("token {token_id} has not been minted"));
        }
        Ok(format!("{}{}", self.base_token_uri, token_id))
    }

    async fn purchase(
        &self,
        signer: Arc<dyn WalletSigner>,
        value: NativeAmount,
    ) -> Result<Box<dyn PendingTx>, WalletError> {
        signer.approve_signature().await?;
        if value != self.price {
            return Err(WalletError::Backend(format!(
                "purchase requires a value of exactly {} native unit, got {}",
                self.price, value
            )));
        }

        let buyer = signer.address();
        let mut state = self.inner.lock().await;
        let buyer_balance = state
            .balances
            .get(&buyer)
            .copied()
            .unwrap_or(NativeAmount::ZERO);
        let remaining = buyer_balance.checked_sub(value).ok_or_else(|| {
            WalletError::Backend(format!(
                "insufficient funds: {buyer} holds {buyer_balance}, needs {value}"
            ))
        })?;
        state.balances.insert(buyer.clone(), remaining);
        let deployer_balance = state
            .balances
            .get(&self.deployer)
            .copied()
            .unwrap_or(NativeAmount::ZERO);
        state.balances.insert(
            self.deployer.clone(),
            deployer_balance
                .checked_add(value)
                .unwrap_or(NativeAmount(u128::MAX)),
        );

        let token_id = TokenId(state.owners.len() as u64);
        state.owners.push(buyer.clone());
        state.block_number += 1;
        info!(token_id = token_id.0, buyer = %buyer, "purchase minted token");

        let receipt = self.receipt(&state, buyer);
        Ok(self.pending(receipt))
    }

    async fn transfer_from(
        &self,
        signer: Arc<dyn WalletSigner>,
        from: Address,
        to: Address,
        token_id: TokenId,
    ) -> Result<Box<dyn PendingTx>, WalletError> {
        signer.approve_signature().await?;
        if to.is_zero() {
            return Err(WalletError::Backend(
                "cannot transfer to the zero address".to_string(),
            ));
        }

        let mut state = self.inner.lock().await;
        let owner = state
            .owners
            .get(token_id.0 as usize)
            .cloned()
            .ok_or_else(|| {
                WalletError::Backend(format!("token {token_id} has not been minted"))
            })?;
        if owner != from {
            return Err(WalletError::Backend(format!(
                "token {token_id} is owned by {owner}, not {from}"
            )));
        }
        if signer.address() != from {
            return Err(WalletError::Backend(format!(
                "signer {} is not authorized to move token {token_id}",
                signer.address()
            )));
        }

        state.owners[token_id.0 as usize] = to.clone();
        state.block_number += 1;
        info!(token_id = token_id.0, from = %from, to = %to, "transferred token");

        let receipt = self.receipt(&state, from);
        Ok(self.pending(receipt))
    }
}

struct DevPendingTx {
    receipt: TxReceipt,
    delay: Duration,
}

#[async_trait]
impl PendingTx for DevPendingTx {
    async fn wait(&self) -> Result<TxReceipt, WalletError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.receipt.clone())
    }
}

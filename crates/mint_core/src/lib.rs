use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chain::{TokenContract, TxReceipt, WalletError, WalletProvider};
use shared::domain::{Address, NativeAmount, TokenId};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

pub mod listing;
pub mod metadata;

pub use listing::{ListingError, ListingState, TokenListing, DEFAULT_IPFS_GATEWAY};
pub use metadata::{HttpMetadataFetcher, MetadataFetcher, MissingMetadataFetcher};

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Why a workflow ended in [`WorkflowState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The intent was rejected locally; no wallet interaction was attempted.
    Validation(String),
    /// No wallet provider is present in this environment.
    NoWalletProvider,
    /// The wallet or network failed after submission started. Partial
    /// wallet-session state cannot be resumed, so recovery is a manual reset.
    Submission(String),
    /// The network did not confirm the transaction within the configured
    /// window.
    ConfirmationTimeout,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(message) => write!(f, "invalid request: {message}"),
            Self::NoWalletProvider => f.write_str("no wallet extension was detected"),
            Self::Submission(message) => write!(f, "transaction failed: {message}"),
            Self::ConfirmationTimeout => {
                f.write_str("the network did not confirm the transaction in time")
            }
        }
    }
}

/// Phase of the purchase/transfer workflow.
///
/// Exactly one phase is active at a time. The controller owns it exclusively;
/// transitions are the only mutation path, and they never skip a phase
/// forward. `Failed` and `Idle` are reachable directly from any non-terminal
/// phase on error or user cancellation.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Idle,
    AwaitingWalletConnection,
    AwaitingSignature,
    AwaitingConfirmation,
    Succeeded(TxReceipt),
    Failed(FailureReason),
}

impl WorkflowState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_))
    }

    /// A wallet prompt or confirmation wait is outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::AwaitingWalletConnection | Self::AwaitingSignature | Self::AwaitingConfirmation
        )
    }
}

/// Purchase of the next token at the fixed list price of one native unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseIntent {
    value: NativeAmount,
}

impl PurchaseIntent {
    pub fn value(&self) -> NativeAmount {
        self.value
    }
}

impl Default for PurchaseIntent {
    fn default() -> Self {
        Self {
            value: NativeAmount::coins(1),
        }
    }
}

/// Gift of an owned token to another address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferIntent {
    pub from: Address,
    pub to: Address,
    pub token_id: TokenId,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Purchase(PurchaseIntent),
    Transfer(TransferIntent),
}

impl From<PurchaseIntent> for Intent {
    fn from(intent: PurchaseIntent) -> Self {
        Self::Purchase(intent)
    }
}

impl From<TransferIntent> for Intent {
    fn from(intent: TransferIntent) -> Self {
        Self::Transfer(intent)
    }
}

/// Controller events observable by the presentation layer.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    StateChanged(WorkflowState),
    /// Transient, non-fatal message, e.g. the user dismissed a wallet prompt
    /// and is expected to retry.
    Notice(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("a transaction is already in progress; wallet flows are strictly one at a time")]
    AlreadyInFlight,
    #[error("workflow can only be reset once the active transaction has finished")]
    ResetWhileInFlight,
}

/// Drives one purchase or transfer at a time through wallet connection,
/// signing, and confirmation.
///
/// The wallet and contract capabilities are injected so test doubles and dev
/// backends can stand in for the browser extension and the deployed
/// contract. Subscribers observe every phase transition; the caller reloads
/// the token listing after a `Succeeded` outcome.
pub struct MintWorkflow {
    wallet: Arc<dyn WalletProvider>,
    contract: Arc<dyn TokenContract>,
    confirmation_timeout: Option<Duration>,
    state: Mutex<WorkflowState>,
    events: broadcast::Sender<WorkflowEvent>,
}

impl MintWorkflow {
    pub fn new(wallet: Arc<dyn WalletProvider>, contract: Arc<dyn TokenContract>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            wallet,
            contract,
            confirmation_timeout: None,
            state: Mutex::new(WorkflowState::Idle),
            events,
        }
    }

    /// Bounds the confirmation wait. Without a timeout the workflow waits on
    /// the network indefinitely.
    pub fn with_confirmation_timeout(mut self, timeout: Duration) -> Self {
        self.confirmation_timeout = Some(timeout);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> WorkflowState {
        self.state.lock().await.clone()
    }

    /// Returns the controller to `Idle` after a finished workflow, the manual
    /// recovery action after `Failed` (or re-arming after `Succeeded`).
    ///
    /// An in-flight workflow cannot be reset: pending wallet prompts have no
    /// cancellation primitive, and dropping the whole controller (a full
    /// reload) is the only recovery from an abandoned one.
    pub async fn reset(&self) -> Result<(), WorkflowError> {
        let mut state = self.state.lock().await;
        if state.is_in_flight() {
            return Err(WorkflowError::ResetWhileInFlight);
        }
        if *state != WorkflowState::Idle {
            *state = WorkflowState::Idle;
            drop(state);
            let _ = self
                .events
                .send(WorkflowEvent::StateChanged(WorkflowState::Idle));
        }
        Ok(())
    }

    /// Runs one intent through the full workflow and returns the state it
    /// settled in: `Succeeded`, `Failed`, or `Idle` when the user rejected
    /// the signature prompt.
    ///
    /// A submission while the controller is not `Idle` is rejected with
    /// [`WorkflowError::AlreadyInFlight`]; wallet UIs are inherently
    /// single-flow and concurrent submissions must not be interleaved.
    pub async fn submit(
        &self,
        intent: impl Into<Intent>,
    ) -> Result<WorkflowState, WorkflowError> {
        let intent = intent.into();

        {
            let mut state = self.state.lock().await;
            if *state != WorkflowState::Idle {
                return Err(WorkflowError::AlreadyInFlight);
            }
            if let Err(reason) = validate(&intent) {
                warn!(%reason, "intent failed local validation");
                let failed = WorkflowState::Failed(FailureReason::Validation(reason));
                *state = failed.clone();
                drop(state);
                let _ = self.events.send(WorkflowEvent::StateChanged(failed.clone()));
                return Ok(failed);
            }
            *state = WorkflowState::AwaitingWalletConnection;
        }
        let _ = self.events.send(WorkflowEvent::StateChanged(
            WorkflowState::AwaitingWalletConnection,
        ));

        let accounts = match self.wallet.request_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => return Ok(self.wallet_failure(err).await),
        };
        if accounts.is_empty() {
            return Ok(self
                .fail(FailureReason::Submission(
                    "wallet granted no accounts".to_string(),
                ))
                .await);
        }

        let signer = match self.wallet.signer().await {
            Ok(signer) => signer,
            Err(err) => return Ok(self.wallet_failure(err).await),
        };

        self.transition(WorkflowState::AwaitingSignature).await;
        let submitted = match &intent {
            Intent::Purchase(purchase) => {
                info!(value = %purchase.value(), "submitting purchase transaction");
                self.contract
                    .purchase(Arc::clone(&signer), purchase.value())
                    .await
            }
            Intent::Transfer(transfer) => {
                info!(
                    token_id = transfer.token_id.0,
                    from = %transfer.from,
                    to = %transfer.to,
                    "submitting transfer transaction"
                );
                self.contract
                    .transfer_from(
                        Arc::clone(&signer),
                        transfer.from.clone(),
                        transfer.to.clone(),
                        transfer.token_id,
                    )
                    .await
            }
        };
        let pending = match submitted {
            Ok(pending) => pending,
            Err(WalletError::Rejected) => {
                return Ok(self
                    .back_to_idle("transaction rejected in the wallet; nothing was submitted")
                    .await)
            }
            Err(err) => return Ok(self.fail(FailureReason::Submission(err.to_string())).await),
        };

        self.transition(WorkflowState::AwaitingConfirmation).await;
        let confirmed = match self.confirmation_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, pending.wait()).await {
                Ok(result) => result,
                Err(_) => return Ok(self.fail(FailureReason::ConfirmationTimeout).await),
            },
            None => pending.wait().await,
        };

        match confirmed {
            Ok(receipt) => {
                info!(
                    tx_hash = %receipt.tx_hash,
                    block_number = receipt.block_number,
                    "transaction confirmed"
                );
                Ok(self.transition(WorkflowState::Succeeded(receipt)).await)
            }
            Err(err) => Ok(self.fail(FailureReason::Submission(err.to_string())).await),
        }
    }

    /// Maps wallet-connection failures: a missing provider is its own
    /// terminal outcome, a dismissed prompt returns to `Idle` for retry.
    async fn wallet_failure(&self, err: WalletError) -> WorkflowState {
        match err {
            WalletError::Unavailable => self.fail(FailureReason::NoWalletProvider).await,
            WalletError::Rejected => {
                self.back_to_idle("wallet connection request was dismissed")
                    .await
            }
            WalletError::Backend(message) => {
                self.fail(FailureReason::Submission(message)).await
            }
        }
    }

    async fn transition(&self, next: WorkflowState) -> WorkflowState {
        {
            let mut state = self.state.lock().await;
            *state = next.clone();
        }
        let _ = self.events.send(WorkflowEvent::StateChanged(next.clone()));
        next
    }

    async fn fail(&self, reason: FailureReason) -> WorkflowState {
        warn!(%reason, "workflow failed");
        self.transition(WorkflowState::Failed(reason)).await
    }

    async fn back_to_idle(&self, notice: &str) -> WorkflowState {
        info!(notice, "returning workflow to idle");
        let _ = self.events.send(WorkflowEvent::Notice(notice.to_string()));
        self.transition(WorkflowState::Idle).await
    }
}

fn validate(intent: &Intent) -> Result<(), String> {
    match intent {
        Intent::Purchase(_) => Ok(()),
        Intent::Transfer(transfer) => {
            if transfer.to.is_zero() {
                return Err("transfer recipient is not set".to_string());
            }
            if transfer.from.is_zero() {
                return Err("transfer source is not set".to_string());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/listing_tests.rs"]
mod listing_tests;

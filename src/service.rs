//! Verification Service Module
//!
//! Collaborator-facing glue between the record store and the reconciler: opens
//! verification requests, answers status queries, and consumes verification events
//! by moving the matching pending request to verified.
//!
//! Users are never notified spontaneously; they learn the outcome through
//! [`VerificationService::status`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::VerificationConfig;
use crate::monitor::{format_wallet_address, is_valid_wallet_address, normalize_address, Reconciler, VerificationEvent};
use crate::storage::{PendingWallet, StoreError, VerifiedWallet, WalletStore};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Reasons a verification request is refused.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("invalid wallet address format: {0}")]
    InvalidAddress(String),
    #[error("a verification for wallet {wallet_address} is already pending; complete it or wait for it to expire")]
    AlreadyPending { wallet_address: String },
    #[error("someone else is currently trying to verify wallet {0}")]
    AddressPendingElsewhere(String),
    #[error("wallet {0} is already verified by someone else")]
    AddressVerifiedElsewhere(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the user must pay, and by when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInstructions {
    /// Wallet the payment must come from
    pub wallet_address: String,
    /// Address the payment must go to
    pub collection_address: String,
    /// Exact amount in display units
    pub amount: String,
    /// Currency symbol
    pub currency: String,
    /// Deadline of the request
    pub expires_at: DateTime<Utc>,
}

/// Verification state of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified {
        wallet_address: String,
        verified_at: DateTime<Utc>,
    },
    Pending {
        wallet_address: String,
        created_at: DateTime<Utc>,
        remaining_ms: u64,
        instructions: PaymentInstructions,
    },
    NotStarted,
}

// ============================================================================
// SERVICE IMPLEMENTATION
// ============================================================================

/// Opens verification requests and applies verification events to the store.
#[derive(Debug, Clone)]
pub struct VerificationService {
    store: Arc<WalletStore>,
    reconciler: Reconciler,
    collection_address: String,
    amount: String,
    currency: String,
    timeout: Duration,
}

impl VerificationService {
    pub fn new(config: &VerificationConfig, store: Arc<WalletStore>, reconciler: Reconciler) -> Self {
        Self {
            store,
            reconciler,
            collection_address: config.collection_address.clone(),
            amount: config.expected_amount.clone(),
            currency: config.currency.clone(),
            timeout: config.timeout(),
        }
    }

    pub fn store(&self) -> &Arc<WalletStore> {
        &self.store
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    fn instructions(&self, wallet_address: &str, created_at: DateTime<Utc>) -> PaymentInstructions {
        let timeout = chrono::Duration::from_std(self.timeout).unwrap_or(chrono::Duration::MAX);
        PaymentInstructions {
            wallet_address: wallet_address.to_string(),
            collection_address: self.collection_address.clone(),
            amount: self.amount.clone(),
            currency: self.currency.clone(),
            expires_at: created_at
                .checked_add_signed(timeout)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Opens a verification request for `wallet_address` on behalf of `user_id`.
    ///
    /// A user re-verifying replaces their verified wallet once the new request is
    /// accepted; a repeated request for the same wallet restarts the window.
    ///
    /// # Arguments
    ///
    /// * `user_id` - Identity of the requesting user
    /// * `username` - Display name of the user
    /// * `wallet_address` - Wallet to verify
    /// * `channel_id` - Channel the request came from, if any
    ///
    /// # Returns
    ///
    /// * `Ok(PaymentInstructions)` - Request opened and wallet monitored
    /// * `Err(VerificationError)` - Request refused
    pub async fn request_verification(
        &self,
        user_id: &str,
        username: &str,
        wallet_address: &str,
        channel_id: Option<String>,
    ) -> Result<PaymentInstructions, VerificationError> {
        let wallet_address = normalize_address(wallet_address);
        if !is_valid_wallet_address(&wallet_address) {
            return Err(VerificationError::InvalidAddress(wallet_address));
        }

        if let Some(existing) = self.store.find_pending_by_user(user_id).await {
            if existing.wallet_address != wallet_address {
                return Err(VerificationError::AlreadyPending {
                    wallet_address: existing.wallet_address,
                });
            }
        }
        if let Some(other) = self.store.find_pending_by_address(&wallet_address).await {
            if other.user_id != user_id {
                return Err(VerificationError::AddressPendingElsewhere(wallet_address));
            }
        }
        if let Some(other) = self.store.find_verified_by_address(&wallet_address).await {
            if other.user_id != user_id {
                return Err(VerificationError::AddressVerifiedElsewhere(wallet_address));
            }
        }

        // Same wallet again replaces the pending record; renewing keeps the address
        // monitored and the loop's cursor intact.
        let (pending, previous) = self
            .store
            .open_request(user_id, username, &wallet_address, channel_id)
            .await?;
        if let Some(previous) = previous {
            info!(
                "User {} re-verifying, dropped verified wallet {}",
                user_id,
                format_wallet_address(&previous.wallet_address)
            );
        }
        self.reconciler
            .renew_monitoring(&wallet_address, self.timeout)
            .await;
        self.schedule_request_expiry(pending.clone());

        info!(
            "Verification requested by {} for wallet {}",
            username,
            format_wallet_address(&wallet_address)
        );
        Ok(self.instructions(&wallet_address, pending.created_at))
    }

    /// Drops this exact pending request once its window has passed.
    fn schedule_request_expiry(&self, pending: PendingWallet) {
        let store = Arc::clone(&self.store);
        let timeout = self.timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if store.remove_pending_if_current(&pending).await {
                info!(
                    "Verification request of user {} for {} expired",
                    pending.user_id,
                    format_wallet_address(&pending.wallet_address)
                );
            }
        });
    }

    /// Current verification state of `user_id`.
    pub async fn status(&self, user_id: &str) -> VerificationStatus {
        if let Some(verified) = self.store.find_verified_by_user(user_id).await {
            return VerificationStatus::Verified {
                wallet_address: verified.wallet_address,
                verified_at: verified.verified_at,
            };
        }

        if let Some(pending) = self.store.find_pending_by_user(user_id).await {
            let elapsed = Utc::now()
                .signed_duration_since(pending.created_at)
                .to_std()
                .unwrap_or_default();
            let remaining_ms = self.timeout.saturating_sub(elapsed).as_millis() as u64;
            return VerificationStatus::Pending {
                instructions: self.instructions(&pending.wallet_address, pending.created_at),
                wallet_address: pending.wallet_address,
                created_at: pending.created_at,
                remaining_ms,
            };
        }

        VerificationStatus::NotStarted
    }

    /// Withdraws the user's pending request and stops monitoring its wallet.
    pub async fn cancel(&self, user_id: &str) -> Option<PendingWallet> {
        let pending = self.store.remove_pending(user_id).await?;
        self.reconciler.stop_monitoring(&pending.wallet_address).await;
        info!(
            "Verification request of user {} for {} cancelled",
            user_id,
            format_wallet_address(&pending.wallet_address)
        );
        Some(pending)
    }

    /// Applies one verification event to the store.
    ///
    /// # Returns
    ///
    /// The verified record, or `None` when no pending request matches the payer
    pub async fn handle_verified(&self, event: &VerificationEvent) -> Option<VerifiedWallet> {
        let Some(pending) = self.store.find_pending_by_address(&event.from_address).await else {
            warn!(
                "Payment {} from {} has no pending verification request, ignoring",
                event.transaction_hash, event.from_address
            );
            return None;
        };

        match self.store.verify_user(&pending.user_id).await {
            Ok(Some(verified)) => {
                info!(
                    "Wallet verified for user {} ({}), tx {}",
                    verified.username, verified.wallet_address, event.transaction_hash
                );
                Some(verified)
            }
            Ok(None) => {
                warn!("Pending request of user {} vanished before verification", pending.user_id);
                None
            }
            Err(e) => {
                error!("Failed to record verification for user {}: {}", pending.user_id, e);
                None
            }
        }
    }

    /// Consumes verification events until every sender is dropped.
    pub async fn run_event_consumer(self, mut events: mpsc::UnboundedReceiver<VerificationEvent>) {
        info!("Verification event consumer started");
        while let Some(event) = events.recv().await {
            self.handle_verified(&event).await;
        }
        info!("Verification event consumer stopped");
    }
}

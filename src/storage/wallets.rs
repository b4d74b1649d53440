//! Wallet Record Storage Module
//!
//! In-memory keyed store for pending verification requests and verified wallets.
//! Mirrors the uniqueness rules of the durable store the service is deployed
//! against: at most one pending request per user and per address, and at most one
//! verified wallet per user and per address. Addresses are stored lowercased.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::monitor::normalize_address;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// A verification request waiting for its payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWallet {
    /// Identity of the requesting user
    pub user_id: String,
    /// Display name of the user at request time
    pub username: String,
    /// Wallet address being verified (lowercase)
    pub wallet_address: String,
    /// Channel the request was made from, if any
    pub channel_id: Option<String>,
    /// When the request was created
    pub created_at: DateTime<Utc>,
}

/// A wallet whose ownership has been proven.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedWallet {
    pub user_id: String,
    pub username: String,
    pub wallet_address: String,
    pub channel_id: Option<String>,
    pub verified_at: DateTime<Utc>,
}

/// Uniqueness violations reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("user {0} already has a pending verification")]
    UserAlreadyPending(String),
    #[error("wallet {0} already has a pending verification")]
    AddressAlreadyPending(String),
    #[error("wallet {0} is already verified by another user")]
    AddressAlreadyVerified(String),
}

#[derive(Debug, Default)]
struct Records {
    /// user_id -> pending request
    pending: HashMap<String, PendingWallet>,
    /// user_id -> verified wallet
    verified: HashMap<String, VerifiedWallet>,
}

impl Records {
    /// Fails if another user has a pending request for the address of `pending`.
    fn check_address_not_pending(&self, pending: &PendingWallet) -> Result<(), StoreError> {
        if self
            .pending
            .values()
            .any(|p| p.wallet_address == pending.wallet_address && p.user_id != pending.user_id)
        {
            return Err(StoreError::AddressAlreadyPending(pending.wallet_address.clone()));
        }
        Ok(())
    }
}

// ============================================================================
// STORAGE IMPLEMENTATION
// ============================================================================

/// Store of pending and verified wallet records. Thread-safe via RwLock.
#[derive(Debug, Default)]
pub struct WalletStore {
    records: RwLock<Records>,
}

impl WalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pending request created now.
    ///
    /// # Arguments
    ///
    /// * `user_id` - Identity of the requesting user
    /// * `username` - Display name of the user
    /// * `wallet_address` - Address to verify (any case)
    /// * `channel_id` - Channel the request came from
    ///
    /// # Returns
    ///
    /// * `Ok(PendingWallet)` - The stored record
    /// * `Err(StoreError)` - The user or the address already has a pending request
    pub async fn add_pending(
        &self,
        user_id: &str,
        username: &str,
        wallet_address: &str,
        channel_id: Option<String>,
    ) -> Result<PendingWallet, StoreError> {
        self.insert_pending(PendingWallet {
            user_id: user_id.to_string(),
            username: username.to_string(),
            wallet_address: wallet_address.to_string(),
            channel_id,
            created_at: Utc::now(),
        })
        .await
    }

    /// Inserts a pending record with its own `created_at`.
    pub async fn insert_pending(&self, mut pending: PendingWallet) -> Result<PendingWallet, StoreError> {
        pending.wallet_address = normalize_address(&pending.wallet_address);
        let mut records = self.records.write().await;

        if records.pending.contains_key(&pending.user_id) {
            return Err(StoreError::UserAlreadyPending(pending.user_id));
        }
        records.check_address_not_pending(&pending)?;

        records.pending.insert(pending.user_id.clone(), pending.clone());
        Ok(pending)
    }

    /// Opens a verification request created now, as one atomic step.
    ///
    /// A pending request of the user for the same address is replaced. The user's
    /// verified wallet is dropped only if the new request is stored; a refused
    /// request leaves every record untouched.
    ///
    /// # Returns
    ///
    /// * `Ok((PendingWallet, Option<VerifiedWallet>))` - The stored request and the verified record it replaced
    /// * `Err(StoreError)` - The user has a pending request for another address, or
    ///   the address is pending or verified for another user
    pub async fn open_request(
        &self,
        user_id: &str,
        username: &str,
        wallet_address: &str,
        channel_id: Option<String>,
    ) -> Result<(PendingWallet, Option<VerifiedWallet>), StoreError> {
        let pending = PendingWallet {
            user_id: user_id.to_string(),
            username: username.to_string(),
            wallet_address: normalize_address(wallet_address),
            channel_id,
            created_at: Utc::now(),
        };
        let mut records = self.records.write().await;

        if let Some(existing) = records.pending.get(user_id) {
            if existing.wallet_address != pending.wallet_address {
                return Err(StoreError::UserAlreadyPending(pending.user_id));
            }
        }
        records.check_address_not_pending(&pending)?;
        if records
            .verified
            .values()
            .any(|v| v.wallet_address == pending.wallet_address && v.user_id != user_id)
        {
            return Err(StoreError::AddressAlreadyVerified(pending.wallet_address));
        }

        let replaced = records.verified.remove(user_id);
        records.pending.insert(pending.user_id.clone(), pending.clone());
        Ok((pending, replaced))
    }

    pub async fn find_pending_by_address(&self, wallet_address: &str) -> Option<PendingWallet> {
        let wallet_address = normalize_address(wallet_address);
        let records = self.records.read().await;
        records
            .pending
            .values()
            .find(|p| p.wallet_address == wallet_address)
            .cloned()
    }

    pub async fn find_pending_by_user(&self, user_id: &str) -> Option<PendingWallet> {
        self.records.read().await.pending.get(user_id).cloned()
    }

    pub async fn find_verified_by_address(&self, wallet_address: &str) -> Option<VerifiedWallet> {
        let wallet_address = normalize_address(wallet_address);
        let records = self.records.read().await;
        records
            .verified
            .values()
            .find(|v| v.wallet_address == wallet_address)
            .cloned()
    }

    pub async fn find_verified_by_user(&self, user_id: &str) -> Option<VerifiedWallet> {
        self.records.read().await.verified.get(user_id).cloned()
    }

    /// Moves the user's pending request to verified.
    ///
    /// A verified record already held by the user is superseded.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(VerifiedWallet))` - The new verified record
    /// * `Ok(None)` - The user has no pending request
    /// * `Err(StoreError)` - Another user already verified this address
    pub async fn verify_user(&self, user_id: &str) -> Result<Option<VerifiedWallet>, StoreError> {
        let mut records = self.records.write().await;

        let Some(pending) = records.pending.get(user_id).cloned() else {
            return Ok(None);
        };
        if records
            .verified
            .values()
            .any(|v| v.wallet_address == pending.wallet_address && v.user_id != user_id)
        {
            return Err(StoreError::AddressAlreadyVerified(pending.wallet_address));
        }

        let verified = VerifiedWallet {
            user_id: pending.user_id.clone(),
            username: pending.username,
            wallet_address: pending.wallet_address,
            channel_id: pending.channel_id,
            verified_at: Utc::now(),
        };
        records.pending.remove(user_id);
        records.verified.insert(user_id.to_string(), verified.clone());
        Ok(Some(verified))
    }

    pub async fn remove_pending(&self, user_id: &str) -> Option<PendingWallet> {
        self.records.write().await.pending.remove(user_id)
    }

    /// Removes `pending` only if it is still the user's current request.
    pub async fn remove_pending_if_current(&self, pending: &PendingWallet) -> bool {
        let mut records = self.records.write().await;
        if records.pending.get(&pending.user_id) != Some(pending) {
            return false;
        }
        records.pending.remove(&pending.user_id);
        true
    }

    /// Deletes pending requests older than `max_age`.
    ///
    /// # Returns
    ///
    /// Number of deleted requests
    pub async fn cleanup_expired_pending(&self, max_age: Duration) -> usize {
        self.cleanup_expired_pending_at(Utc::now(), max_age).await
    }

    /// Deletes pending requests created before `now - max_age`.
    pub async fn cleanup_expired_pending_at(&self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let max_age = ChronoDuration::from_std(max_age).unwrap_or(ChronoDuration::MAX);
        let cutoff = now.checked_sub_signed(max_age).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut records = self.records.write().await;
        let before = records.pending.len();
        records.pending.retain(|_, p| p.created_at >= cutoff);
        before - records.pending.len()
    }

    pub async fn pending_count(&self) -> usize {
        self.records.read().await.pending.len()
    }

    pub async fn verified_count(&self) -> usize {
        self.records.read().await.verified.len()
    }
}

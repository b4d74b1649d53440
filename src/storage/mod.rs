//! Storage Module
//!
//! This module provides the record store for the wallet verifier service:
//! pending verification requests and verified wallets.

pub mod wallets;

// Re-export for convenience
pub use wallets::{PendingWallet, StoreError, VerifiedWallet, WalletStore};

//! Wallet Verifier Library
//!
//! This crate proves that a user controls an EVM wallet: the user sends an exact
//! small payment from that wallet to a collection address, and a reconciler polling
//! the chain matches the payment and moves the user's pending request to verified.
//! The service never holds keys and never sends transactions.

pub mod api;
pub mod config;
pub mod evm_client;
pub mod monitor;
pub mod service;
pub mod storage;
pub mod units;

// Re-export commonly used types
pub use config::{ApiConfig, ChainConfig, Config, MonitorConfig, VerificationConfig};
pub use evm_client::{EvmBlock, EvmBlockTransaction, EvmClient, RpcError};
pub use monitor::{ExpirySweeper, MonitoringSet, PaymentMatcher, Reconciler, VerificationEvent};
pub use service::{PaymentInstructions, VerificationError, VerificationService, VerificationStatus};
pub use storage::{PendingWallet, VerifiedWallet, WalletStore};

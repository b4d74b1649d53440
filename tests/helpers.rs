//! Shared test helpers
//!
//! The module is organized into several categories:
//! - **Constants**: Addresses, hashes and amounts used across tests
//! - **Configuration Builders**: Test configurations pointing at a mock node
//! - **Component Builders**: Reconciler and verification service wired for tests
//! - **Mock Node Helpers**: wiremock responders for the JSON-RPC calls the service makes

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use wallet_verifier::config::Config;
use wallet_verifier::monitor::{Reconciler, VerificationEvent};
use wallet_verifier::service::VerificationService;
use wallet_verifier::storage::WalletStore;
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// CONSTANTS
// ============================================================================

// ------------------------------ ADDRESSES -------------------------------

/// Collection address payments must be sent to (lowercase)
pub const DUMMY_COLLECTION_ADDR: &str = "0x5571d64e92b6307db6ed15192f61dbe461b0a6ae";

/// Wallet being verified (lowercase)
pub const DUMMY_WALLET_ADDR: &str = "0x1111111111111111111111111111111111111a2b";

/// Same wallet as DUMMY_WALLET_ADDR in mixed case
pub const DUMMY_WALLET_ADDR_CHECKSUM: &str = "0x1111111111111111111111111111111111111A2B";

/// Second wallet being verified
pub const DUMMY_WALLET_ADDR_2: &str = "0x2222222222222222222222222222222222222222";

/// Address that is never monitored
pub const DUMMY_OTHER_ADDR: &str = "0x3333333333333333333333333333333333333333";

// ------------------------------- USERS ----------------------------------

pub const DUMMY_USER_ID: &str = "100000000000000001";

pub const DUMMY_USER_ID_2: &str = "100000000000000002";

pub const DUMMY_USERNAME: &str = "alice";

// ---------------------------- TRANSACTIONS ------------------------------

pub const DUMMY_TX_HASH: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000a1";

pub const DUMMY_TX_HASH_2: &str =
    "0x00000000000000000000000000000000000000000000000000000000000000a2";

/// 0.01 in wei
pub const EXPECTED_AMOUNT_HEX: &str = "0x2386f26fc10000";

/// 0.008 in wei
pub const UNDERPAID_AMOUNT_HEX: &str = "0x1c6bf526340000";

// ============================================================================
// CONFIGURATION BUILDERS
// ============================================================================

/// Build a test config whose chain endpoint is `rpc_url`.
///
/// Timings are short so loop tests finish quickly.
pub fn build_test_config(rpc_url: &str) -> Config {
    let mut config = Config::default();
    config.chain.rpc_url = rpc_url.to_string();
    config.chain.rpc_timeout_ms = 2_000;
    config.verification.collection_address = DUMMY_COLLECTION_ADDR.to_string();
    config.monitor.polling_interval_ms = 20;
    config.monitor.retry_initial_backoff_ms = 20;
    config.monitor.retry_max_backoff_ms = 100;
    config.monitor.max_blocks_per_cycle = 10;
    config.monitor.max_concurrent_fetches = 4;
    config
}

// ============================================================================
// COMPONENT BUILDERS
// ============================================================================

/// Build a reconciler against `rpc_url` with its event receiver.
pub fn build_test_reconciler(
    rpc_url: &str,
) -> (Reconciler, mpsc::UnboundedReceiver<VerificationEvent>) {
    let config = build_test_config(rpc_url);
    let (sender, receiver) = mpsc::unbounded_channel();
    let reconciler = Reconciler::new(&config, sender).expect("reconciler should build");
    (reconciler, receiver)
}

/// Build a verification service against `rpc_url` with its event receiver.
pub fn build_test_service(
    rpc_url: &str,
) -> (VerificationService, mpsc::UnboundedReceiver<VerificationEvent>) {
    let config = build_test_config(rpc_url);
    let (reconciler, receiver) = build_test_reconciler(rpc_url);
    let service = VerificationService::new(
        &config.verification,
        Arc::new(WalletStore::new()),
        reconciler,
    );
    (service, receiver)
}

// ============================================================================
// MOCK NODE HELPERS
// ============================================================================

/// JSON of one full transaction object.
pub fn transaction_json(hash: &str, from: &str, to: Option<&str>, value: &str) -> Value {
    json!({
        "hash": hash,
        "from": from,
        "to": to,
        "value": value,
        "nonce": "0x1",
        "gas": "0x5208",
        "input": "0x"
    })
}

/// JSON of a block at `height` holding `transactions`.
pub fn block_json(height: u64, transactions: Vec<Value>) -> Value {
    json!({
        "number": format!("0x{:x}", height),
        "hash": format!("0x{:064x}", height),
        "timestamp": "0x6553f100",
        "transactions": transactions
    })
}

/// Mount an eth_blockNumber responder returning `height`.
///
/// With `times`, the responder answers that many calls and then stops matching, so a
/// later-mounted responder takes over.
pub async fn mount_block_number(mock_server: &MockServer, height: u64, times: Option<u64>) {
    let mock = Mock::given(method("POST"))
        .and(body_partial_json(json!({"method": "eth_blockNumber"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": format!("0x{:x}", height)
        })));
    match times {
        Some(n) => mock.up_to_n_times(n).mount(mock_server).await,
        None => mock.mount(mock_server).await,
    }
}

/// Mount an eth_getBlockByNumber responder for `height`.
pub async fn mount_block(mock_server: &MockServer, height: u64, transactions: Vec<Value>) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_getBlockByNumber",
            "params": [format!("0x{:x}", height), true]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": block_json(height, transactions)
        })))
        .mount(mock_server)
        .await;
}

/// Mount a one-shot HTTP 500 for eth_getBlockByNumber at `height`.
pub async fn mount_rpc_error(mock_server: &MockServer, height: u64) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "eth_getBlockByNumber",
            "params": [format!("0x{:x}", height), true]
        })))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream unavailable"))
        .up_to_n_times(1)
        .mount(mock_server)
        .await;
}

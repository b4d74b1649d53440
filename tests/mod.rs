//! Test module organization
//!
//! This module re-exports test helpers for use in test files.

mod helpers;

#[allow(unused_imports)]
pub use helpers::{
    block_json, build_test_config, build_test_reconciler, build_test_service,
    mount_block, mount_block_number, mount_rpc_error, transaction_json, DUMMY_COLLECTION_ADDR,
    DUMMY_OTHER_ADDR, DUMMY_TX_HASH, DUMMY_TX_HASH_2, DUMMY_USER_ID, DUMMY_USER_ID_2,
    DUMMY_USERNAME, DUMMY_WALLET_ADDR, DUMMY_WALLET_ADDR_2, DUMMY_WALLET_ADDR_CHECKSUM,
    EXPECTED_AMOUNT_HEX, UNDERPAID_AMOUNT_HEX,
};

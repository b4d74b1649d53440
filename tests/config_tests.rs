//! Unit tests for configuration management
//!
//! These tests verify configuration parsing, defaults, derived amounts and
//! validation without requiring external services.

use std::time::Duration;
use wallet_verifier::config::Config;

#[path = "mod.rs"]
mod test_helpers;
use test_helpers::DUMMY_COLLECTION_ADDR;

const MINIMAL_TOML: &str = r#"
[chain]
name = "Monad Testnet"
rpc_url = "http://127.0.0.1:8545"
chain_id = 10143

[verification]
collection_address = "0x5571d64E92b6307db6ed15192F61dbE461B0a6Ae"
expected_amount = "0.01"
tolerance = "0.0001"
currency = "MON"

[api]
host = "127.0.0.1"
port = 4000
cors_origins = ["*"]
"#;

/// Test that default configuration is valid
/// Why: Tests and local development build on it
#[test]
fn test_default_config_is_valid() {
    let config = Config::default();

    config.validate().unwrap();
    assert_eq!(config.verification.collection_address, DUMMY_COLLECTION_ADDR);
    assert_eq!(config.verification.timeout(), Duration::from_secs(600));
    assert_eq!(config.verification.sweep_interval(), Duration::from_secs(300));
}

/// Test that omitted optional fields take their defaults
/// Why: A minimal config file must be enough to run the service
#[test]
fn test_minimal_config_defaults() {
    let config: Config = toml::from_str(MINIMAL_TOML).unwrap();

    config.validate().unwrap();
    assert_eq!(config.chain.rpc_timeout_ms, 30_000);
    assert_eq!(config.verification.decimals, 18);
    assert_eq!(config.verification.timeout_ms, 600_000);
    assert_eq!(config.verification.sweep_interval_ms, 300_000);
    assert_eq!(config.monitor.polling_interval_ms, 1000);
    assert_eq!(config.monitor.max_blocks_per_cycle, 50);
}

/// Test that the shipped template parses and validates
/// Why: Operators start from the template
#[test]
fn test_template_config_is_valid() {
    let content = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/config/verifier.template.toml")).unwrap();
    let config: Config = toml::from_str(&content).unwrap();

    config.validate().unwrap();
    assert_eq!(config.verification.currency, "MON");
}

/// Test that amounts are converted to smallest units exactly
/// Why: Matching compares integers, never floats
#[test]
fn test_amounts_in_smallest_units() {
    let config = Config::default();

    assert_eq!(config.verification.expected_amount_wei().unwrap(), 10_000_000_000_000_000);
    assert_eq!(config.verification.tolerance_wei().unwrap(), 100_000_000_000_000);
}

/// Test that invalid collection addresses are rejected
/// Why: Payments to a malformed address can never be matched
#[test]
fn test_invalid_collection_address_rejected() {
    let mut config = Config::default();
    config.verification.collection_address = "0x5571d64e".to_string();

    assert!(config.validate().is_err());
}

/// Test that a zero tolerance is rejected
/// Why: A strict comparison against zero would never match any payment
#[test]
fn test_zero_tolerance_rejected() {
    let mut config = Config::default();
    config.verification.tolerance = "0".to_string();

    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("tolerance"));
}

/// Test that amounts with more decimals than the chain supports are rejected
/// Why: Such amounts cannot be represented in smallest units
#[test]
fn test_too_precise_amount_rejected() {
    let mut config = Config::default();
    config.verification.decimals = 2;

    assert!(config.validate().is_err(), "0.0001 has four decimals");
}

/// Test that invalid RPC URLs and inconsistent backoff bounds are rejected
/// Why: Both would only surface as runtime failures otherwise
#[test]
fn test_invalid_url_and_backoff_rejected() {
    let mut config = Config::default();
    config.chain.rpc_url = "not a url".to_string();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.monitor.retry_initial_backoff_ms = 1000;
    config.monitor.retry_max_backoff_ms = 500;
    assert!(config.validate().is_err());
}

/// Test that Config::load reads the file named by the environment variable
/// Why: Deployments and the --config flag select the file through it
#[test]
fn test_load_from_env_path() {
    let path = std::env::temp_dir().join(format!("wallet-verifier-config-{}.toml", std::process::id()));
    std::fs::write(&path, MINIMAL_TOML).unwrap();

    std::env::set_var("WALLET_VERIFIER_CONFIG_PATH", &path);
    let loaded = Config::load();
    std::env::set_var("WALLET_VERIFIER_CONFIG_PATH", "/nonexistent/verifier.toml");
    let missing = Config::load();
    std::env::remove_var("WALLET_VERIFIER_CONFIG_PATH");
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded.unwrap().chain.chain_id, 10143);
    assert!(missing.unwrap_err().to_string().contains("not found"));
}

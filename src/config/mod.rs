//! Configuration Management Module
//!
//! This module handles loading and managing configuration for the wallet verifier service.
//! Configuration includes the chain endpoint, the verification payment terms, reconciler
//! timing settings, and API settings. All values are read once at process start.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::monitor::is_valid_wallet_address;
use crate::units::parse_units;

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all service settings.
///
/// This structure holds configuration for:
/// - Chain connection details (JSON-RPC endpoint)
/// - Verification payment terms (collection address, amount, tolerance, timeout)
/// - Reconciler loop timing (polling, retry backoff, per-cycle limits)
/// - API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Chain configuration (where verification payments are observed)
    pub chain: ChainConfig,
    /// Verification payment terms
    pub verification: VerificationConfig,
    /// Reconciler loop timing settings
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// API server configuration (host, port, CORS settings)
    pub api: ApiConfig,
}

/// Configuration for the EVM chain connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Human-readable name for the chain
    pub name: String,
    /// JSON-RPC endpoint URL
    pub rpc_url: String,
    /// Chain ID (informational, used in logs and status output)
    pub chain_id: u64,
    /// Per-request timeout for JSON-RPC calls in milliseconds
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
}

/// Verification payment terms.
///
/// Amounts are decimal strings in display units (e.g. "0.01") and are converted
/// to smallest-unit integers with `decimals` places, so no floating point is involved
/// in matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Address that receives verification payments
    pub collection_address: String,
    /// Exact payment amount in display units
    pub expected_amount: String,
    /// Accepted deviation from the expected amount in display units (strictly less than)
    pub tolerance: String,
    /// Number of decimals between the display unit and the smallest unit
    #[serde(default = "default_decimals")]
    pub decimals: u32,
    /// Display symbol of the native currency
    pub currency: String,
    /// Verification window in milliseconds (monitoring timeout and sweep age)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Period of the expiry sweep in milliseconds
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

/// Reconciler loop timing and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Wait between successful cycles in milliseconds
    pub polling_interval_ms: u64,
    /// First retry delay after a failed cycle in milliseconds
    pub retry_initial_backoff_ms: u64,
    /// Upper bound for the retry delay in milliseconds
    pub retry_max_backoff_ms: u64,
    /// Maximum number of block heights scanned in one cycle
    pub max_blocks_per_cycle: u64,
    /// Maximum number of block fetches in flight within one cycle
    pub max_concurrent_fetches: usize,
}

/// API server configuration for external communication.
///
/// Controls how the verifier service exposes its REST API endpoints
/// and handles cross-origin requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host address to bind the API server to
    pub host: String,
    /// Port number to bind the API server to
    pub port: u16,
    /// Allowed CORS origins for cross-origin requests
    pub cors_origins: Vec<String>,
}

fn default_rpc_timeout_ms() -> u64 {
    30_000
}

fn default_decimals() -> u32 {
    18
}

fn default_timeout_ms() -> u64 {
    10 * 60 * 1000
}

fn default_sweep_interval_ms() -> u64 {
    5 * 60 * 1000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            polling_interval_ms: 1000,
            retry_initial_backoff_ms: 500,
            retry_max_backoff_ms: 30_000,
            max_blocks_per_cycle: 50,
            max_concurrent_fetches: 4,
        }
    }
}

// ============================================================================
// DERIVED VALUES
// ============================================================================

impl VerificationConfig {
    /// Expected payment in the chain's smallest unit.
    pub fn expected_amount_wei(&self) -> anyhow::Result<u128> {
        parse_units(&self.expected_amount, self.decimals).map_err(|e| {
            anyhow::anyhow!("Invalid expected_amount '{}': {}", self.expected_amount, e)
        })
    }

    /// Matching tolerance in the chain's smallest unit.
    pub fn tolerance_wei(&self) -> anyhow::Result<u128> {
        parse_units(&self.tolerance, self.decimals)
            .map_err(|e| anyhow::anyhow!("Invalid tolerance '{}': {}", self.tolerance, e))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

// ============================================================================
// CONFIGURATION LOADING AND MANAGEMENT
// ============================================================================

impl Config {
    /// Validates the configuration.
    ///
    /// This function ensures that:
    /// - The RPC URL parses as a URL
    /// - The collection address is a 20-byte `0x` hex address
    /// - Expected amount and tolerance are valid decimals for `decimals`, tolerance > 0
    /// - Timing values are non-zero
    ///
    /// # Returns
    ///
    /// - `Ok(())` - Configuration is valid
    /// - `Err(anyhow::Error)` - A value is missing or malformed
    pub fn validate(&self) -> anyhow::Result<()> {
        url::Url::parse(&self.chain.rpc_url).map_err(|e| {
            anyhow::anyhow!(
                "Configuration error: invalid chain.rpc_url '{}': {}",
                self.chain.rpc_url,
                e
            )
        })?;

        if !is_valid_wallet_address(&self.verification.collection_address) {
            anyhow::bail!(
                "Configuration error: verification.collection_address '{}' is not a 0x-prefixed 20-byte hex address",
                self.verification.collection_address
            );
        }

        let expected = self.verification.expected_amount_wei()?;
        if expected == 0 {
            anyhow::bail!("Configuration error: verification.expected_amount must be greater than zero");
        }
        if self.verification.tolerance_wei()? == 0 {
            anyhow::bail!("Configuration error: verification.tolerance must be greater than zero");
        }

        if self.verification.timeout_ms == 0 || self.verification.sweep_interval_ms == 0 {
            anyhow::bail!("Configuration error: verification timeout_ms and sweep_interval_ms must be non-zero");
        }

        let monitor = &self.monitor;
        if monitor.polling_interval_ms == 0
            || monitor.retry_initial_backoff_ms == 0
            || monitor.max_blocks_per_cycle == 0
            || monitor.max_concurrent_fetches == 0
        {
            anyhow::bail!("Configuration error: monitor intervals and limits must be non-zero");
        }
        if monitor.retry_max_backoff_ms < monitor.retry_initial_backoff_ms {
            anyhow::bail!(
                "Configuration error: monitor.retry_max_backoff_ms ({}) is below retry_initial_backoff_ms ({})",
                monitor.retry_max_backoff_ms,
                monitor.retry_initial_backoff_ms
            );
        }

        Ok(())
    }

    /// Loads configuration from the TOML file.
    ///
    /// This function:
    /// 1. Checks if config/verifier.toml (or WALLET_VERIFIER_CONFIG_PATH) exists
    /// 2. If it exists, loads and parses the configuration
    /// 3. Validates the configuration
    /// 4. If it doesn't exist, returns an error asking user to copy template
    ///
    /// # Returns
    ///
    /// - `Ok(Config)` - Successfully loaded and validated configuration
    /// - `Err(anyhow::Error)` - Failed to load configuration, file doesn't exist, or validation failed
    pub fn load() -> anyhow::Result<Self> {
        // Check for custom config path via environment variable (for tests)
        let config_path = std::env::var("WALLET_VERIFIER_CONFIG_PATH")
            .unwrap_or_else(|_| "config/verifier.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/verifier.template.toml config/verifier.toml\n\
                Then edit config/verifier.toml with your actual values.",
                config_path
            ))
        }
    }

    /// Creates a default configuration with placeholder values.
    ///
    /// This configuration is suitable for local development and testing.
    /// For production use, the RPC URL and collection address must be replaced.
    #[allow(dead_code)]
    pub fn default() -> Self {
        Self {
            chain: ChainConfig {
                name: "Local Chain".to_string(),
                rpc_url: "http://127.0.0.1:8545".to_string(),
                chain_id: 31337,
                rpc_timeout_ms: default_rpc_timeout_ms(),
            },
            verification: VerificationConfig {
                collection_address: "0x5571d64e92b6307db6ed15192f61dbe461b0a6ae".to_string(),
                expected_amount: "0.01".to_string(),
                tolerance: "0.0001".to_string(),
                decimals: default_decimals(),
                currency: "MON".to_string(),
                timeout_ms: default_timeout_ms(),
                sweep_interval_ms: default_sweep_interval_ms(),
            },
            monitor: MonitorConfig::default(),
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 4000,
                cors_origins: vec!["*".to_string()],
            },
        }
    }
}

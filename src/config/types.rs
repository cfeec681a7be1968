//! Configuration types

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Pricing/margin oracle gateway
    #[serde(default)]
    pub oracle: OracleConfig,
    /// Preview engine tuning
    #[serde(default)]
    pub engine: EngineSettings,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

/// Oracle gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Base URL of the oracle's HTTP gateway
    #[serde(default = "default_oracle_rest_url")]
    pub rest_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            rest_url: default_oracle_rest_url(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_oracle_rest_url() -> String {
    "http://localhost:8545/oracle".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Preview engine settings
///
/// `max_usd_buffer_ratio` and `keeper_eth_deposit` are product policy values,
/// not derived constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Quiet period after the last edit before the oracle is asked
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Upper bound on a single oracle preview
    #[serde(default = "default_preview_timeout_ms")]
    pub preview_timeout_ms: u64,
    /// Leverage used when the user has no preference for a market
    #[serde(default = "default_leverage")]
    pub default_leverage: Decimal,
    /// ETH a keeper must hold for limit/stop orders
    #[serde(default = "default_keeper_eth_deposit")]
    pub keeper_eth_deposit: Decimal,
    /// Share of the max tradable size held back for price movement
    #[serde(default = "default_max_usd_buffer_ratio")]
    pub max_usd_buffer_ratio: Decimal,
    /// Message shown for failures that are not recognised rejections
    #[serde(default = "default_generic_error_message")]
    pub generic_error_message: String,
}

impl EngineSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn preview_timeout(&self) -> Duration {
        Duration::from_millis(self.preview_timeout_ms)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            preview_timeout_ms: default_preview_timeout_ms(),
            default_leverage: default_leverage(),
            keeper_eth_deposit: default_keeper_eth_deposit(),
            max_usd_buffer_ratio: default_max_usd_buffer_ratio(),
            generic_error_message: default_generic_error_message(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_preview_timeout_ms() -> u64 {
    15_000
}

fn default_leverage() -> Decimal {
    dec!(1)
}

fn default_keeper_eth_deposit() -> Decimal {
    dec!(0.01)
}

fn default_max_usd_buffer_ratio() -> Decimal {
    dec!(0.01)
}

fn default_generic_error_message() -> String {
    "Failed to fetch trade preview".to_string()
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml structure.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub trading: TradingSection,
    pub monitoring: MonitoringSection,
    pub stream: StreamSection,
    pub portal: PortalSection,
    pub settlement: SettlementSection,
    pub oracle: OracleSection,
    pub logging: LoggingSection,
}

/// Trading configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct TradingSection {
    /// SOL spent per snipe
    pub trade_amount_sol: Decimal,
    /// Slippage tolerance in percent
    pub slippage_pct: Decimal,
    /// Maximum concurrently tracked positions
    pub max_active_tokens: usize,
    /// Take half off the table at 2x entry mcap
    pub auto_buyback: bool,
    /// Priority fee per order in SOL
    pub priority_fee_sol: Decimal,
    /// Bribery fee per order in SOL
    pub bribery_fee_sol: Decimal,
    /// Priority fee multiplier for trusted creators
    pub trusted_priority_multiplier: Decimal,
    /// Wallet public key; WALLET_PUBLIC_KEY env var overrides
    #[serde(default)]
    pub wallet_public_key: String,
}

impl TradingSection {
    /// Get wallet public key with environment variable override
    pub fn get_wallet_public_key(&self) -> String {
        std::env::var("WALLET_PUBLIC_KEY").unwrap_or_else(|_| self.wallet_public_key.clone())
    }
}

/// Position monitoring configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringSection {
    /// Minimum USD market cap for admission
    pub min_mcap_usd: Decimal,
    /// USD market cap that triggers the final sell
    pub sell_mcap_usd: Decimal,
    /// Hard loss cap per position in SOL
    pub stop_loss_sol: Decimal,
    /// Trailing stop clamp, percent
    pub min_trailing_stop_pct: Decimal,
    pub max_trailing_stop_pct: Decimal,
    /// Creator success rate granting priority fees (0-1)
    pub trusted_creator_rate: Decimal,
    /// Seconds a token must survive to count as a creator success
    pub creator_success_secs: i64,
}

/// Feed connection configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct StreamSection {
    /// PumpPortal data websocket URL
    pub ws_url: String,
    pub base_reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    /// 0 means retry forever
    pub max_reconnect_attempts: u32,
    pub idle_timeout_secs: u64,
    pub ping_timeout_secs: u64,
    pub channel_buffer_size: usize,
}

/// Trade API configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct PortalSection {
    /// Trade-local endpoint URL
    pub trade_url: String,
    /// Liquidity pool to route through
    pub pool: String,
    pub request_timeout_secs: u64,
}

impl PortalSection {
    /// Get API key from the PORTAL_API_KEY env var, if set
    pub fn get_api_key(&self) -> Option<String> {
        std::env::var("PORTAL_API_KEY").ok().filter(|k| !k.is_empty())
    }
}

/// Batch settlement configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementSection {
    /// Queue depth that triggers a batch
    pub min_spots: usize,
    pub max_batch_size: usize,
    pub interval_secs: u64,
    /// Requeue failed spots up to this many times
    pub max_retries: u32,
    /// SOL reclaimed per settled spot
    pub spot_amount_sol: Decimal,
    /// Fee split across each batch
    pub base_priority_fee_sol: Decimal,
}

/// Price oracle configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct OracleSection {
    /// Fixed SOL/USD rate; 0 disables USD thresholds
    pub sol_usd: Decimal,
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trading.trade_amount_sol <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "trade_amount_sol must be > 0, got {}",
                self.trading.trade_amount_sol
            )));
        }

        if self.trading.max_active_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_active_tokens must be > 0".to_string(),
            ));
        }

        if self.trading.trusted_priority_multiplier < Decimal::ONE {
            return Err(ConfigError::ValidationError(format!(
                "trusted_priority_multiplier must be >= 1, got {}",
                self.trading.trusted_priority_multiplier
            )));
        }

        if self.monitoring.stop_loss_sol <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "stop_loss_sol must be > 0, got {}",
                self.monitoring.stop_loss_sol
            )));
        }

        if self.monitoring.min_trailing_stop_pct <= Decimal::ZERO
            || self.monitoring.min_trailing_stop_pct > self.monitoring.max_trailing_stop_pct
        {
            return Err(ConfigError::ValidationError(format!(
                "trailing stop clamp must satisfy 0 < min <= max, got {}..{}",
                self.monitoring.min_trailing_stop_pct, self.monitoring.max_trailing_stop_pct
            )));
        }

        if self.monitoring.trusted_creator_rate < Decimal::ZERO
            || self.monitoring.trusted_creator_rate > Decimal::ONE
        {
            return Err(ConfigError::ValidationError(format!(
                "trusted_creator_rate must be 0-1, got {}",
                self.monitoring.trusted_creator_rate
            )));
        }

        if self.stream.ws_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "ws_url cannot be empty".to_string(),
            ));
        }

        if self.stream.base_reconnect_delay_ms == 0 {
            return Err(ConfigError::ValidationError(
                "base_reconnect_delay_ms must be > 0".to_string(),
            ));
        }

        if self.stream.max_reconnect_delay_ms < self.stream.base_reconnect_delay_ms {
            return Err(ConfigError::ValidationError(format!(
                "max_reconnect_delay_ms must be >= base_reconnect_delay_ms, got {} < {}",
                self.stream.max_reconnect_delay_ms, self.stream.base_reconnect_delay_ms
            )));
        }

        if self.portal.trade_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "trade_url cannot be empty".to_string(),
            ));
        }

        if self.settlement.max_batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_batch_size must be > 0".to_string(),
            ));
        }

        if self.settlement.min_spots == 0 {
            return Err(ConfigError::ValidationError(
                "min_spots must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn stream_config(&self) -> crate::adapters::pump_portal::stream::StreamConfig {
        crate::adapters::pump_portal::stream::StreamConfig {
            ws_url: self.stream.ws_url.clone(),
            base_reconnect_delay: Duration::from_millis(self.stream.base_reconnect_delay_ms),
            max_reconnect_delay: Duration::from_millis(self.stream.max_reconnect_delay_ms),
            max_reconnect_attempts: self.stream.max_reconnect_attempts,
            idle_timeout: Duration::from_secs(self.stream.idle_timeout_secs),
            ping_timeout: Duration::from_secs(self.stream.ping_timeout_secs),
            channel_buffer_size: self.stream.channel_buffer_size,
        }
    }

    pub fn tracker_config(&self) -> crate::domain::tracker::TrackerConfig {
        crate::domain::tracker::TrackerConfig {
            trade_amount_sol: self.trading.trade_amount_sol,
            stop_loss_sol: self.monitoring.stop_loss_sol,
            auto_buyback: self.trading.auto_buyback,
            sell_mcap_usd: self.monitoring.sell_mcap_usd,
            min_trailing_stop_pct: self.monitoring.min_trailing_stop_pct,
            max_trailing_stop_pct: self.monitoring.max_trailing_stop_pct,
        }
    }

    pub fn filter_config(&self) -> crate::domain::filter::FilterConfig {
        crate::domain::filter::FilterConfig {
            min_mcap_usd: self.monitoring.min_mcap_usd,
            max_active_tokens: self.trading.max_active_tokens,
            trusted_creator_rate: self.monitoring.trusted_creator_rate,
            creator_success_secs: self.monitoring.creator_success_secs,
        }
    }

    pub fn settlement_config(&self) -> crate::domain::settlement::SettlementConfig {
        crate::domain::settlement::SettlementConfig {
            min_spots: self.settlement.min_spots,
            max_batch_size: self.settlement.max_batch_size,
            interval: Duration::from_secs(self.settlement.interval_secs),
            max_retries: self.settlement.max_retries,
            spot_amount_sol: self.settlement.spot_amount_sol,
            base_priority_fee_sol: self.settlement.base_priority_fee_sol,
            slippage_pct: self.trading.slippage_pct,
            pool: self.portal.pool.clone(),
        }
    }
}

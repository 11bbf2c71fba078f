//! Configuration loading from TOML.
//!
//! Reads `config.toml` (or the path in `BRIDGE_SCOUT_CONFIG`) and
//! deserializes it into strongly-typed structs. Every trader knob has a
//! default so a minimal file only needs the bridge and the coin list.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

/// Default config file path.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Env var that overrides the config file path.
pub const CONFIG_PATH_ENV: &str = "BRIDGE_SCOUT_CONFIG";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub trader: TraderConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Which scouting policy drives the engine.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Every held coin is scouted.
    #[default]
    MultipleCoins,
    /// A single persisted "current coin" is scouted.
    Default,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TraderConfig {
    /// Asset every rotation is valued and routed through.
    pub bridge: String,
    pub supported_coins: Vec<String>,
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Seed for the default strategy's current coin.
    #[serde(default)]
    pub current_coin: Option<String>,
    /// Scales the fee penalty subtracted from the raw ratio.
    #[serde(default = "default_scout_multiplier")]
    pub scout_multiplier: f64,
    #[serde(default = "default_scout_interval")]
    pub scout_interval_secs: u64,
    /// Skip candidates that need a two-leg bridge trade.
    #[serde(default)]
    pub only_direct_pairs: bool,
    /// Bridge value above which a held coin is not scouted as a target.
    #[serde(default = "default_min_amount")]
    pub min_amount: f64,
    /// Asset used to pay exchange fees; holdings keep an extra reserve.
    #[serde(default = "default_fee_asset")]
    pub fee_asset: String,
    #[serde(default = "default_fee_asset_reserve")]
    pub fee_asset_reserve: f64,
    /// Minimum bridge balance worth scouting from.
    #[serde(default = "default_bridge_min_notional")]
    pub bridge_min_notional: f64,
    /// Added to the exchange minimum when deciding a coin is held.
    #[serde(default = "default_min_notional_buffer")]
    pub min_notional_buffer: f64,
    /// Refuse a transaction unless the source value clears the exchange
    /// minimum before any pricing happens.
    #[serde(default)]
    pub strict_min_notional_check: bool,
    #[serde(default)]
    pub use_limit_orders: bool,
    #[serde(default = "default_value_log_interval")]
    pub value_log_interval_secs: u64,
    #[serde(default = "default_retry_attempts")]
    pub snapshot_retry_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub snapshot_retry_backoff_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_taker_fee")]
    pub taker_fee: f64,
    /// Multiplier applied to the taker fee while fees are paid in the fee asset.
    #[serde(default = "default_fee_asset_discount")]
    pub fee_asset_discount: f64,
    #[serde(default = "default_min_notional")]
    pub default_min_notional: f64,
    /// Starting balances for the paper account.
    #[serde(default)]
    pub initial_balances: HashMap<String, f64>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            taker_fee: default_taker_fee(),
            fee_asset_discount: default_fee_asset_discount(),
            default_min_notional: default_min_notional(),
            initial_balances: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DashboardConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
}

fn default_scout_multiplier() -> f64 {
    5.0
}
fn default_scout_interval() -> u64 {
    5
}
fn default_min_amount() -> f64 {
    10.0
}
fn default_fee_asset() -> String {
    "BNB".to_string()
}
fn default_fee_asset_reserve() -> f64 {
    5.0
}
fn default_bridge_min_notional() -> f64 {
    20.0
}
fn default_min_notional_buffer() -> f64 {
    10.0
}
fn default_value_log_interval() -> u64 {
    3600
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    1000
}
fn default_base_url() -> String {
    "https://api.binance.com".to_string()
}
fn default_taker_fee() -> f64 {
    0.001
}
fn default_fee_asset_discount() -> f64 {
    0.75
}
fn default_min_notional() -> f64 {
    10.0
}
fn default_database_url() -> String {
    "sqlite://bridge_scout.db".to_string()
}
fn default_dashboard_port() -> u16 {
    8080
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let mut config: AppConfig = toml::from_str(contents)?;
        config.normalize_symbols();
        config.validate()?;
        Ok(config)
    }

    /// Path from `BRIDGE_SCOUT_CONFIG`, else `config.toml`.
    pub fn default_path() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string())
    }

    /// Exchange symbols are uppercase; config may spell them either way.
    fn normalize_symbols(&mut self) {
        let t = &mut self.trader;
        t.bridge = normalize_symbol(&t.bridge);
        t.fee_asset = normalize_symbol(&t.fee_asset);
        t.current_coin = t.current_coin.as_deref().map(normalize_symbol);
        t.supported_coins = t
            .supported_coins
            .iter()
            .map(|s| normalize_symbol(s))
            .filter(|s| !s.is_empty())
            .collect();
        self.exchange.initial_balances = self
            .exchange
            .initial_balances
            .drain()
            .map(|(asset, qty)| (normalize_symbol(&asset), qty))
            .collect();
    }

    fn validate(&self) -> Result<()> {
        let t = &self.trader;
        if t.bridge.is_empty() {
            anyhow::bail!("trader.bridge must not be empty");
        }
        if t.supported_coins.is_empty() {
            anyhow::bail!("trader.supported_coins must list at least one coin");
        }
        if t.scout_multiplier < 0.0 {
            anyhow::bail!("trader.scout_multiplier must be non-negative");
        }
        if t.snapshot_retry_attempts == 0 {
            anyhow::bail!("trader.snapshot_retry_attempts must be at least 1");
        }
        if let Some(current) = &t.current_coin {
            if !t.supported_coins.contains(current) {
                anyhow::bail!("trader.current_coin {current} is not in supported_coins");
            }
        }
        Ok(())
    }
}

impl TraderConfig {
    /// Supported coins plus the bridge, deduplicated, in config order.
    pub fn coin_universe(&self) -> Vec<String> {
        let mut coins: Vec<String> = Vec::with_capacity(self.supported_coins.len() + 1);
        for symbol in self.supported_coins.iter().chain(std::iter::once(&self.bridge)) {
            if !coins.contains(symbol) {
                coins.push(symbol.clone());
            }
        }
        coins
    }

    /// Bridge value a held `coin` must exceed before it stops being a target.
    pub fn hold_threshold(&self, coin: &str) -> f64 {
        if coin == self.fee_asset {
            self.min_amount + self.fee_asset_reserve
        } else {
            self.min_amount
        }
    }
}

fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

//! Exchange integrations.
//!
//! Defines the `ExchangeApi` trait the engine trades through and the
//! read-only `PriceFeed` transport behind it. Implementations:
//! - Binance public REST: ticker prices and symbol rules
//! - Paper exchange: simulated account filling whole orders

pub mod binance;
pub mod paper;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{BalanceSnapshot, ExchangeError, TickerSnapshot, TradeResult};

/// Abstraction over a spot exchange.
///
/// Covers market data (ticker snapshots), balances and whole-order
/// execution. Order methods consume the decision snapshot so limit
/// orders are priced from the same view the engine scored against.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Capture every market's last price at one instant.
    async fn fetch_ticker_snapshot(&self) -> Result<TickerSnapshot, ExchangeError>;

    /// Current price of one market symbol, `None` if it does not trade.
    async fn ticker_price(&self, symbol: &str) -> Result<Option<f64>, ExchangeError>;

    /// Capture every asset's free/locked balance.
    async fn fetch_balances(&self) -> Result<BalanceSnapshot, ExchangeError>;

    /// Free quantity of one asset.
    async fn free_balance(&self, asset: &str) -> Result<f64, ExchangeError>;

    /// Sell the whole free balance of `asset` on the `asset`/`quote` market.
    async fn sell(
        &self,
        asset: &str,
        quote: &str,
        tickers: &TickerSnapshot,
    ) -> Result<TradeResult, ExchangeError>;

    /// Buy `asset` with the whole free balance of `paying` on the
    /// `asset`/`paying` market.
    async fn buy(
        &self,
        asset: &str,
        paying: &str,
        tickers: &TickerSnapshot,
        use_limit_order: bool,
    ) -> Result<TradeResult, ExchangeError>;

    /// Smallest order value accepted on the `asset`/`quote` market, in `quote`.
    fn min_notional(&self, asset: &str, quote: &str) -> f64;

    /// Fee fraction charged on the `base`/`quote` market.
    fn fee_rate(&self, base: &str, quote: &str, is_sell: bool) -> f64;

    /// Exchange name for logging and identification.
    fn name(&self) -> &str;
}

/// Trading rules for one market symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SymbolRules {
    pub min_notional: f64,
}

/// Read-only market data transport.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Last price of every listed symbol.
    async fn fetch_all_prices(&self) -> Result<HashMap<String, f64>>;

    /// Last price of one symbol, `None` if it is not listed.
    async fn fetch_price(&self, symbol: &str) -> Result<Option<f64>>;

    /// Per-symbol trading rules.
    async fn fetch_symbol_rules(&self) -> Result<HashMap<String, SymbolRules>>;
}

/// Market symbol of `base` quoted in `quote`.
pub fn symbol(base: &str, quote: &str) -> String {
    format!("{base}{quote}")
}

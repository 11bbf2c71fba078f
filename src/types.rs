//! Shared types for the bridge scout.
//!
//! These types form the data model used across all modules: the coin
//! universe, benchmark pairs, per-pass market/balance snapshots, trade
//! results and the audit records written after every decision.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Quotes at or below this value are treated as "market does not exist".
pub const MIN_VALID_PRICE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Coin universe
// ---------------------------------------------------------------------------

/// A tracked asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub symbol: String,
    pub enabled: bool,
}

impl Coin {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            enabled: true,
        }
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// An ordered (from, to) relation carrying the benchmark ratio.
///
/// `ratio` is `None` only before first initialization. Once set it is
/// `price(from) / price(to)` in bridge terms, taken the last time the
/// bot acquired `to_coin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Pair {
    pub id: i64,
    pub from_coin: String,
    pub to_coin: String,
    pub ratio: Option<f64>,
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from_coin, self.to_coin)
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// Last traded price for every market symbol, captured at one instant.
///
/// Lookups for a missing symbol return `None`; callers skip the candidate
/// rather than treating the price as zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickerSnapshot {
    prices: HashMap<String, f64>,
    pub captured_at: DateTime<Utc>,
}

impl TickerSnapshot {
    pub fn new(prices: HashMap<String, f64>) -> Self {
        Self {
            prices,
            captured_at: Utc::now(),
        }
    }

    /// Raw price for a market symbol such as `ETHUSDT`.
    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol).copied()
    }

    /// Price of `base` quoted in `quote`, only if that market exists and
    /// the quote is above [`MIN_VALID_PRICE`].
    pub fn quoted(&self, base: &str, quote: &str) -> Option<f64> {
        self.price(&format!("{base}{quote}"))
            .filter(|p| *p > MIN_VALID_PRICE)
    }

    /// Price of `coin` in bridge terms. The bridge itself is worth exactly 1.
    pub fn bridge_price(&self, coin: &str, bridge: &str) -> Option<f64> {
        if coin == bridge {
            return Some(1.0);
        }
        self.quoted(coin, bridge)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

/// Free and locked quantity of one asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub free: f64,
    pub locked: f64,
}

impl AssetBalance {
    pub fn total(&self) -> f64 {
        self.free + self.locked
    }
}

/// Account balances captured once per pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    balances: HashMap<String, AssetBalance>,
}

impl BalanceSnapshot {
    pub fn new(balances: HashMap<String, AssetBalance>) -> Self {
        Self { balances }
    }

    /// Free quantity; unknown assets hold nothing.
    pub fn free(&self, asset: &str) -> f64 {
        self.balances.get(asset).map(|b| b.free).unwrap_or(0.0)
    }

    /// Free + locked quantity, used for valuation.
    pub fn total(&self, asset: &str) -> f64 {
        self.balances.get(asset).map(AssetBalance::total).unwrap_or(0.0)
    }
}

/// Both snapshots for one scouting pass.
#[derive(Debug, Clone, Default)]
pub struct PassSnapshot {
    pub tickers: TickerSnapshot,
    pub balances: BalanceSnapshot,
}

// ---------------------------------------------------------------------------
// Trading
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// A filled order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeResult {
    pub order_id: String,
    /// Market symbol the order was placed on, e.g. `ETHBTC`.
    pub symbol: String,
    pub side: TradeSide,
    /// Executed price in the market's quote asset.
    pub price: f64,
    /// Base-asset quantity filled.
    pub quantity: f64,
    pub limit_order: bool,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for TradeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} qty={:.8} @ {:.8} [{}]",
            self.side, self.symbol, self.quantity, self.price, self.order_id,
        )
    }
}

// ---------------------------------------------------------------------------
// Audit records
// ---------------------------------------------------------------------------

/// One scored candidate, logged regardless of sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoutRecord {
    pub pair_id: i64,
    pub from_coin: String,
    pub to_coin: String,
    pub target_ratio: f64,
    pub current_ratio: f64,
    pub coin_price: f64,
    pub other_coin_price: f64,
    pub score: f64,
    pub datetime: DateTime<Utc>,
}

/// Portfolio valuation of one coin at one instant. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueRecord {
    pub coin: String,
    pub balance: f64,
    pub usd_price: Option<f64>,
    pub bridge_price: Option<f64>,
    pub usd_value: Option<Decimal>,
    pub bridge_value: Option<Decimal>,
    pub datetime: DateTime<Utc>,
}

/// Persisted outcome of one trade attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub from_coin: String,
    pub to_coin: String,
    pub route: String,
    pub settled: bool,
    pub price: Option<f64>,
    pub quantity: Option<f64>,
    pub reason: Option<String>,
    pub datetime: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures reported by an exchange collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("Market not available: {0}")]
    MarketUnavailable(String),

    #[error("Insufficient balance of {asset}: have {available:.8}")]
    InsufficientBalance { asset: String, available: f64 },

    #[error("Order below minimum notional on {symbol}: {notional:.8} < {min_notional:.8}")]
    BelowMinNotional {
        symbol: String,
        notional: f64,
        min_notional: f64,
    },

    #[error("Order rejected: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(#[from] anyhow::Error),
}

/// Failures that end a scouting pass early.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Snapshot unavailable after {attempts} attempts: {last_error}")]
    SnapshotUnavailable { attempts: u32, last_error: String },

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

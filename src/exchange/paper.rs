//! Paper exchange.
//!
//! Simulated spot account over any `PriceFeed`. Orders are filled whole:
//! a sell liquidates the full free balance, a buy spends the full free
//! balance of the paying asset. Limit orders fill at the decision
//! snapshot price, market orders at the feed's current price.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

use super::{symbol, ExchangeApi, PriceFeed, SymbolRules};
use crate::config::ExchangeConfig;
use crate::types::{
    AssetBalance, BalanceSnapshot, ExchangeError, TickerSnapshot, TradeResult, TradeSide,
    MIN_VALID_PRICE,
};

pub struct PaperExchange<F: PriceFeed> {
    feed: F,
    account: Mutex<HashMap<String, AssetBalance>>,
    rules: RwLock<HashMap<String, SymbolRules>>,
    taker_fee: f64,
    fee_asset: String,
    fee_asset_discount: f64,
    default_min_notional: f64,
}

impl<F: PriceFeed> PaperExchange<F> {
    pub fn new(feed: F, config: &ExchangeConfig, fee_asset: &str) -> Self {
        let account = config
            .initial_balances
            .iter()
            .map(|(asset, qty)| (asset.to_uppercase(), AssetBalance { free: *qty, locked: 0.0 }))
            .collect();

        Self {
            feed,
            account: Mutex::new(account),
            rules: RwLock::new(HashMap::new()),
            taker_fee: config.taker_fee,
            fee_asset: fee_asset.to_string(),
            fee_asset_discount: config.fee_asset_discount,
            default_min_notional: config.default_min_notional,
        }
    }

    /// Pull per-symbol rules from the feed. Symbols without rules fall back
    /// to the configured default minimum notional.
    pub async fn load_rules(&self) -> Result<usize> {
        let rules = self.feed.fetch_symbol_rules().await?;
        let count = rules.len();
        *self.rules.write().unwrap_or_else(|e| e.into_inner()) = rules;
        info!(symbols = count, "Paper exchange rules loaded");
        Ok(count)
    }

    /// Overwrite the free balance of one asset.
    pub fn set_balance(&self, asset: &str, free: f64) {
        let mut account = self.account.lock().unwrap_or_else(|e| e.into_inner());
        account.entry(asset.to_string()).or_default().free = free;
    }

    fn free(&self, asset: &str) -> f64 {
        let account = self.account.lock().unwrap_or_else(|e| e.into_inner());
        account.get(asset).map(|b| b.free).unwrap_or(0.0)
    }

    /// Move `spent` of `from` into `received` of `to`.
    fn settle(&self, from: &str, spent: f64, to: &str, received: f64) {
        let mut account = self.account.lock().unwrap_or_else(|e| e.into_inner());
        let source = account.entry(from.to_string()).or_default();
        source.free = (source.free - spent).max(0.0);
        account.entry(to.to_string()).or_default().free += received;
    }

    fn check_notional(&self, asset: &str, quote: &str, notional: f64) -> Result<(), ExchangeError> {
        let min_notional = self.min_notional(asset, quote);
        if notional < min_notional {
            return Err(ExchangeError::BelowMinNotional {
                symbol: symbol(asset, quote),
                notional,
                min_notional,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<F: PriceFeed> ExchangeApi for PaperExchange<F> {
    async fn fetch_ticker_snapshot(&self) -> Result<TickerSnapshot, ExchangeError> {
        let prices = self.feed.fetch_all_prices().await?;
        Ok(TickerSnapshot::new(prices))
    }

    async fn ticker_price(&self, symbol: &str) -> Result<Option<f64>, ExchangeError> {
        Ok(self.feed.fetch_price(symbol).await?)
    }

    async fn fetch_balances(&self) -> Result<BalanceSnapshot, ExchangeError> {
        let account = self.account.lock().unwrap_or_else(|e| e.into_inner());
        Ok(BalanceSnapshot::new(account.clone()))
    }

    async fn free_balance(&self, asset: &str) -> Result<f64, ExchangeError> {
        Ok(self.free(asset))
    }

    async fn sell(
        &self,
        asset: &str,
        quote: &str,
        tickers: &TickerSnapshot,
    ) -> Result<TradeResult, ExchangeError> {
        let market = symbol(asset, quote);
        let price = tickers
            .quoted(asset, quote)
            .ok_or_else(|| ExchangeError::MarketUnavailable(market.clone()))?;

        let quantity = self.free(asset);
        if quantity <= 0.0 {
            return Err(ExchangeError::InsufficientBalance {
                asset: asset.to_string(),
                available: quantity,
            });
        }

        let notional = quantity * price;
        self.check_notional(asset, quote, notional)?;

        let fee = self.fee_rate(asset, quote, true);
        let proceeds = notional * (1.0 - fee);
        self.settle(asset, quantity, quote, proceeds);

        debug!(symbol = %market, quantity, price, fee, proceeds, "Paper sell filled");
        Ok(TradeResult {
            order_id: format!("paper-{}", uuid::Uuid::new_v4()),
            symbol: market,
            side: TradeSide::Sell,
            price,
            quantity,
            limit_order: false,
            timestamp: Utc::now(),
        })
    }

    async fn buy(
        &self,
        asset: &str,
        paying: &str,
        tickers: &TickerSnapshot,
        use_limit_order: bool,
    ) -> Result<TradeResult, ExchangeError> {
        let market = symbol(asset, paying);
        let quoted = if use_limit_order {
            tickers.quoted(asset, paying)
        } else {
            self.feed
                .fetch_price(&market)
                .await?
                .filter(|p| *p > MIN_VALID_PRICE)
        };
        let price = quoted.ok_or_else(|| ExchangeError::MarketUnavailable(market.clone()))?;

        let spend = self.free(paying);
        if spend <= 0.0 {
            return Err(ExchangeError::InsufficientBalance {
                asset: paying.to_string(),
                available: spend,
            });
        }
        self.check_notional(asset, paying, spend)?;

        let fee = self.fee_rate(asset, paying, false);
        let quantity = spend / price * (1.0 - fee);
        self.settle(paying, spend, asset, quantity);

        debug!(symbol = %market, quantity, price, fee, limit = use_limit_order, "Paper buy filled");
        Ok(TradeResult {
            order_id: format!("paper-{}", uuid::Uuid::new_v4()),
            symbol: market,
            side: TradeSide::Buy,
            price,
            quantity,
            limit_order: use_limit_order,
            timestamp: Utc::now(),
        })
    }

    fn min_notional(&self, asset: &str, quote: &str) -> f64 {
        let rules = self.rules.read().unwrap_or_else(|e| e.into_inner());
        rules
            .get(&symbol(asset, quote))
            .map(|r| r.min_notional)
            .unwrap_or(self.default_min_notional)
    }

    fn fee_rate(&self, _base: &str, _quote: &str, _is_sell: bool) -> f64 {
        if self.free(&self.fee_asset) > 0.0 {
            self.taker_fee * self.fee_asset_discount
        } else {
            self.taker_fee
        }
    }

    fn name(&self) -> &str {
        "paper"
    }
}

// ---------------------------------------------------------------------------
// Static feed
// ---------------------------------------------------------------------------

/// Fixed, mutable price table. Drives offline runs and tests.
///
/// Clones share one table, so a handle kept outside a `PaperExchange`
/// still moves the prices it sees.
#[derive(Default, Clone)]
pub struct StaticPriceFeed {
    prices: Arc<RwLock<HashMap<String, f64>>>,
    rules: Arc<RwLock<HashMap<String, SymbolRules>>>,
}

impl StaticPriceFeed {
    pub fn new(prices: &[(&str, f64)]) -> Self {
        let feed = Self::default();
        for (s, p) in prices {
            feed.set_price(s, *p);
        }
        feed
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(symbol.to_string(), price);
    }

    pub fn set_min_notional(&self, symbol: &str, min_notional: f64) {
        self.rules
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(symbol.to_string(), SymbolRules { min_notional });
    }
}

#[async_trait]
impl PriceFeed for StaticPriceFeed {
    async fn fetch_all_prices(&self) -> Result<HashMap<String, f64>> {
        Ok(self.prices.read().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn fetch_price(&self, symbol: &str) -> Result<Option<f64>> {
        Ok(self.prices.read().unwrap_or_else(|e| e.into_inner()).get(symbol).copied())
    }

    async fn fetch_symbol_rules(&self) -> Result<HashMap<String, SymbolRules>> {
        Ok(self.rules.read().unwrap_or_else(|e| e.into_inner()).clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

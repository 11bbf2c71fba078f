//! Mock exchange for integration testing.
//!
//! Provides a deterministic `ExchangeApi` implementation with settable
//! prices and balances, forced failures and a log of every order, all
//! in-memory with no external dependencies.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use bridge_scout::exchange::{symbol, ExchangeApi};
use bridge_scout::types::*;

/// An order the mock filled.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedOrder {
    pub side: TradeSide,
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
}

/// A mock spot exchange for deterministic testing.
///
/// Orders fill whole at the snapshot price with a flat fee.
pub struct MockExchange {
    prices: Arc<Mutex<HashMap<String, f64>>>,
    balances: Arc<Mutex<HashMap<String, f64>>>,
    orders: Arc<Mutex<Vec<RecordedOrder>>>,
    /// If set, snapshot fetches return this error.
    force_error: Arc<Mutex<Option<String>>>,
    /// Orders on these symbols are rejected.
    failing_markets: Arc<Mutex<HashSet<String>>>,
    fee: f64,
    min_notional: f64,
}

impl MockExchange {
    pub fn new(prices: &[(&str, f64)], balances: &[(&str, f64)], fee: f64) -> Self {
        Self {
            prices: Arc::new(Mutex::new(
                prices.iter().map(|(s, p)| (s.to_string(), *p)).collect(),
            )),
            balances: Arc::new(Mutex::new(
                balances.iter().map(|(a, q)| (a.to_string(), *q)).collect(),
            )),
            orders: Arc::new(Mutex::new(Vec::new())),
            force_error: Arc::new(Mutex::new(None)),
            failing_markets: Arc::new(Mutex::new(HashSet::new())),
            fee,
            min_notional: 10.0,
        }
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    pub fn balance(&self, asset: &str) -> f64 {
        self.balances.lock().unwrap().get(asset).copied().unwrap_or(0.0)
    }

    /// Force snapshot fetches to fail.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    /// Reject every order on `symbol`.
    pub fn fail_market(&self, symbol: &str) {
        self.failing_markets.lock().unwrap().insert(symbol.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing_markets.lock().unwrap().clear();
    }

    /// All orders filled so far.
    pub fn orders(&self) -> Vec<RecordedOrder> {
        self.orders.lock().unwrap().clone()
    }

    fn check_market(&self, market: &str) -> Result<(), ExchangeError> {
        if self.failing_markets.lock().unwrap().contains(market) {
            return Err(ExchangeError::Rejected(format!("forced failure on {market}")));
        }
        Ok(())
    }

    fn fill(
        &self,
        side: TradeSide,
        market: String,
        spent: (&str, f64),
        received: (&str, f64),
        price: f64,
        quantity: f64,
    ) -> TradeResult {
        {
            let mut balances = self.balances.lock().unwrap();
            *balances.entry(spent.0.to_string()).or_default() -= spent.1;
            *balances.entry(received.0.to_string()).or_default() += received.1;
        }
        self.orders.lock().unwrap().push(RecordedOrder {
            side,
            symbol: market.clone(),
            quantity,
            price,
        });
        TradeResult {
            order_id: format!("mock-{}", uuid::Uuid::new_v4()),
            symbol: market,
            side,
            price,
            quantity,
            limit_order: true,
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
impl ExchangeApi for MockExchange {
    async fn fetch_ticker_snapshot(&self) -> Result<TickerSnapshot, ExchangeError> {
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(ExchangeError::Transport(anyhow!("{}", err)));
        }
        Ok(TickerSnapshot::new(self.prices.lock().unwrap().clone()))
    }

    async fn ticker_price(&self, symbol: &str) -> Result<Option<f64>, ExchangeError> {
        Ok(self.prices.lock().unwrap().get(symbol).copied())
    }

    async fn fetch_balances(&self) -> Result<BalanceSnapshot, ExchangeError> {
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(ExchangeError::Transport(anyhow!("{}", err)));
        }
        let balances = self
            .balances
            .lock()
            .unwrap()
            .iter()
            .map(|(a, q)| (a.clone(), AssetBalance { free: *q, locked: 0.0 }))
            .collect();
        Ok(BalanceSnapshot::new(balances))
    }

    async fn free_balance(&self, asset: &str) -> Result<f64, ExchangeError> {
        Ok(self.balance(asset))
    }

    async fn sell(
        &self,
        asset: &str,
        quote: &str,
        tickers: &TickerSnapshot,
    ) -> Result<TradeResult, ExchangeError> {
        let market = symbol(asset, quote);
        self.check_market(&market)?;
        let price = tickers
            .quoted(asset, quote)
            .ok_or_else(|| ExchangeError::MarketUnavailable(market.clone()))?;

        let quantity = self.balance(asset);
        if quantity <= 0.0 {
            return Err(ExchangeError::InsufficientBalance {
                asset: asset.to_string(),
                available: quantity,
            });
        }

        let proceeds = quantity * price * (1.0 - self.fee);
        let spent = (asset, quantity);
        Ok(self.fill(TradeSide::Sell, market, spent, (quote, proceeds), price, quantity))
    }

    async fn buy(
        &self,
        asset: &str,
        paying: &str,
        tickers: &TickerSnapshot,
        _use_limit_order: bool,
    ) -> Result<TradeResult, ExchangeError> {
        let market = symbol(asset, paying);
        self.check_market(&market)?;
        let price = tickers
            .quoted(asset, paying)
            .ok_or_else(|| ExchangeError::MarketUnavailable(market.clone()))?;

        let spend = self.balance(paying);
        if spend <= 0.0 {
            return Err(ExchangeError::InsufficientBalance {
                asset: paying.to_string(),
                available: spend,
            });
        }

        let quantity = spend / price * (1.0 - self.fee);
        Ok(self.fill(TradeSide::Buy, market, (paying, spend), (asset, quantity), price, quantity))
    }

    fn min_notional(&self, _asset: &str, _quote: &str) -> f64 {
        self.min_notional
    }

    fn fee_rate(&self, _base: &str, _quote: &str, _is_sell: bool) -> f64 {
        self.fee
    }

    fn name(&self) -> &str {
        "mock"
    }
}

//! Binance public market data.
//!
//! Uses the unauthenticated REST endpoints only:
//! - `GET /api/v3/ticker/price`: last price, all symbols or one
//! - `GET /api/v3/exchangeInfo`: per-symbol filters (minimum notional)
//!
//! Order placement needs signed requests and is not provided here; the
//! paper exchange executes against these prices instead.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::{PriceFeed, SymbolRules};

const REQUEST_TIMEOUT_SECS: u64 = 15;

// ---------------------------------------------------------------------------
// API types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    #[serde(default)]
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    filters: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct BinanceClient {
    http: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build Binance HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Parse ticker entries, dropping any with an unparseable price.
    fn parse_prices(entries: Vec<TickerPrice>) -> HashMap<String, f64> {
        entries
            .into_iter()
            .filter_map(|t| match t.price.parse::<f64>() {
                Ok(p) => Some((t.symbol, p)),
                Err(_) => {
                    warn!(symbol = %t.symbol, price = %t.price, "Unparseable ticker price");
                    None
                }
            })
            .collect()
    }

    /// Minimum notional from a symbol's `NOTIONAL` or `MIN_NOTIONAL` filter.
    fn parse_min_notional(filters: &[serde_json::Value]) -> Option<f64> {
        filters.iter().find_map(|f| {
            let kind = f.get("filterType")?.as_str()?;
            if kind != "NOTIONAL" && kind != "MIN_NOTIONAL" {
                return None;
            }
            f.get("minNotional")?.as_str()?.parse::<f64>().ok()
        })
    }
}

#[async_trait]
impl PriceFeed for BinanceClient {
    async fn fetch_all_prices(&self) -> Result<HashMap<String, f64>> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);
        debug!("Fetching all Binance ticker prices");

        let resp = self.http.get(&url).send().await.context("Ticker request failed")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Binance ticker error {status}: {body}");
        }

        let entries: Vec<TickerPrice> = resp.json().await
            .context("Failed to parse ticker response")?;
        let prices = Self::parse_prices(entries);
        debug!(count = prices.len(), "Fetched ticker prices");
        Ok(prices)
    }

    async fn fetch_price(&self, symbol: &str) -> Result<Option<f64>> {
        let url = format!("{}/api/v3/ticker/price", self.base_url);

        let resp = self.http
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .with_context(|| format!("Ticker request for {symbol} failed"))?;

        // Unknown symbols come back as 400 "Invalid symbol".
        if resp.status() == StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Binance ticker error {status}: {body}");
        }

        let ticker: TickerPrice = resp.json().await
            .with_context(|| format!("Failed to parse ticker for {symbol}"))?;
        Ok(ticker.price.parse::<f64>().ok())
    }

    async fn fetch_symbol_rules(&self) -> Result<HashMap<String, SymbolRules>> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);

        let resp = self.http.get(&url).send().await.context("exchangeInfo request failed")?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Binance exchangeInfo error {status}: {body}");
        }

        let info: ExchangeInfo = resp.json().await
            .context("Failed to parse exchangeInfo response")?;

        let rules: HashMap<String, SymbolRules> = info
            .symbols
            .into_iter()
            .filter(|s| s.status.is_empty() || s.status == "TRADING")
            .filter_map(|s| {
                let min_notional = Self::parse_min_notional(&s.filters)?;
                Some((s.symbol, SymbolRules { min_notional }))
            })
            .collect();

        info!(symbols = rules.len(), "Loaded Binance symbol rules");
        Ok(rules)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

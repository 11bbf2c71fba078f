//! Accountant: portfolio valuation.
//!
//! Values every enabled coin the account holds in both USD and bridge
//! terms. Values are carried as `Decimal` so totals add up exactly when
//! they are logged and persisted.

use chrono::Utc;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use tracing::info;

use crate::types::{Coin, PassSnapshot, ValueRecord};

/// Stablecoin used as the USD reference.
pub const USD_REFERENCE: &str = "USDT";

const VALUE_DECIMALS: u32 = 8;

// ---------------------------------------------------------------------------
// Valuation
// ---------------------------------------------------------------------------

/// Per-coin records plus portfolio totals.
#[derive(Debug, Clone, Default)]
pub struct PortfolioValuation {
    pub records: Vec<ValueRecord>,
    pub total_usd: Decimal,
    pub total_bridge: Decimal,
    /// Held coins that had no price in one of the two terms.
    pub unpriced: Vec<String>,
}

pub struct Accountant;

impl Accountant {
    /// Value every held coin in `coins` from one snapshot.
    pub fn value_portfolio(
        coins: &[Coin],
        snapshot: &PassSnapshot,
        bridge: &str,
    ) -> PortfolioValuation {
        let now = Utc::now();
        let mut valuation = PortfolioValuation::default();

        for coin in coins.iter().filter(|c| c.enabled) {
            let balance = snapshot.balances.total(&coin.symbol);
            if balance <= 0.0 {
                continue;
            }

            let usd_price = snapshot.tickers.bridge_price(&coin.symbol, USD_REFERENCE);
            let bridge_price = snapshot.tickers.bridge_price(&coin.symbol, bridge);
            let usd_value = usd_price.and_then(|p| to_decimal(balance * p));
            let bridge_value = bridge_price.and_then(|p| to_decimal(balance * p));

            valuation.total_usd += usd_value.unwrap_or(Decimal::ZERO);
            valuation.total_bridge += bridge_value.unwrap_or(Decimal::ZERO);
            if usd_value.is_none() || bridge_value.is_none() {
                valuation.unpriced.push(coin.symbol.clone());
            }

            valuation.records.push(ValueRecord {
                coin: coin.symbol.clone(),
                balance,
                usd_price,
                bridge_price,
                usd_value,
                bridge_value,
                datetime: now,
            });
        }

        info!(
            coins = valuation.records.len(),
            total_usd = format!("${:.2}", valuation.total_usd),
            total_bridge = %valuation.total_bridge,
            bridge,
            "Portfolio valued"
        );
        valuation
    }
}

fn to_decimal(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| d.round_dp(VALUE_DECIMALS))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

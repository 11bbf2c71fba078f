//! Trade executor.
//!
//! Converts the full free balance of one coin into another. Exactly one
//! route is chosen per transaction, in this order:
//! 1. `DirectSell`: a `from/to` market exists, sell `from` for `to`
//! 2. `InverseBuy`: a `to/from` market exists, buy `to` paying `from`
//! 3. `BridgeTwoLeg`: sell `from` for the bridge, then buy `to` with it
//!
//! A failed first leg leaves the source coin untouched. A failed
//! second leg leaves the account in the bridge, which the idle capital
//! scout picks up on a later pass.

use std::fmt;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::TraderConfig;
use crate::exchange::ExchangeApi;
use crate::types::{PassSnapshot, TickerSnapshot, TradeRecord, TradeResult};

// ---------------------------------------------------------------------------
// Routes and outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeRoute {
    DirectSell,
    InverseBuy,
    BridgeTwoLeg,
}

impl TradeRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeRoute::DirectSell => "direct_sell",
            TradeRoute::InverseBuy => "inverse_buy",
            TradeRoute::BridgeTwoLeg => "bridge_two_leg",
        }
    }
}

impl fmt::Display for TradeRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a transaction did not settle.
#[derive(Debug, Clone, PartialEq)]
pub enum AbortReason {
    ZeroBalance,
    UnpricedSource,
    BelowMinNotional { value: f64, min_notional: f64 },
    LegFailed { leg: &'static str, error: String },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::ZeroBalance => write!(f, "no free balance to trade"),
            AbortReason::UnpricedSource => write!(f, "source coin has no bridge price"),
            AbortReason::BelowMinNotional { value, min_notional } => {
                write!(f, "value {value:.8} below minimum notional {min_notional:.8}")
            }
            AbortReason::LegFailed { leg, error } => write!(f, "{leg} leg failed: {error}"),
        }
    }
}

/// Terminal state of one transaction.
#[derive(Debug, Clone)]
pub enum TradeOutcome {
    Settled {
        from: String,
        to: String,
        route: TradeRoute,
        /// Order that delivered the destination coin.
        result: TradeResult,
        /// Destination coin's price in bridge terms, when derivable.
        bridge_price: Option<f64>,
    },
    Aborted {
        from: String,
        to: String,
        route: Option<TradeRoute>,
        reason: AbortReason,
    },
}

impl TradeOutcome {
    /// Persistable form of this outcome.
    pub fn to_record(&self) -> TradeRecord {
        match self {
            TradeOutcome::Settled { from, to, route, result, bridge_price } => TradeRecord {
                from_coin: from.clone(),
                to_coin: to.clone(),
                route: route.to_string(),
                settled: true,
                price: *bridge_price,
                quantity: Some(result.quantity),
                reason: None,
                datetime: Utc::now(),
            },
            TradeOutcome::Aborted { from, to, route, reason } => TradeRecord {
                from_coin: from.clone(),
                to_coin: to.clone(),
                route: route.map(|r| r.to_string()).unwrap_or_else(|| "none".to_string()),
                settled: false,
                price: None,
                quantity: None,
                reason: Some(reason.to_string()),
                datetime: Utc::now(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Route precedence for moving `from` into `to`.
pub fn choose_route(tickers: &TickerSnapshot, from: &str, to: &str) -> TradeRoute {
    if tickers.quoted(from, to).is_some() {
        TradeRoute::DirectSell
    } else if tickers.quoted(to, from).is_some() {
        TradeRoute::InverseBuy
    } else {
        TradeRoute::BridgeTwoLeg
    }
}

/// Move the whole free balance of `from` into `to`.
///
/// Never returns an error: every failure becomes `TradeOutcome::Aborted`
/// so the caller can log it and carry on.
pub async fn transact(
    exchange: &dyn ExchangeApi,
    config: &TraderConfig,
    from: &str,
    to: &str,
    snapshot: &PassSnapshot,
) -> TradeOutcome {
    let bridge = config.bridge.as_str();
    let tickers = &snapshot.tickers;
    let aborted = |route: Option<TradeRoute>, reason: AbortReason| {
        warn!(from, to, route = ?route, reason = %reason, "Transaction aborted");
        TradeOutcome::Aborted {
            from: from.to_string(),
            to: to.to_string(),
            route,
            reason,
        }
    };

    let balance = snapshot.balances.free(from);
    if balance <= 0.0 {
        return aborted(None, AbortReason::ZeroBalance);
    }

    if config.strict_min_notional_check && from != bridge {
        let Some(price) = tickers.bridge_price(from, bridge) else {
            return aborted(None, AbortReason::UnpricedSource);
        };
        let value = balance * price;
        let min_notional = exchange.min_notional(from, bridge);
        if value <= min_notional {
            return aborted(None, AbortReason::BelowMinNotional { value, min_notional });
        }
    }

    let route = choose_route(tickers, from, to);
    info!(from, to, route = %route, balance, exchange = exchange.name(), "Executing transaction");

    let (result, bridge_price) = match route {
        TradeRoute::DirectSell => match exchange.sell(from, to, tickers).await {
            Ok(result) => (result, tickers.bridge_price(to, bridge)),
            Err(e) => return aborted(Some(route), leg_failed("sell", e)),
        },
        TradeRoute::InverseBuy => {
            match exchange.buy(to, from, tickers, config.use_limit_orders).await {
                Ok(result) => {
                    let price = if from == bridge {
                        Some(result.price)
                    } else {
                        tickers.bridge_price(from, bridge).map(|p| result.price * p)
                    };
                    (result, price)
                }
                Err(e) => return aborted(Some(route), leg_failed("buy", e)),
            }
        }
        TradeRoute::BridgeTwoLeg => {
            if from != bridge {
                if let Err(e) = exchange.sell(from, bridge, tickers).await {
                    return aborted(Some(route), leg_failed("sell", e));
                }
            }
            match exchange.buy(to, bridge, tickers, config.use_limit_orders).await {
                Ok(result) => {
                    let price = result.price;
                    (result, Some(price))
                }
                Err(e) => {
                    warn!(from, to, bridge, "Second leg failed, holding bridge");
                    return aborted(Some(route), leg_failed("buy", e));
                }
            }
        }
    };

    info!(
        from,
        to,
        route = %route,
        order = %result,
        bridge_price = ?bridge_price,
        "Transaction settled"
    );

    TradeOutcome::Settled {
        from: from.to_string(),
        to: to.to_string(),
        route,
        result,
        bridge_price,
    }
}

fn leg_failed(leg: &'static str, error: impl fmt::Display) -> AbortReason {
    AbortReason::LegFailed {
        leg,
        error: error.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

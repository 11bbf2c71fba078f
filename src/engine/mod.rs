//! Core engine: snapshot → initialize → scout → execute → reconcile.
//!
//! One call to [`Engine::run_pass`] is one scouting pass. Every decision in
//! a pass is made against a single snapshot, and at most one trade is
//! executed per pass.

pub mod accountant;
pub mod executor;
pub mod reconciler;
pub mod scoring;
pub mod selector;
pub mod snapshot;
pub mod trader;

use tracing::{info, warn};

use crate::strategy::Strategy;
use crate::types::EngineError;
use accountant::PortfolioValuation;
use executor::{TradeOutcome, TradeRoute};
use trader::AutoTrader;

/// What one pass ended with.
#[derive(Debug, Clone, PartialEq)]
pub enum PassReport {
    /// Nothing worth doing.
    Hold,
    Settled {
        from: String,
        to: String,
        route: TradeRoute,
        bridge_price: Option<f64>,
    },
    Aborted {
        from: String,
        to: String,
        reason: String,
    },
}

pub struct Engine {
    trader: AutoTrader,
    strategy: Box<dyn Strategy>,
}

impl Engine {
    pub fn new(trader: AutoTrader, strategy: Box<dyn Strategy>) -> Self {
        Self { trader, strategy }
    }

    pub fn trader(&self) -> &AutoTrader {
        &self.trader
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Sync the coin universe, seed benchmarks and run strategy setup.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        let coins = self.trader.config().coin_universe();
        self.trader.db().sync_coins(&coins).await?;

        let snapshot = self.trader.snapshot().await?;
        self.trader.initialize_benchmarks(&snapshot).await?;
        self.strategy.initialize(&self.trader, &snapshot).await?;

        info!(
            strategy = self.strategy.name(),
            exchange = self.trader.exchange().name(),
            coins = coins.len(),
            bridge = self.trader.bridge(),
            "Engine initialized"
        );
        Ok(())
    }

    /// Run one scouting pass.
    pub async fn run_pass(&self) -> Result<PassReport, EngineError> {
        let snapshot = self.trader.snapshot().await?;
        self.trader.initialize_benchmarks(&snapshot).await?;

        let Some(request) = self.strategy.scout(&self.trader, &snapshot).await? else {
            return Ok(PassReport::Hold);
        };

        let outcome = self.trader.execute(&request, &snapshot).await?;
        match outcome {
            TradeOutcome::Settled { from, to, route, bridge_price, .. } => {
                self.strategy.on_settled(&self.trader, &to).await?;

                // Balances moved: value the portfolio from a fresh view.
                match self.trader.snapshot().await {
                    Ok(after) => {
                        self.trader.record_values(&after).await?;
                    }
                    Err(e) => warn!(error = %e, "Post-trade valuation skipped"),
                }

                Ok(PassReport::Settled { from, to, route, bridge_price })
            }
            TradeOutcome::Aborted { from, to, reason, .. } => Ok(PassReport::Aborted {
                from,
                to,
                reason: reason.to_string(),
            }),
        }
    }

    /// Snapshot and persist the portfolio valuation.
    pub async fn record_values(&self) -> Result<PortfolioValuation, EngineError> {
        let snapshot = self.trader.snapshot().await?;
        self.trader.record_values(&snapshot).await
    }
}

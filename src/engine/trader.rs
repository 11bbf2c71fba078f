//! Shared trading core.
//!
//! `AutoTrader` owns the collaborators every strategy needs: the exchange,
//! the store and the trader settings. Strategies decide *what* to scout;
//! the trader does the scoring, selection, execution and bookkeeping.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::accountant::{Accountant, PortfolioValuation};
use super::executor::{self, TradeOutcome};
use super::reconciler::{self, ReconcileReport};
use super::scoring::{self, ScoredPair};
use super::selector::select_jump;
use super::snapshot;
use crate::config::TraderConfig;
use crate::exchange::ExchangeApi;
use crate::storage::Database;
use crate::types::{EngineError, PassSnapshot};

// ---------------------------------------------------------------------------
// Trade requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum RequestKind {
    /// Held coin into a better-scoring coin.
    Jump { score: f64 },
    /// Idle bridge balance into an undervalued coin.
    BridgeEntry,
}

/// A move a strategy wants executed this pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRequest {
    pub from: String,
    pub to: String,
    pub kind: RequestKind,
}

impl TradeRequest {
    pub fn jump(candidate: &ScoredPair) -> Self {
        Self {
            from: candidate.pair.from_coin.clone(),
            to: candidate.pair.to_coin.clone(),
            kind: RequestKind::Jump { score: candidate.score },
        }
    }

    pub fn bridge_entry(bridge: &str, coin: &str) -> Self {
        Self {
            from: bridge.to_string(),
            to: coin.to_string(),
            kind: RequestKind::BridgeEntry,
        }
    }
}

impl fmt::Display for TradeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RequestKind::Jump { score } => {
                write!(f, "jump {}->{} (score {score:.6})", self.from, self.to)
            }
            RequestKind::BridgeEntry => write!(f, "bridge entry {}->{}", self.from, self.to),
        }
    }
}

// ---------------------------------------------------------------------------
// AutoTrader
// ---------------------------------------------------------------------------

pub struct AutoTrader {
    exchange: Arc<dyn ExchangeApi>,
    db: Database,
    config: TraderConfig,
}

impl AutoTrader {
    pub fn new(exchange: Arc<dyn ExchangeApi>, db: Database, config: TraderConfig) -> Self {
        Self { exchange, db, config }
    }

    pub fn config(&self) -> &TraderConfig {
        &self.config
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn exchange(&self) -> &dyn ExchangeApi {
        self.exchange.as_ref()
    }

    pub fn bridge(&self) -> &str {
        &self.config.bridge
    }

    /// Fetch the pass snapshot with the configured retry policy.
    pub async fn snapshot(&self) -> Result<PassSnapshot, EngineError> {
        snapshot::acquire(
            self.exchange(),
            self.config.snapshot_retry_attempts,
            Duration::from_millis(self.config.snapshot_retry_backoff_ms),
        )
        .await
    }

    /// Seed every unset benchmark from the snapshot.
    pub async fn initialize_benchmarks(
        &self,
        snapshot: &PassSnapshot,
    ) -> Result<ReconcileReport, EngineError> {
        Ok(reconciler::initialize_all(&self.db, &snapshot.tickers, self.bridge()).await?)
    }

    /// Score every enabled target of `coin` and persist the audit trail.
    pub async fn score_coin(
        &self,
        coin: &str,
        coin_price: f64,
        snapshot: &PassSnapshot,
    ) -> Result<Vec<ScoredPair>, EngineError> {
        let pairs = self.db.get_pairs_from(coin).await?;
        let scoring =
            scoring::score_pairs(coin, coin_price, &pairs, snapshot, &self.config, self.exchange());
        self.db.log_scouts(&scoring.audit).await?;
        Ok(scoring.scores)
    }

    /// Best positive jump out of `coin`, if any.
    pub async fn best_jump(
        &self,
        coin: &str,
        coin_price: f64,
        snapshot: &PassSnapshot,
    ) -> Result<Option<TradeRequest>, EngineError> {
        let scores = self.score_coin(coin, coin_price, snapshot).await?;
        let decision = select_jump(&scores);

        if let Some(best) = decision.best_overall {
            debug!(
                coin,
                target = %best.pair.to_coin,
                score = best.score,
                candidates = scores.len(),
                "Best candidate"
            );
        }

        Ok(decision.chosen.map(|c| {
            info!(from = coin, to = %c.pair.to_coin, score = c.score, "Will be jumping");
            TradeRequest::jump(c)
        }))
    }

    /// Find a coin to buy with idle bridge balance.
    ///
    /// A coin qualifies when it has scores and none of them is positive,
    /// i.e. nothing currently looks better than holding it, and the bridge
    /// balance clears its minimum notional. First qualifying coin wins.
    pub async fn bridge_scout(
        &self,
        snapshot: &PassSnapshot,
    ) -> Result<Option<TradeRequest>, EngineError> {
        let bridge = self.bridge();
        let bridge_balance = snapshot.balances.free(bridge);
        if bridge_balance <= 0.0 {
            return Ok(None);
        }

        for coin in self.db.get_coins().await? {
            if coin.symbol == bridge {
                continue;
            }
            let Some(price) = snapshot.tickers.bridge_price(&coin.symbol, bridge) else {
                continue;
            };

            let scores = self.score_coin(&coin.symbol, price, snapshot).await?;
            if scores.is_empty() || scores.iter().any(|s| s.score > 0.0) {
                continue;
            }

            let min_notional = self.exchange.min_notional(&coin.symbol, bridge);
            if bridge_balance > min_notional {
                info!(coin = %coin.symbol, bridge_balance, "Will be moving bridge into coin");
                return Ok(Some(TradeRequest::bridge_entry(bridge, &coin.symbol)));
            }
        }

        Ok(None)
    }

    /// Execute `request`, reconcile on settlement and log the outcome.
    pub async fn execute(
        &self,
        request: &TradeRequest,
        snapshot: &PassSnapshot,
    ) -> Result<TradeOutcome, EngineError> {
        info!(request = %request, "Executing trade request");
        let outcome =
            executor::transact(self.exchange(), &self.config, &request.from, &request.to, snapshot)
                .await;

        // A settled trade is real on the exchange, so it is logged even if
        // the benchmark update below fails.
        self.db.log_trade(&outcome.to_record()).await?;

        if let TradeOutcome::Settled { to, bridge_price, .. } = &outcome {
            reconciler::reconcile_after_acquiring(
                &self.db,
                &snapshot.tickers,
                self.bridge(),
                to,
                *bridge_price,
            )
            .await?;
        }
        Ok(outcome)
    }

    /// Value the portfolio from a snapshot and persist the records.
    pub async fn record_values(
        &self,
        snapshot: &PassSnapshot,
    ) -> Result<PortfolioValuation, EngineError> {
        let coins = self.db.get_coins().await?;
        let valuation = Accountant::value_portfolio(&coins, snapshot, self.bridge());
        self.db.log_values(&valuation.records).await?;
        Ok(valuation)
    }
}

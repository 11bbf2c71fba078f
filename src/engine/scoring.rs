//! Ratio scoring.
//!
//! For a held coin, computes the fee-adjusted advantage of moving into
//! every enabled target:
//!
//! `score = (ratio - fee × multiplier × ratio) - benchmark`
//!
//! where `ratio` is the current price of the held coin in target terms.
//! Only moves large enough to pay the round trip come out positive.

use chrono::Utc;
use tracing::debug;

use crate::config::TraderConfig;
use crate::exchange::ExchangeApi;
use crate::types::{Pair, PassSnapshot, ScoutRecord};

/// How the current ratio of a candidate was priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricePath {
    /// `from/to` market.
    Direct,
    /// `to/from` market.
    Inverse,
    /// Both legs priced against the bridge.
    Bridge,
}

/// One candidate and its score.
#[derive(Debug, Clone)]
pub struct ScoredPair {
    pub pair: Pair,
    pub path: PricePath,
    pub current_ratio: f64,
    pub fee_rate: f64,
    pub score: f64,
}

/// Scores plus the audit trail written for them.
#[derive(Debug, Clone, Default)]
pub struct Scoring {
    pub scores: Vec<ScoredPair>,
    pub audit: Vec<ScoutRecord>,
}

/// Score every pair leaving `coin`, whose bridge price is `coin_price`.
///
/// Candidates are omitted, not scored as zero, when the target is already
/// held above its threshold, the benchmark is unset, or no price path is
/// available.
pub fn score_pairs(
    coin: &str,
    coin_price: f64,
    pairs: &[Pair],
    snapshot: &PassSnapshot,
    config: &TraderConfig,
    exchange: &dyn ExchangeApi,
) -> Scoring {
    let bridge = config.bridge.as_str();
    let tickers = &snapshot.tickers;
    let mut scoring = Scoring::default();

    for pair in pairs.iter().filter(|p| p.from_coin == coin) {
        let to = pair.to_coin.as_str();
        let to_bridge_price = tickers.bridge_price(to, bridge);

        let held = snapshot.balances.free(to);
        if let Some(price) = to_bridge_price {
            if held > 0.0 && held * price > config.hold_threshold(to) {
                debug!(pair = %pair, held, "Target already held, skipping");
                continue;
            }
        }

        let Some(benchmark) = pair.ratio else {
            debug!(pair = %pair, "Benchmark unset, skipping");
            continue;
        };

        let (path, coin_leg, other_leg, fee_rate) = if let Some(p) = tickers.quoted(coin, to) {
            (PricePath::Direct, p, 1.0, exchange.fee_rate(coin, to, true))
        } else if let Some(p) = tickers.quoted(to, coin) {
            (PricePath::Inverse, 1.0, p, exchange.fee_rate(to, coin, false))
        } else if config.only_direct_pairs {
            debug!(pair = %pair, "No direct market, skipping");
            continue;
        } else if let Some(other) = to_bridge_price {
            let fee = exchange.fee_rate(coin, bridge, true) + exchange.fee_rate(to, bridge, false);
            (PricePath::Bridge, coin_price, other, fee)
        } else {
            debug!(pair = %pair, bridge, "Target has no bridge price, skipping");
            continue;
        };

        let current_ratio = coin_leg / other_leg;
        let score =
            (current_ratio - fee_rate * config.scout_multiplier * current_ratio) - benchmark;

        scoring.audit.push(ScoutRecord {
            pair_id: pair.id,
            from_coin: pair.from_coin.clone(),
            to_coin: pair.to_coin.clone(),
            target_ratio: benchmark,
            current_ratio,
            coin_price: coin_leg,
            other_coin_price: other_leg,
            score,
            datetime: Utc::now(),
        });
        scoring.scores.push(ScoredPair {
            pair: pair.clone(),
            path,
            current_ratio,
            fee_rate,
            score,
        });
    }

    scoring
}

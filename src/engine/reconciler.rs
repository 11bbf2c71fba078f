//! Benchmark reconciliation.
//!
//! Benchmarks only ever come from bridge-price quotients. Unset pairs are
//! seeded once; after a settled trade every pair pointing at the acquired
//! coin is re-anchored to the price actually paid. Each call commits its
//! updates in one transaction.

use anyhow::Result;
use tracing::{debug, info};

use crate::storage::Database;
use crate::types::{Pair, TickerSnapshot, MIN_VALID_PRICE};

/// What a reconciliation run changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub updated: usize,
    /// Pairs left untouched for lack of a price, as `FROM->TO`.
    pub skipped: Vec<String>,
}

/// Seed every unset benchmark as `price(from) / price(to)` in bridge terms.
///
/// Set benchmarks are never touched, so a second call is a no-op.
pub async fn initialize_all(
    db: &Database,
    tickers: &TickerSnapshot,
    bridge: &str,
) -> Result<ReconcileReport> {
    let pairs = db.get_unset_pairs().await?;
    if pairs.is_empty() {
        return Ok(ReconcileReport::default());
    }

    let mut report = ReconcileReport::default();
    let mut updates = Vec::with_capacity(pairs.len());

    for pair in &pairs {
        let from_price = tickers.bridge_price(&pair.from_coin, bridge);
        let to_price = tickers.bridge_price(&pair.to_coin, bridge);
        match (from_price, to_price) {
            (Some(from), Some(to)) => updates.push((pair.id, from / to)),
            _ => {
                debug!(pair = %pair, "No bridge price, leaving benchmark unset");
                report.skipped.push(pair.to_string());
            }
        }
    }

    db.set_ratios(&updates).await?;
    report.updated = updates.len();
    info!(
        initialized = report.updated,
        skipped = report.skipped.len(),
        "Initialized benchmarks"
    );
    Ok(report)
}

/// Re-anchor every pair `(X, coin)` to `price(X) / coin_price`.
///
/// Pairs whose source has no bridge price keep their old benchmark.
pub async fn reconcile_after_acquiring(
    db: &Database,
    tickers: &TickerSnapshot,
    bridge: &str,
    coin: &str,
    coin_price: Option<f64>,
) -> Result<ReconcileReport> {
    let pairs = db.get_pairs_to(coin).await?;

    let Some(coin_price) = coin_price.filter(|p| *p > MIN_VALID_PRICE) else {
        info!(coin, "No bridge price for acquired coin, benchmarks unchanged");
        return Ok(ReconcileReport {
            updated: 0,
            skipped: pairs.iter().map(Pair::to_string).collect(),
        });
    };

    let mut report = ReconcileReport::default();
    let mut updates = Vec::with_capacity(pairs.len());

    for pair in &pairs {
        match tickers.bridge_price(&pair.from_coin, bridge) {
            Some(from_price) => updates.push((pair.id, from_price / coin_price)),
            None => {
                debug!(pair = %pair, "Source unpriced, keeping benchmark");
                report.skipped.push(pair.to_string());
            }
        }
    }

    db.set_ratios(&updates).await?;
    report.updated = updates.len();
    info!(
        coin,
        coin_price,
        updated = report.updated,
        skipped = report.skipped.len(),
        "Reconciled benchmarks"
    );
    Ok(report)
}

//! Snapshot acquisition.
//!
//! Fetches the ticker and balance snapshots a pass works from, retrying
//! the whole fetch with a fixed backoff. This is the engine's only retry
//! loop; single price lookups and order placement are never retried here.

use std::time::Duration;
use tracing::{debug, warn};

use crate::exchange::ExchangeApi;
use crate::types::{EngineError, ExchangeError, PassSnapshot};

/// Fetch both snapshots, trying up to `attempts` times.
pub async fn acquire(
    exchange: &dyn ExchangeApi,
    attempts: u32,
    backoff: Duration,
) -> Result<PassSnapshot, EngineError> {
    let attempts = attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match fetch_once(exchange).await {
            Ok(snapshot) => {
                debug!(
                    attempt,
                    symbols = snapshot.tickers.len(),
                    "Snapshot acquired"
                );
                return Ok(snapshot);
            }
            Err(e) => {
                warn!(attempt, attempts, error = %e, "Snapshot fetch failed");
                last_error = e.to_string();
                if attempt < attempts {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    Err(EngineError::SnapshotUnavailable {
        attempts,
        last_error,
    })
}

async fn fetch_once(exchange: &dyn ExchangeApi) -> Result<PassSnapshot, ExchangeError> {
    let tickers = exchange.fetch_ticker_snapshot().await?;
    let balances = exchange.fetch_balances().await?;
    Ok(PassSnapshot { tickers, balances })
}

//! Scouts a single persisted "current coin".

use async_trait::async_trait;
use tracing::{info, warn};

use super::Strategy;
use crate::engine::executor::TradeOutcome;
use crate::engine::trader::{AutoTrader, TradeRequest};
use crate::types::{EngineError, PassSnapshot};

pub struct DefaultStrategy;

#[async_trait]
impl Strategy for DefaultStrategy {
    fn name(&self) -> &'static str {
        "default"
    }

    /// Pick the current coin if none is stored, buying it with any bridge
    /// balance that clears the minimum notional.
    async fn initialize(
        &self,
        trader: &AutoTrader,
        snapshot: &PassSnapshot,
    ) -> Result<(), EngineError> {
        if let Some(current) = trader.db().get_current_coin().await? {
            info!(coin = %current, "Resuming with stored current coin");
            return Ok(());
        }

        let cfg = trader.config();
        let chosen = cfg
            .current_coin
            .as_ref()
            .or_else(|| cfg.supported_coins.iter().find(|c| **c != cfg.bridge))
            .cloned();
        let Some(coin) = chosen else {
            warn!("No coin other than the bridge is supported, nothing to hold");
            return Ok(());
        };

        info!(coin = %coin, "Setting initial current coin");
        trader.db().set_current_coin(&coin).await?;

        let bridge_balance = snapshot.balances.free(&cfg.bridge);
        if bridge_balance > trader.exchange().min_notional(&coin, &cfg.bridge) {
            info!(coin = %coin, bridge_balance, "Buying initial coin");
            let outcome = trader
                .execute(&TradeRequest::bridge_entry(&cfg.bridge, &coin), snapshot)
                .await?;
            if let TradeOutcome::Aborted { reason, .. } = outcome {
                warn!(coin = %coin, reason = %reason, "Initial purchase failed");
            }
        }
        Ok(())
    }

    async fn scout(
        &self,
        trader: &AutoTrader,
        snapshot: &PassSnapshot,
    ) -> Result<Option<TradeRequest>, EngineError> {
        let Some(current) = trader.db().get_current_coin().await? else {
            warn!("No current coin set, skipping scout");
            return Ok(None);
        };

        let bridge = trader.bridge();
        let Some(price) = snapshot.tickers.bridge_price(&current, bridge) else {
            info!(coin = %current, "Current coin has no bridge price, skipping scout");
            return Ok(None);
        };

        // A failed second leg leaves the current coin empty and the capital
        // in the bridge. Jumping from dust would only abort.
        let value = snapshot.balances.free(&current) * price;
        let min_notional = trader.exchange().min_notional(&current, bridge);
        if value <= min_notional {
            info!(coin = %current, value, min_notional, "Current coin drained, scouting bridge");
            return trader.bridge_scout(snapshot).await;
        }

        trader.best_jump(&current, price, snapshot).await
    }

    async fn on_settled(&self, trader: &AutoTrader, coin: &str) -> Result<(), EngineError> {
        trader.db().set_current_coin(coin).await?;
        Ok(())
    }
}

//! Scouts every coin the account holds a meaningful amount of.

use async_trait::async_trait;
use tracing::{debug, info};

use super::Strategy;
use crate::engine::trader::{AutoTrader, TradeRequest};
use crate::types::{EngineError, PassSnapshot};

pub struct MultipleCoinsStrategy;

impl MultipleCoinsStrategy {
    /// Bridge price of `coin` when its balance is large enough to trade.
    ///
    /// The bridge needs `bridge_min_notional`; other coins need the market
    /// minimum plus a buffer. The fee asset must also cover its reserve.
    fn tradable_price(trader: &AutoTrader, coin: &str, snapshot: &PassSnapshot) -> Option<f64> {
        let cfg = trader.config();
        let balance = snapshot.balances.free(coin);
        if balance <= 0.0 {
            return None;
        }

        let (price, min_notional) = if coin == cfg.bridge {
            (1.0, cfg.bridge_min_notional)
        } else {
            let price = snapshot.tickers.bridge_price(coin, &cfg.bridge)?;
            let min_notional =
                trader.exchange().min_notional(coin, &cfg.bridge) + cfg.min_notional_buffer;
            (price, min_notional)
        };

        let value = balance * price;
        let enough = if coin == cfg.fee_asset {
            value > cfg.fee_asset_reserve + min_notional
        } else {
            value >= min_notional
        };

        if enough {
            Some(price)
        } else {
            debug!(coin, value, min_notional, "Balance too small to scout");
            None
        }
    }
}

#[async_trait]
impl Strategy for MultipleCoinsStrategy {
    fn name(&self) -> &'static str {
        "multiple_coins"
    }

    async fn scout(
        &self,
        trader: &AutoTrader,
        snapshot: &PassSnapshot,
    ) -> Result<Option<TradeRequest>, EngineError> {
        for coin in trader.db().get_coins().await? {
            let Some(price) = Self::tradable_price(trader, &coin.symbol, snapshot) else {
                continue;
            };

            info!(coin = %coin.symbol, price, "Scouting for best trades");
            if let Some(request) = trader.best_jump(&coin.symbol, price, snapshot).await? {
                return Ok(Some(request));
            }
        }

        trader.bridge_scout(snapshot).await
    }
}

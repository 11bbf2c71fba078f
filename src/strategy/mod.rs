//! Scouting strategies.
//!
//! A strategy decides which held coins are scouted each pass and when idle
//! bridge balance is put to work. Scoring, execution and reconciliation
//! are shared through `AutoTrader`.

pub mod default;
pub mod multiple_coins;

use async_trait::async_trait;

use crate::config::StrategyKind;
use crate::engine::trader::{AutoTrader, TradeRequest};
use crate::types::{EngineError, PassSnapshot};

pub use default::DefaultStrategy;
pub use multiple_coins::MultipleCoinsStrategy;

#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-off setup before the first pass.
    async fn initialize(
        &self,
        _trader: &AutoTrader,
        _snapshot: &PassSnapshot,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    /// Decide the single trade, if any, to make this pass.
    async fn scout(
        &self,
        trader: &AutoTrader,
        snapshot: &PassSnapshot,
    ) -> Result<Option<TradeRequest>, EngineError>;

    /// Called after a requested trade settles into `coin`.
    async fn on_settled(&self, _trader: &AutoTrader, _coin: &str) -> Result<(), EngineError> {
        Ok(())
    }
}

pub fn build(kind: StrategyKind) -> Box<dyn Strategy> {
    match kind {
        StrategyKind::MultipleCoins => Box::new(MultipleCoinsStrategy),
        StrategyKind::Default => Box::new(DefaultStrategy),
    }
}

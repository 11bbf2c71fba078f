//! Paper exchange over a static feed, driven through full passes.

use std::sync::Arc;

use tokio_test::assert_ok;

use bridge_scout::config::AppConfig;
use bridge_scout::engine::executor::TradeRoute;
use bridge_scout::engine::trader::AutoTrader;
use bridge_scout::engine::{Engine, PassReport};
use bridge_scout::exchange::paper::{PaperExchange, StaticPriceFeed};
use bridge_scout::exchange::ExchangeApi;
use bridge_scout::storage::Database;
use bridge_scout::strategy;

const CONFIG: &str = r#"
[trader]
bridge = "USDT"
supported_coins = ["BTC", "ETH"]
snapshot_retry_backoff_ms = 1

[exchange]
taker_fee = 0.001
default_min_notional = 10.0

[exchange.initial_balances]
USDT = 100.0
"#;

#[tokio::test]
async fn test_bridge_entry_then_jump() {
    let cfg = AppConfig::parse(CONFIG).unwrap();

    let feed = StaticPriceFeed::new(&[("BTCUSDT", 40000.0), ("ETHUSDT", 2000.0), ("ETHBTC", 0.05)]);
    feed.set_min_notional("ETHBTC", 0.0001);
    let paper = Arc::new(PaperExchange::new(feed.clone(), &cfg.exchange, &cfg.trader.fee_asset));
    assert_eq!(assert_ok!(paper.load_rules().await), 1);

    let db = Database::in_memory().await.unwrap();
    let shared: Arc<dyn ExchangeApi> = paper.clone();
    let engine = Engine::new(
        AutoTrader::new(shared, db.clone(), cfg.trader.clone()),
        strategy::build(cfg.trader.strategy),
    );
    assert_eq!(engine.strategy_name(), "multiple_coins");
    assert_ok!(engine.initialize().await);
    assert_eq!(db.get_ratio("BTC", "ETH").await.unwrap(), Some(20.0));

    // Only the bridge is held and nothing beats holding BTC: buy it.
    let report = engine.run_pass().await.unwrap();
    assert_eq!(
        report,
        PassReport::Settled {
            from: "USDT".into(),
            to: "BTC".into(),
            route: TradeRoute::InverseBuy,
            bridge_price: Some(40000.0),
        }
    );
    let btc = paper.free_balance("BTC").await.unwrap();
    assert!((btc - 0.0024975).abs() < 1e-12);
    assert_eq!(paper.free_balance("USDT").await.unwrap(), 0.0);

    // Prices unchanged: hold.
    assert_eq!(engine.run_pass().await.unwrap(), PassReport::Hold);

    // ETH cheapens against BTC by far more than five round-trip fees.
    feed.set_price("ETHBTC", 0.04);
    let report = engine.run_pass().await.unwrap();
    match report {
        PassReport::Settled { from, to, route, bridge_price } => {
            assert_eq!((from.as_str(), to.as_str()), ("BTC", "ETH"));
            assert_eq!(route, TradeRoute::InverseBuy);
            assert!((bridge_price.unwrap() - 1600.0).abs() < 1e-6);
        }
        other => panic!("unexpected report: {other:?}"),
    }

    assert_eq!(paper.free_balance("BTC").await.unwrap(), 0.0);
    let eth = paper.free_balance("ETH").await.unwrap();
    assert!((eth - 0.0024975 / 0.04 * 0.999).abs() < 1e-12);

    let ratio = db.get_ratio("BTC", "ETH").await.unwrap().unwrap();
    assert!((ratio - 25.0).abs() < 1e-9);

    let trades = db.recent_trades(10).await.unwrap();
    assert_eq!(trades.len(), 2);
    assert!(trades.iter().all(|t| t.settled));
    assert!(!db.recent_values(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dust_balance_never_trades() {
    let cfg = AppConfig::parse(CONFIG).unwrap();
    let feed = StaticPriceFeed::new(&[("BTCUSDT", 40000.0), ("ETHUSDT", 2000.0), ("ETHBTC", 0.05)]);
    let paper = Arc::new(PaperExchange::new(feed, &cfg.exchange, &cfg.trader.fee_asset));
    paper.set_balance("USDT", 5.0);

    let db = Database::in_memory().await.unwrap();
    let shared: Arc<dyn ExchangeApi> = paper.clone();
    let engine = Engine::new(
        AutoTrader::new(shared, db.clone(), cfg.trader.clone()),
        strategy::build(cfg.trader.strategy),
    );
    assert_ok!(engine.initialize().await);

    assert_eq!(engine.run_pass().await.unwrap(), PassReport::Hold);
    assert_eq!(paper.free_balance("USDT").await.unwrap(), 5.0);
    assert!(db.recent_trades(10).await.unwrap().is_empty());
}

//! End-to-end scouting passes against the mock exchange.

use std::sync::Arc;

use tokio_test::{assert_err, assert_ok};

use bridge_scout::config::AppConfig;
use bridge_scout::engine::executor::TradeRoute;
use bridge_scout::engine::trader::AutoTrader;
use bridge_scout::engine::{Engine, PassReport};
use bridge_scout::exchange::ExchangeApi;
use bridge_scout::storage::Database;
use bridge_scout::strategy;
use bridge_scout::types::{EngineError, TradeSide};

use crate::mock_exchange::MockExchange;

fn config(coins: &[&str], strategy: &str, extra: &str) -> AppConfig {
    let list = coins
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    AppConfig::parse(&format!(
        r#"
        [trader]
        bridge = "USDT"
        supported_coins = [{list}]
        strategy = "{strategy}"
        snapshot_retry_attempts = 2
        snapshot_retry_backoff_ms = 1
        {extra}
        "#
    ))
    .unwrap()
}

async fn setup(cfg: &AppConfig, exchange: MockExchange) -> (Engine, Arc<MockExchange>, Database) {
    let exchange = Arc::new(exchange);
    let db = Database::in_memory().await.unwrap();
    let shared: Arc<dyn ExchangeApi> = exchange.clone();
    let trader = AutoTrader::new(shared, db.clone(), cfg.trader.clone());
    let engine = Engine::new(trader, strategy::build(cfg.trader.strategy));
    (engine, exchange, db)
}

async fn set_benchmark(db: &Database, from: &str, to: &str, ratio: f64) {
    let pair = db.get_pair(from, to).await.unwrap().unwrap();
    db.set_ratio(pair.id, ratio).await.unwrap();
}

// ---------------------------------------------------------------------------
// Multiple coins strategy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_direct_jump_reconciles_target_pairs() {
    let cfg = config(&["A", "B"], "multiple_coins", "scout_multiplier = 1.0");
    let exchange = MockExchange::new(
        &[("AUSDT", 10.0), ("BUSDT", 20.0), ("AB", 0.5)],
        &[("A", 10.0)],
        0.001,
    );
    let (engine, exchange, db) = setup(&cfg, exchange).await;

    assert_ok!(engine.initialize().await);
    assert_eq!(db.get_ratio("A", "B").await.unwrap(), Some(0.5));
    set_benchmark(&db, "A", "B", 0.45).await;

    let report = engine.run_pass().await.unwrap();
    assert_eq!(
        report,
        PassReport::Settled {
            from: "A".into(),
            to: "B".into(),
            route: TradeRoute::DirectSell,
            bridge_price: Some(20.0),
        }
    );

    let orders = exchange.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].side, TradeSide::Sell);
    assert_eq!(orders[0].symbol, "AB");
    assert_eq!(exchange.balance("A"), 0.0);
    assert!((exchange.balance("B") - 4.995).abs() < 1e-9);

    // Every pair into B re-anchored to B's bridge price.
    assert_eq!(db.get_ratio("A", "B").await.unwrap(), Some(0.5));
    assert_eq!(db.get_ratio("USDT", "B").await.unwrap(), Some(0.05));
    // Nothing else moved.
    assert_eq!(db.get_ratio("B", "A").await.unwrap(), Some(2.0));
    assert_eq!(db.get_ratio("A", "USDT").await.unwrap(), Some(10.0));

    let scouts = db.recent_scouts(100).await.unwrap();
    let jump = scouts.iter().find(|s| s.from_coin == "A" && s.to_coin == "B").unwrap();
    assert!((jump.score - 0.0495).abs() < 1e-9);

    let trades = db.recent_trades(10).await.unwrap();
    assert_eq!(trades.len(), 1);
    assert!(trades[0].settled);
    assert_eq!(trades[0].route, "direct_sell");

    let values = db.recent_values(10).await.unwrap();
    assert!(values.iter().any(|v| v.coin == "B"));
}

#[tokio::test]
async fn test_holds_when_nothing_beats_fees() {
    let cfg = config(&["A", "B"], "multiple_coins", "");
    let exchange = MockExchange::new(
        &[("AUSDT", 10.0), ("BUSDT", 20.0), ("AB", 0.5)],
        &[("A", 10.0)],
        0.001,
    );
    let (engine, exchange, db) = setup(&cfg, exchange).await;
    assert_ok!(engine.initialize().await);

    // Prices equal the seeded benchmarks: every score is minus the fee term.
    assert_eq!(engine.run_pass().await.unwrap(), PassReport::Hold);
    assert_eq!(engine.run_pass().await.unwrap(), PassReport::Hold);
    assert!(exchange.orders().is_empty());
    assert!(db.recent_trades(10).await.unwrap().is_empty());
    assert!(!db.recent_scouts(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_first_leg_failure_changes_nothing() {
    let cfg = config(&["A", "C"], "multiple_coins", "scout_multiplier = 1.0");
    let exchange = MockExchange::new(&[("AUSDT", 10.0), ("CUSDT", 5.0)], &[("A", 10.0)], 0.001);
    let (engine, exchange, db) = setup(&cfg, exchange).await;
    assert_ok!(engine.initialize().await);
    set_benchmark(&db, "A", "C", 1.5).await;

    exchange.fail_market("AUSDT");
    let report = engine.run_pass().await.unwrap();
    match report {
        PassReport::Aborted { from, to, reason } => {
            assert_eq!((from.as_str(), to.as_str()), ("A", "C"));
            assert!(reason.contains("sell leg failed"));
        }
        other => panic!("unexpected report: {other:?}"),
    }

    assert_eq!(exchange.balance("A"), 10.0);
    assert!(exchange.orders().is_empty());
    assert_eq!(db.get_ratio("A", "C").await.unwrap(), Some(1.5));
    assert_eq!(db.get_ratio("USDT", "C").await.unwrap(), Some(0.2));

    let trades = db.recent_trades(10).await.unwrap();
    assert_eq!(trades.len(), 1);
    assert!(!trades[0].settled);
    assert_eq!(trades[0].route, "bridge_two_leg");
}

#[tokio::test]
async fn test_second_leg_failure_recovers_through_bridge_scout() {
    let cfg = config(&["A", "C"], "multiple_coins", "scout_multiplier = 1.0");
    let exchange = MockExchange::new(&[("AUSDT", 10.0), ("CUSDT", 5.0)], &[("A", 10.0)], 0.001);
    let (engine, exchange, db) = setup(&cfg, exchange).await;
    assert_ok!(engine.initialize().await);
    set_benchmark(&db, "A", "C", 1.5).await;

    exchange.fail_market("CUSDT");
    let report = engine.run_pass().await.unwrap();
    assert!(matches!(
        report,
        PassReport::Aborted { ref reason, .. } if reason.contains("buy leg failed")
    ));
    assert_eq!(exchange.balance("A"), 0.0);
    assert!((exchange.balance("USDT") - 99.9).abs() < 1e-9);
    // Failed trades never touch benchmarks.
    assert_eq!(db.get_ratio("USDT", "C").await.unwrap(), Some(0.2));

    // Next pass: A still scores positive into C so it is skipped, C has
    // nothing better than itself and gets bought with the idle bridge.
    exchange.clear_failures();
    let report = engine.run_pass().await.unwrap();
    assert_eq!(
        report,
        PassReport::Settled {
            from: "USDT".into(),
            to: "C".into(),
            route: TradeRoute::InverseBuy,
            bridge_price: Some(5.0),
        }
    );
    assert_eq!(exchange.balance("USDT"), 0.0);
    assert!(exchange.balance("C") > 19.9);
    assert_eq!(db.get_ratio("A", "C").await.unwrap(), Some(2.0));
}

#[tokio::test]
async fn test_snapshot_failure_fails_pass_without_side_effects() {
    let cfg = config(&["A", "B"], "multiple_coins", "");
    let exchange = MockExchange::new(&[("AUSDT", 10.0), ("BUSDT", 20.0)], &[("A", 10.0)], 0.001);
    let (engine, exchange, db) = setup(&cfg, exchange).await;
    assert_ok!(engine.initialize().await);

    exchange.set_error("exchange maintenance");
    let err = assert_err!(engine.run_pass().await);
    assert!(matches!(err, EngineError::SnapshotUnavailable { attempts: 2, .. }));
    assert!(db.recent_scouts(10).await.unwrap().is_empty());
    assert!(exchange.orders().is_empty());

    exchange.clear_error();
    assert_eq!(engine.run_pass().await.unwrap(), PassReport::Hold);
}

#[tokio::test]
async fn test_initialize_defers_unpriced_pairs() {
    let cfg = config(&["A", "B"], "multiple_coins", "");
    let exchange = MockExchange::new(&[("AUSDT", 10.0)], &[], 0.001);
    let (engine, exchange, db) = setup(&cfg, exchange).await;
    assert_ok!(engine.initialize().await);

    assert_eq!(db.get_ratio("A", "B").await.unwrap(), None);
    assert_eq!(db.get_ratio("A", "USDT").await.unwrap(), Some(10.0));

    // B lists later: the next pass fills only what is still unset.
    exchange.set_price("BUSDT", 40.0);
    assert_eq!(engine.run_pass().await.unwrap(), PassReport::Hold);
    assert_eq!(db.get_ratio("A", "B").await.unwrap(), Some(0.25));
    assert_eq!(db.get_ratio("A", "USDT").await.unwrap(), Some(10.0));
}

// ---------------------------------------------------------------------------
// Default strategy
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_default_strategy_buys_and_follows_current_coin() {
    let cfg = config(&["A", "B"], "default", "current_coin = \"A\"\nscout_multiplier = 1.0");
    let exchange = MockExchange::new(
        &[("AUSDT", 10.0), ("BUSDT", 20.0), ("AB", 0.5)],
        &[("USDT", 100.0)],
        0.001,
    );
    let (engine, exchange, db) = setup(&cfg, exchange).await;
    assert_eq!(engine.strategy_name(), "default");

    assert_ok!(engine.initialize().await);
    assert_eq!(db.get_current_coin().await.unwrap().as_deref(), Some("A"));
    assert!((exchange.balance("A") - 9.99).abs() < 1e-9);
    assert_eq!(exchange.balance("USDT"), 0.0);

    assert_eq!(engine.run_pass().await.unwrap(), PassReport::Hold);

    // A gains against B beyond the fee: jump.
    exchange.set_price("AB", 0.6);
    let report = engine.run_pass().await.unwrap();
    assert!(matches!(
        report,
        PassReport::Settled { ref to, route: TradeRoute::DirectSell, .. } if to == "B"
    ));
    assert_eq!(db.get_current_coin().await.unwrap().as_deref(), Some("B"));
    assert_eq!(exchange.balance("A"), 0.0);

    // A restart resumes the stored coin instead of buying again.
    let orders_before = exchange.orders().len();
    assert_ok!(engine.initialize().await);
    assert_eq!(exchange.orders().len(), orders_before);
    assert_eq!(db.get_current_coin().await.unwrap().as_deref(), Some("B"));
}

#[tokio::test]
async fn test_default_strategy_reenters_from_bridge_after_failed_leg() {
    let cfg = config(&["A", "C"], "default", "current_coin = \"A\"\nscout_multiplier = 1.0");
    let exchange = MockExchange::new(&[("AUSDT", 10.0), ("CUSDT", 5.0)], &[("A", 10.0)], 0.001);
    let (engine, exchange, db) = setup(&cfg, exchange).await;
    assert_ok!(engine.initialize().await);
    assert!(exchange.orders().is_empty());
    set_benchmark(&db, "A", "C", 1.5).await;

    // Sell leg fills, buy leg is rejected: the account ends up in the bridge.
    exchange.fail_market("CUSDT");
    let report = engine.run_pass().await.unwrap();
    assert!(matches!(
        report,
        PassReport::Aborted { ref reason, .. } if reason.contains("buy leg failed")
    ));
    assert_eq!(exchange.balance("A"), 0.0);
    assert_eq!(db.get_current_coin().await.unwrap().as_deref(), Some("A"));

    // The drained current coin is not scouted; idle bridge buys C instead.
    exchange.clear_failures();
    let report = engine.run_pass().await.unwrap();
    assert_eq!(
        report,
        PassReport::Settled {
            from: "USDT".into(),
            to: "C".into(),
            route: TradeRoute::InverseBuy,
            bridge_price: Some(5.0),
        }
    );
    assert_eq!(db.get_current_coin().await.unwrap().as_deref(), Some("C"));
    assert_eq!(exchange.balance("USDT"), 0.0);
    assert_eq!(db.get_ratio("A", "C").await.unwrap(), Some(2.0));

    assert_eq!(engine.run_pass().await.unwrap(), PassReport::Hold);
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_lowercase_config_symbols_still_trade() {
    let cfg = AppConfig::parse(
        r#"
        [trader]
        bridge = "usdt"
        supported_coins = ["a", "b"]
        snapshot_retry_backoff_ms = 1
        "#,
    )
    .unwrap();
    let exchange =
        MockExchange::new(&[("AUSDT", 10.0), ("BUSDT", 20.0)], &[("USDT", 100.0)], 0.001);
    let (engine, _exchange, db) = setup(&cfg, exchange).await;
    assert_ok!(engine.initialize().await);

    assert_eq!(db.get_ratio("A", "B").await.unwrap(), Some(0.5));
    assert_eq!(db.get_ratio("USDT", "A").await.unwrap(), Some(0.1));

    let report = engine.run_pass().await.unwrap();
    assert!(matches!(
        report,
        PassReport::Settled { ref from, ref to, .. } if from == "USDT" && to == "A"
    ));
}

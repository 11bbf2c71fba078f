//! BRIDGE SCOUT: fee-aware coin rotation through a bridge asset
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the store, wires the paper exchange over Binance market data and
//! runs one scouting pass per tick with graceful shutdown.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use bridge_scout::config::AppConfig;
use bridge_scout::dashboard::{self, DashboardState};
use bridge_scout::engine::trader::AutoTrader;
use bridge_scout::engine::{Engine, PassReport};
use bridge_scout::exchange::binance::BinanceClient;
use bridge_scout::exchange::paper::PaperExchange;
use bridge_scout::exchange::ExchangeApi;
use bridge_scout::storage::Database;
use bridge_scout::strategy;

const BANNER: &str = r#"
 ___      _    _               ___                 _
| _ )_ _ (_)__| |__ _ ___ ___ / __| __ ___ _  _ __| |_
| _ \ '_|| / _` / _` / -_)___|\__ \/ _/ _ \ || |  _|
|___/_|  |_\__,_\__, \___|    |___/\__\___/\_,_|\__|
                |___/
  Fee-aware coin rotation through a bridge asset
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = AppConfig::default_path();
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        config = %config_path,
        bridge = %cfg.trader.bridge,
        coins = cfg.trader.supported_coins.len(),
        strategy = ?cfg.trader.strategy,
        scout_multiplier = cfg.trader.scout_multiplier,
        scout_interval_secs = cfg.trader.scout_interval_secs,
        "Bridge scout starting up"
    );

    // -- Store -------------------------------------------------------------

    let db = Database::connect(&cfg.storage.database_url).await?;

    // -- Exchange ------------------------------------------------------------

    let feed = BinanceClient::new(&cfg.exchange.base_url)?;
    let paper = PaperExchange::new(feed, &cfg.exchange, &cfg.trader.fee_asset);
    if let Err(e) = paper.load_rules().await {
        warn!(
            error = %e,
            default_min_notional = cfg.exchange.default_min_notional,
            "Symbol rules unavailable, using default minimum notional"
        );
    }
    let exchange: Arc<dyn ExchangeApi> = Arc::new(paper);

    // -- Dashboard -----------------------------------------------------------

    if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(db.clone(), &cfg.trader.bridge));
        dashboard::spawn_dashboard(state, cfg.dashboard.port)
            .await
            .context("Dashboard failed to start")?;
    }

    // -- Engine --------------------------------------------------------------

    let trader = AutoTrader::new(exchange, db, cfg.trader.clone());
    let engine = Engine::new(trader, strategy::build(cfg.trader.strategy));

    if let Err(e) = engine.initialize().await {
        error!(error = %e, "Initialization failed, continuing with scouting");
    }

    run_loop(&engine, &cfg).await;

    info!("Bridge scout shut down");
    Ok(())
}

async fn run_loop(engine: &Engine, cfg: &AppConfig) {
    let mut scout_tick =
        tokio::time::interval(Duration::from_secs(cfg.trader.scout_interval_secs.max(1)));
    let mut value_tick =
        tokio::time::interval(Duration::from_secs(cfg.trader.value_log_interval_secs.max(1)));
    let mut passes: u64 = 0;

    loop {
        tokio::select! {
            _ = scout_tick.tick() => {
                passes += 1;
                match engine.run_pass().await {
                    Ok(PassReport::Hold) => {}
                    Ok(PassReport::Settled { from, to, route, bridge_price }) => {
                        info!(
                            pass = passes,
                            from = %from,
                            to = %to,
                            route = %route,
                            bridge_price = ?bridge_price,
                            "Pass settled a trade"
                        );
                    }
                    Ok(PassReport::Aborted { from, to, reason }) => {
                        warn!(
                            pass = passes,
                            from = %from,
                            to = %to,
                            reason = %reason,
                            "Pass aborted its trade"
                        );
                    }
                    Err(e) => {
                        error!(pass = passes, error = %e, "Scouting pass failed");
                    }
                }
            }
            _ = value_tick.tick() => {
                if let Err(e) = engine.record_values().await {
                    warn!(error = %e, "Value logging failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!(passes, "Shutdown signal received");
                break;
            }
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bridge_scout=info"));

    let json_logging = std::env::var("BRIDGE_SCOUT_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

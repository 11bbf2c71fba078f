//! Persistence layer.
//!
//! SQLite store (via `sqlx`) for the coin universe, benchmark pairs and
//! the append-only audit tables. Benchmark writes from one
//! initialization or reconciliation run are committed in a single
//! transaction so a concurrent reader never sees a half-updated table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

use crate::types::{Coin, Pair, ScoutRecord, TradeRecord, ValueRecord};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS coins (
        symbol TEXT PRIMARY KEY,
        enabled INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS pairs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_coin TEXT NOT NULL REFERENCES coins(symbol),
        to_coin TEXT NOT NULL REFERENCES coins(symbol),
        ratio REAL,
        UNIQUE (from_coin, to_coin)
    )",
    "CREATE TABLE IF NOT EXISTS scout_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        pair_id INTEGER NOT NULL REFERENCES pairs(id),
        target_ratio REAL NOT NULL,
        current_ratio REAL NOT NULL,
        coin_price REAL NOT NULL,
        other_coin_price REAL NOT NULL,
        score REAL NOT NULL,
        datetime TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS coin_value (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        coin TEXT NOT NULL REFERENCES coins(symbol),
        balance REAL NOT NULL,
        usd_price REAL,
        bridge_price REAL,
        usd_value TEXT,
        bridge_value TEXT,
        datetime TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS trade_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_coin TEXT NOT NULL,
        to_coin TEXT NOT NULL,
        route TEXT NOT NULL,
        settled INTEGER NOT NULL,
        price REAL,
        quantity REAL,
        reason TEXT,
        datetime TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS current_coin (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        coin TEXT NOT NULL REFERENCES coins(symbol),
        datetime TEXT NOT NULL
    )",
];

/// Handle to the SQLite store. Cheap to clone (shares the pool).
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if missing) the database at `url` and apply the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database url: {url}"))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database {url}"))?;

        let db = Self { pool };
        db.migrate().await?;
        info!(url, "Database ready");
        Ok(db)
    }

    /// Private in-memory database (single connection so every query sees it).
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to apply schema")?;
        }
        Ok(())
    }

    // -- Coin universe -------------------------------------------------------

    /// Make `symbols` the enabled coin set and create every missing pair
    /// between enabled coins (self-pairs excluded). Coins dropped from the
    /// list are disabled, not deleted, so their benchmarks survive.
    pub async fn sync_coins(&self, symbols: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin coin sync")?;

        sqlx::query("UPDATE coins SET enabled = 0")
            .execute(&mut *tx)
            .await
            .context("Failed to disable coins")?;

        for symbol in symbols {
            sqlx::query(
                "INSERT INTO coins (symbol, enabled) VALUES (?, 1)
                 ON CONFLICT(symbol) DO UPDATE SET enabled = 1",
            )
            .bind(symbol)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert coin {symbol}"))?;
        }

        let created = sqlx::query(
            "INSERT OR IGNORE INTO pairs (from_coin, to_coin)
             SELECT a.symbol, b.symbol FROM coins a, coins b
             WHERE a.enabled = 1 AND b.enabled = 1 AND a.symbol <> b.symbol",
        )
        .execute(&mut *tx)
        .await
        .context("Failed to create pairs")?
        .rows_affected();

        tx.commit().await.context("Failed to commit coin sync")?;
        info!(coins = symbols.len(), new_pairs = created, "Coin list synced");
        Ok(())
    }

    /// Enabled coins ordered by symbol.
    pub async fn get_coins(&self) -> Result<Vec<Coin>> {
        let rows =
            sqlx::query("SELECT symbol, enabled FROM coins WHERE enabled = 1 ORDER BY symbol")
                .fetch_all(&self.pool)
                .await
                .context("Failed to load coins")?;

        Ok(rows
            .iter()
            .map(|r| Coin {
                symbol: r.get("symbol"),
                enabled: r.get::<i64, _>("enabled") != 0,
            })
            .collect())
    }

    // -- Ratio store ---------------------------------------------------------

    pub async fn get_pair(&self, from: &str, to: &str) -> Result<Option<Pair>> {
        sqlx::query_as::<_, Pair>(
            "SELECT id, from_coin, to_coin, ratio FROM pairs WHERE from_coin = ? AND to_coin = ?",
        )
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to load pair {from}->{to}"))
    }

    /// Benchmark of `from -> to`, `None` when unset or the pair is unknown.
    pub async fn get_ratio(&self, from: &str, to: &str) -> Result<Option<f64>> {
        Ok(self.get_pair(from, to).await?.and_then(|p| p.ratio))
    }

    /// Set a single benchmark.
    pub async fn set_ratio(&self, pair_id: i64, ratio: f64) -> Result<()> {
        self.set_ratios(&[(pair_id, ratio)]).await
    }

    /// Set several benchmarks atomically: all rows commit or none do.
    pub async fn set_ratios(&self, updates: &[(i64, f64)]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.context("Failed to begin ratio update")?;
        for (pair_id, ratio) in updates {
            sqlx::query("UPDATE pairs SET ratio = ? WHERE id = ?")
                .bind(ratio)
                .bind(pair_id)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Failed to update ratio of pair {pair_id}"))?;
        }
        tx.commit().await.context("Failed to commit ratio update")?;

        debug!(count = updates.len(), "Benchmarks committed");
        Ok(())
    }

    /// Pairs leaving `coin` whose destination is enabled.
    pub async fn get_pairs_from(&self, coin: &str) -> Result<Vec<Pair>> {
        sqlx::query_as::<_, Pair>(
            "SELECT p.id, p.from_coin, p.to_coin, p.ratio FROM pairs p
             JOIN coins c ON c.symbol = p.to_coin
             WHERE p.from_coin = ? AND c.enabled = 1
             ORDER BY p.to_coin",
        )
        .bind(coin)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to load pairs from {coin}"))
    }

    /// Every pair arriving at `coin`.
    pub async fn get_pairs_to(&self, coin: &str) -> Result<Vec<Pair>> {
        sqlx::query_as::<_, Pair>(
            "SELECT id, from_coin, to_coin, ratio FROM pairs WHERE to_coin = ? ORDER BY from_coin",
        )
        .bind(coin)
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to load pairs to {coin}"))
    }

    /// Pairs with no benchmark yet whose endpoints are both enabled.
    pub async fn get_unset_pairs(&self) -> Result<Vec<Pair>> {
        sqlx::query_as::<_, Pair>(
            "SELECT p.id, p.from_coin, p.to_coin, p.ratio FROM pairs p
             JOIN coins f ON f.symbol = p.from_coin
             JOIN coins t ON t.symbol = p.to_coin
             WHERE p.ratio IS NULL AND f.enabled = 1 AND t.enabled = 1
             ORDER BY p.id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load unset pairs")
    }

    pub async fn get_all_pairs(&self) -> Result<Vec<Pair>> {
        sqlx::query_as::<_, Pair>("SELECT id, from_coin, to_coin, ratio FROM pairs ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to load pairs")
    }

    // -- Current coin --------------------------------------------------------

    pub async fn set_current_coin(&self, coin: &str) -> Result<()> {
        sqlx::query("INSERT INTO current_coin (coin, datetime) VALUES (?, ?)")
            .bind(coin)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to set current coin {coin}"))?;
        Ok(())
    }

    pub async fn get_current_coin(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT coin FROM current_coin ORDER BY id DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load current coin")?;
        Ok(row.map(|r| r.get("coin")))
    }

    // -- Audit sink ----------------------------------------------------------

    /// Append a batch of scout records in one transaction.
    pub async fn log_scouts(&self, records: &[ScoutRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.context("Failed to begin scout log")?;
        for r in records {
            sqlx::query(
                "INSERT INTO scout_history
                 (pair_id, target_ratio, current_ratio, coin_price, other_coin_price, score,
                  datetime)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(r.pair_id)
            .bind(r.target_ratio)
            .bind(r.current_ratio)
            .bind(r.coin_price)
            .bind(r.other_coin_price)
            .bind(r.score)
            .bind(r.datetime.to_rfc3339())
            .execute(&mut *tx)
            .await
            .context("Failed to insert scout record")?;
        }
        tx.commit().await.context("Failed to commit scout log")?;
        Ok(())
    }

    /// Most recent scout records, newest first.
    pub async fn recent_scouts(&self, limit: i64) -> Result<Vec<ScoutRecord>> {
        let rows = sqlx::query(
            "SELECT s.pair_id, p.from_coin, p.to_coin, s.target_ratio, s.current_ratio,
                    s.coin_price, s.other_coin_price, s.score, s.datetime
             FROM scout_history s JOIN pairs p ON p.id = s.pair_id
             ORDER BY s.id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load scout history")?;

        rows.iter()
            .map(|r| {
                Ok(ScoutRecord {
                    pair_id: r.get("pair_id"),
                    from_coin: r.get("from_coin"),
                    to_coin: r.get("to_coin"),
                    target_ratio: r.get("target_ratio"),
                    current_ratio: r.get("current_ratio"),
                    coin_price: r.get("coin_price"),
                    other_coin_price: r.get("other_coin_price"),
                    score: r.get("score"),
                    datetime: parse_datetime(r.get("datetime"))?,
                })
            })
            .collect()
    }

    pub async fn log_values(&self, records: &[ValueRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.context("Failed to begin value log")?;
        for r in records {
            sqlx::query(
                "INSERT INTO coin_value
                 (coin, balance, usd_price, bridge_price, usd_value, bridge_value, datetime)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&r.coin)
            .bind(r.balance)
            .bind(r.usd_price)
            .bind(r.bridge_price)
            .bind(r.usd_value.map(|v| v.to_string()))
            .bind(r.bridge_value.map(|v| v.to_string()))
            .bind(r.datetime.to_rfc3339())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to insert value record for {}", r.coin))?;
        }
        tx.commit().await.context("Failed to commit value log")?;
        Ok(())
    }

    pub async fn recent_values(&self, limit: i64) -> Result<Vec<ValueRecord>> {
        let rows = sqlx::query(
            "SELECT coin, balance, usd_price, bridge_price, usd_value, bridge_value, datetime
             FROM coin_value ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load value history")?;

        rows.iter()
            .map(|r| {
                let usd_value: Option<String> = r.get("usd_value");
                let bridge_value: Option<String> = r.get("bridge_value");
                Ok(ValueRecord {
                    coin: r.get("coin"),
                    balance: r.get("balance"),
                    usd_price: r.get("usd_price"),
                    bridge_price: r.get("bridge_price"),
                    usd_value: usd_value.as_deref().and_then(|v| Decimal::from_str(v).ok()),
                    bridge_value: bridge_value.as_deref().and_then(|v| Decimal::from_str(v).ok()),
                    datetime: parse_datetime(r.get("datetime"))?,
                })
            })
            .collect()
    }

    pub async fn log_trade(&self, record: &TradeRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO trade_history
             (from_coin, to_coin, route, settled, price, quantity, reason, datetime)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.from_coin)
        .bind(&record.to_coin)
        .bind(&record.route)
        .bind(record.settled)
        .bind(record.price)
        .bind(record.quantity)
        .bind(&record.reason)
        .bind(record.datetime.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to insert trade record")?;
        Ok(())
    }

    pub async fn recent_trades(&self, limit: i64) -> Result<Vec<TradeRecord>> {
        let rows = sqlx::query(
            "SELECT from_coin, to_coin, route, settled, price, quantity, reason, datetime
             FROM trade_history ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load trade history")?;

        rows.iter()
            .map(|r| {
                Ok(TradeRecord {
                    from_coin: r.get("from_coin"),
                    to_coin: r.get("to_coin"),
                    route: r.get("route"),
                    settled: r.get::<i64, _>("settled") != 0,
                    price: r.get("price"),
                    quantity: r.get("quantity"),
                    reason: r.get("reason"),
                    datetime: parse_datetime(r.get("datetime"))?,
                })
            })
            .collect()
    }
}

fn parse_datetime(raw: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Invalid stored timestamp: {raw}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Dashboard API route handlers.
//!
//! All endpoints return JSON read straight from the store. State is shared
//! via `Arc<DashboardState>`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::storage::Database;
use crate::types::{Coin, Pair, ScoutRecord, TradeRecord, ValueRecord};

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct DashboardState {
    pub db: Database,
    pub bridge: String,
}

impl DashboardState {
    pub fn new(db: Database, bridge: &str) -> Self {
        Self {
            db,
            bridge: bridge.to_string(),
        }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

impl LimitParams {
    fn resolved(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentCoinResponse {
    pub coin: Option<String>,
    pub bridge: String,
}

type ApiResult<T> = Result<Json<T>, StatusCode>;

fn store_error(e: anyhow::Error) -> StatusCode {
    warn!(error = %e, "Dashboard query failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/coins
pub async fn get_coins(State(state): State<AppState>) -> ApiResult<Vec<Coin>> {
    state.db.get_coins().await.map(Json).map_err(store_error)
}

/// GET /api/pairs
pub async fn get_pairs(State(state): State<AppState>) -> ApiResult<Vec<Pair>> {
    state.db.get_all_pairs().await.map(Json).map_err(store_error)
}

/// GET /api/current-coin
pub async fn get_current_coin(State(state): State<AppState>) -> ApiResult<CurrentCoinResponse> {
    let coin = state.db.get_current_coin().await.map_err(store_error)?;
    Ok(Json(CurrentCoinResponse {
        coin,
        bridge: state.bridge.clone(),
    }))
}

/// GET /api/scouts?limit=
pub async fn get_scouts(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Vec<ScoutRecord>> {
    state.db.recent_scouts(params.resolved()).await.map(Json).map_err(store_error)
}

/// GET /api/trades?limit=
pub async fn get_trades(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Vec<TradeRecord>> {
    state.db.recent_trades(params.resolved()).await.map(Json).map_err(store_error)
}

/// GET /api/values?limit=
pub async fn get_values(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> ApiResult<Vec<ValueRecord>> {
    state.db.recent_values(params.resolved()).await.map(Json).map_err(store_error)
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

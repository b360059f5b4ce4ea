//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::{FeedStats, LiveFeedEngine};
use crate::simulator::{SimulationParams, SimulationResult, WhatIfSimulator};
use crate::types::{FeedError, FeedFilter, Transaction};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub engine: LiveFeedEngine,
    pub simulator: WhatIfSimulator,
}

impl DashboardState {
    pub fn new(engine: LiveFeedEngine, simulator: WhatIfSimulator) -> Self {
        Self { engine, simulator }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedResponse {
    pub revision: u64,
    pub filter: FeedFilter,
    pub paused: bool,
    pub count: usize,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: FeedStats,
    pub running: bool,
    pub paused: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlResponse {
    pub running: bool,
    pub paused: bool,
}

type ApiError = (StatusCode, String);

fn bad_request(err: FeedError) -> ApiError {
    (StatusCode::BAD_REQUEST, err.to_string())
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/feed?filter=all|pending|success|failed
pub async fn get_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<FeedResponse>, ApiError> {
    let filter = match query.filter.as_deref() {
        Some(raw) => raw.parse::<FeedFilter>().map_err(bad_request)?,
        None => FeedFilter::All,
    };

    let snapshot = state.engine.latest();
    let transactions = snapshot.filtered(filter);
    Ok(Json(FeedResponse {
        revision: snapshot.revision,
        filter,
        paused: snapshot.paused,
        count: transactions.len(),
        transactions,
    }))
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let snapshot = state.engine.latest();
    Json(StatsResponse {
        stats: snapshot.stats(),
        running: snapshot.running,
        paused: snapshot.paused,
    })
}

/// POST /api/pause
pub async fn pause(State(state): State<AppState>) -> Json<ControlResponse> {
    state.engine.pause();
    Json(control_state(&state.engine))
}

/// POST /api/resume
pub async fn resume(State(state): State<AppState>) -> Json<ControlResponse> {
    state.engine.resume();
    Json(control_state(&state.engine))
}

fn control_state(engine: &LiveFeedEngine) -> ControlResponse {
    let snapshot = engine.latest();
    ControlResponse {
        running: snapshot.running,
        paused: snapshot.paused,
    }
}

/// POST /api/simulate
pub async fn simulate(
    State(state): State<AppState>,
    Json(params): Json<SimulationParams>,
) -> Result<Json<SimulationResult>, ApiError> {
    let result = state
        .simulator
        .simulate(&params, &mut rand::thread_rng())
        .map_err(bad_request)?;
    Ok(Json(result))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

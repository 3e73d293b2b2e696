//! HTTP routes for the market bridge.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::data::{
    CompanyProfile, EconomicEvent, HistoryBar, MarketIndex, NewsItem, SectorPerformance,
    SnapshotQuote,
};
use crate::error::BridgeError;
use crate::symbol::Region;
use crate::BridgeState;

/// Service name reported by `/` and `/health`.
pub const SERVICE_NAME: &str = "market_bridge";

/// Build the application router.
pub fn build_router(state: Arc<BridgeState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        // Quotes and history
        .route("/history", get(history))
        .route("/snapshot", get(snapshot))
        .route("/markets", get(markets))
        .route("/sectors", get(sectors))
        // Companies
        .route("/info/:symbol", get(info))
        .route("/screener", get(screener))
        // Feeds
        .route("/news", get(news))
        .route("/events", get(events))
        .with_state(state)
}

// ============ Liveness ============

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "server": SERVICE_NAME
    }))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// ============ Quotes and History ============

fn default_period() -> String {
    "5y".into()
}

fn default_interval() -> String {
    "1d".into()
}

fn default_region() -> String {
    "US".into()
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default = "default_period")]
    period: String,
    #[serde(default = "default_interval")]
    interval: String,
}

async fn history(
    State(state): State<Arc<BridgeState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryBar>>, BridgeError> {
    let symbol = query.symbol.unwrap_or_default();
    let bars = state
        .router
        .history(&symbol, &query.period, &query.interval)
        .await?;
    Ok(Json(bars))
}

async fn snapshot(
    State(state): State<Arc<BridgeState>>,
) -> Result<Json<Vec<SnapshotQuote>>, BridgeError> {
    Ok(Json(state.router.snapshot().await?))
}

#[derive(Debug, Deserialize)]
struct RegionQuery {
    #[serde(default = "default_region")]
    region: String,
}

async fn markets(
    State(state): State<Arc<BridgeState>>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<Vec<MarketIndex>>, BridgeError> {
    let region = Region::parse(&query.region);
    let items = state.router.markets(&region).await.into_result("markets")?;
    Ok(Json(items))
}

async fn sectors(
    State(state): State<Arc<BridgeState>>,
    Query(query): Query<RegionQuery>,
) -> Result<Json<Vec<SectorPerformance>>, BridgeError> {
    let region = Region::parse(&query.region);
    let items = state.router.sectors(&region).await.into_result("sectors")?;
    Ok(Json(items))
}

// ============ Companies ============

async fn info(
    State(state): State<Arc<BridgeState>>,
    Path(symbol): Path<String>,
) -> Result<Json<CompanyProfile>, BridgeError> {
    Ok(Json(state.router.info(&symbol).await?))
}

#[derive(Debug, Deserialize)]
struct ScreenerParams {
    #[serde(default)]
    sector: String,
    #[serde(default = "default_region")]
    region: String,
}

async fn screener(
    State(state): State<Arc<BridgeState>>,
    Query(query): Query<ScreenerParams>,
) -> Result<Json<Vec<CompanyProfile>>, BridgeError> {
    let region = Region::parse(&query.region);
    Ok(Json(state.router.screener(&query.sector, &region).await?))
}

// ============ Feeds ============

#[derive(Debug, Deserialize)]
struct NewsQuery {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    region: Option<String>,
}

async fn news(
    State(state): State<Arc<BridgeState>>,
    Query(query): Query<NewsQuery>,
) -> Result<Json<Vec<NewsItem>>, BridgeError> {
    let region = Region::parse(query.region.as_deref().unwrap_or("us"));
    let items = state
        .router
        .news(query.symbol.as_deref(), &region)
        .await
        .into_result("news")?;
    Ok(Json(items))
}

#[derive(Debug, Deserialize)]
struct EventsQuery {
    #[serde(default)]
    impact: Option<String>,
}

async fn events(
    State(state): State<Arc<BridgeState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<EconomicEvent>>, BridgeError> {
    let items = state
        .router
        .events(query.impact.as_deref())
        .await
        .into_result("events")?;
    Ok(Json(items))
}

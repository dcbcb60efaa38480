use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::alphavantage::AlphaVantageClient;
use crate::error::AppError;
use crate::refresh::RefreshOrchestrator;

/// The orchestrator as wired in production, over the real Alpha Vantage
/// client.
pub type LiveOrchestrator = RefreshOrchestrator<AlphaVantageClient>;

#[derive(Clone)]
pub struct ApiContext {
    pub orchestrator: Arc<LiveOrchestrator>,
    pub default_history_limit: usize,
}

/// Thin HTTP transport over the orchestrator's read and trigger operations.
pub fn router(ctx: ApiContext) -> Router {
    Router::new()
        .route("/api/stocks", get(get_stocks))
        .route("/api/stocks/{symbol}", get(get_stock))
        .route("/api/stocks/{symbol}/history", get(get_history))
        .route("/api/stocks/{symbol}/analytics", get(get_analytics))
        .route("/api/stocks/{symbol}/refresh", post(post_refresh_one))
        .route("/api/datasource", get(get_data_source))
        .route("/api/stats", get(get_stats))
        .route("/api/refresh-all", post(post_refresh_all))
        .with_state(ctx)
}

type ApiResult = Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)>;

fn ok(body: Value) -> ApiResult {
    Ok((StatusCode::OK, Json(body)))
}

fn not_found(symbol: &str) -> ApiResult {
    Err((
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("unknown symbol: {}", symbol) })),
    ))
}

fn internal(err: AppError) -> (StatusCode, Json<Value>) {
    tracing::error!(%err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": err.to_string() })),
    )
}

async fn get_stocks(State(ctx): State<ApiContext>) -> ApiResult {
    ok(json!(ctx.orchestrator.snapshots()))
}

async fn get_stock(State(ctx): State<ApiContext>, Path(symbol): Path<String>) -> ApiResult {
    match ctx.orchestrator.snapshot(&symbol) {
        Some(snapshot) => ok(json!(snapshot)),
        None => not_found(&symbol),
    }
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn get_history(
    State(ctx): State<ApiContext>,
    Path(symbol): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult {
    let limit = query.limit.unwrap_or(ctx.default_history_limit);
    let records = ctx
        .orchestrator
        .history(&symbol, limit)
        .map_err(internal)?;
    ok(json!(records))
}

async fn get_analytics(State(ctx): State<ApiContext>, Path(symbol): Path<String>) -> ApiResult {
    match ctx.orchestrator.analytics(&symbol).map_err(internal)? {
        Some(analytics) => ok(json!(analytics)),
        None => not_found(&symbol),
    }
}

async fn get_data_source(State(ctx): State<ApiContext>) -> ApiResult {
    ok(json!(ctx.orchestrator.data_source_info()))
}

async fn get_stats(State(ctx): State<ApiContext>) -> ApiResult {
    let stats = ctx.orchestrator.storage_stats().map_err(internal)?;
    ok(json!(stats))
}

/// Fire-and-continue: the refresh task is spawned and the response returns
/// without waiting for it.
async fn post_refresh_one(State(ctx): State<ApiContext>, Path(symbol): Path<String>) -> ApiResult {
    let symbol = symbol.trim().to_ascii_uppercase();
    if !ctx.orchestrator.universe().contains(&symbol) {
        return not_found(&symbol);
    }
    let _handle = ctx.orchestrator.spawn_refresh_one(symbol.clone());
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "symbol": symbol, "status": "refresh scheduled" })),
    ))
}

async fn post_refresh_all(State(ctx): State<ApiContext>) -> ApiResult {
    match ctx.orchestrator.refresh_all_real().await {
        Ok(outcome) => ok(json!(outcome)),
        Err(err @ AppError::RealDataUnavailable(_)) => Err((
            StatusCode::CONFLICT,
            Json(json!({ "error": err.to_string() })),
        )),
        Err(err) => Err(internal(err)),
    }
}

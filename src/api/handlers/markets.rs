use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::{AppError, EngineError};
use crate::models::{MarketBook, Trade};
use crate::AppState;

use super::{clamp_limit, ApiResponse};

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
}

/// GET /api/markets: every market with its outcomes and probabilities.
pub async fn list(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<MarketBook>>>, AppError> {
    let books = state
        .exchange
        .store()
        .list_markets()
        .await
        .map_err(EngineError::from)?;
    Ok(ApiResponse::ok(books))
}

/// GET /api/markets/:id
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<MarketBook>>, AppError> {
    let book = state.exchange.market(id).await?;
    Ok(ApiResponse::ok(book))
}

/// GET /api/markets/:id/trades: recent fills, newest first, for price charts.
pub async fn trades(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<ApiResponse<Vec<Trade>>>, AppError> {
    // 404 for unknown markets rather than an empty list.
    state.exchange.market(id).await?;

    let trades = state
        .exchange
        .store()
        .trades_for_market(id, clamp_limit(params.limit))
        .await
        .map_err(EngineError::from)?;
    Ok(ApiResponse::ok(trades))
}

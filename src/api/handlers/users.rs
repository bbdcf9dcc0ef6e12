use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::{AppError, EngineError};
use crate::models::{LedgerEntry, Position, Trade};
use crate::AppState;

use super::markets::HistoryParams;
use super::{clamp_limit, ApiResponse};

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: Uuid,
    pub balance: i64,
}

pub async fn balance(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<BalanceResponse>>, AppError> {
    let balance = state
        .exchange
        .store()
        .balance(user_id)
        .await
        .map_err(EngineError::from)?;
    Ok(ApiResponse::ok(BalanceResponse { user_id, balance }))
}

pub async fn positions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<Position>>>, AppError> {
    let positions = state
        .exchange
        .store()
        .positions_for_user(user_id)
        .await
        .map_err(EngineError::from)?;
    Ok(ApiResponse::ok(positions))
}

pub async fn trades(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<ApiResponse<Vec<Trade>>>, AppError> {
    let trades = state
        .exchange
        .store()
        .trades_for_user(user_id, clamp_limit(params.limit))
        .await
        .map_err(EngineError::from)?;
    Ok(ApiResponse::ok(trades))
}

pub async fn ledger(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<LedgerEntry>>>, AppError> {
    let entries = state
        .exchange
        .store()
        .ledger_for_user(user_id)
        .await
        .map_err(EngineError::from)?;
    Ok(ApiResponse::ok(entries))
}

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{MarketBook, NewMarket};
use crate::services::resolution::ResolutionReport;
use crate::AppState;

use super::ApiResponse;

/// POST /api/admin/markets: create a market with its outcomes.
pub async fn create_market(
    State(state): State<AppState>,
    Json(body): Json<NewMarket>,
) -> Result<Json<ApiResponse<MarketBook>>, AppError> {
    let book = state.exchange.create_market(body).await?;
    Ok(ApiResponse::ok(book))
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub winning_option_id: Uuid,
}

/// POST /api/admin/markets/:id/resolve: freeze the market and pay winners.
pub async fn resolve(
    State(state): State<AppState>,
    Path(market_id): Path<Uuid>,
    Json(body): Json<ResolveRequest>,
) -> Result<Json<ApiResponse<ResolutionReport>>, AppError> {
    let report = state
        .exchange
        .resolve_market(market_id, body.winning_option_id)
        .await?;
    Ok(ApiResponse::ok(report))
}

/// POST /api/admin/markets/:id/payouts: finish payouts after a partial failure.
pub async fn payouts(
    State(state): State<AppState>,
    Path(market_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ResolutionReport>>, AppError> {
    let report = state.exchange.settle_payouts(market_id).await?;
    Ok(ApiResponse::ok(report))
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub amount: i64,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GrantResponse {
    pub user_id: Uuid,
    pub new_balance: i64,
}

/// POST /api/admin/users/:id/grant: credit a balance with a ledger entry.
pub async fn grant(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<GrantRequest>,
) -> Result<Json<ApiResponse<GrantResponse>>, AppError> {
    let new_balance = state.exchange.grant(user_id, body.amount, body.memo).await?;
    Ok(ApiResponse::ok(GrantResponse { user_id, new_balance }))
}

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::OptionProbability;
use crate::settlement::TradeRequest;
use crate::AppState;

use super::ApiResponse;

#[derive(Debug, Serialize)]
pub struct TradeResponse {
    pub trade_id: Uuid,
    pub new_balance: i64,
    pub realized_unit_price: f64,
    pub total: f64,
    pub amount_settled: i64,
    pub probabilities: Vec<OptionProbability>,
}

/// POST /api/trades: settle a buy or sell against the market maker.
pub async fn submit(
    State(state): State<AppState>,
    Json(req): Json<TradeRequest>,
) -> Result<Json<ApiResponse<TradeResponse>>, AppError> {
    let receipt = state.exchange.submit_trade(&req).await?;

    Ok(ApiResponse::ok(TradeResponse {
        trade_id: receipt.trade.id,
        new_balance: receipt.new_balance,
        realized_unit_price: receipt.trade.unit_price,
        total: receipt.trade.total,
        amount_settled: receipt.trade.amount_settled,
        probabilities: receipt.probabilities,
    }))
}

use axum::extract::State;
use axum::Json;

use crate::errors::AppError;
use crate::exchange::{QuoteRequest, QuoteResponse};
use crate::AppState;

use super::ApiResponse;

/// POST /api/quotes: price a hypothetical trade. Read-only.
pub async fn quote(
    State(state): State<AppState>,
    Json(req): Json<QuoteRequest>,
) -> Result<Json<ApiResponse<QuoteResponse>>, AppError> {
    let quote = state.exchange.quote(&req).await?;
    Ok(ApiResponse::ok(quote))
}

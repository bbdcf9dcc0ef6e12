pub mod admin;
pub mod health;
pub mod markets;
pub mod quotes;
pub mod trades;
pub mod users;
pub mod ws;

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

/// Default page size for trade history endpoints.
pub const DEFAULT_TRADE_LIMIT: i64 = 100;
/// Largest page a client may request.
pub const MAX_TRADE_LIMIT: i64 = 1_000;

pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_TRADE_LIMIT).clamp(1, MAX_TRADE_LIMIT)
}

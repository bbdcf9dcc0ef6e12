use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::db::StoreError;
use crate::pricing::QuoteError;

/// Everything the exchange core can reject a request with.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("share quantity must be a positive finite number, got {0}")]
    InvalidQuantity(f64),

    #[error("client price must be a positive finite number, got {0}")]
    InvalidPrice(f64),

    #[error("liquidity parameter must be positive, got {0}")]
    InvalidLiquidity(f64),

    #[error("invalid market: {0}")]
    InvalidMarket(String),

    #[error("market {0} not found")]
    MarketNotFound(Uuid),

    #[error("option {option_id} does not belong to market {market_id}")]
    UnknownOption { market_id: Uuid, option_id: Uuid },

    #[error("market {0} is closed for trading")]
    MarketClosed(Uuid),

    #[error("price changed: quoted {quoted}, current {current}")]
    PriceChanged { quoted: f64, current: f64 },

    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("insufficient shares: requested {requested}, held {held}")]
    InsufficientShares { requested: f64, held: f64 },

    #[error("balance of user {0} would overflow")]
    BalanceOverflow(Uuid),

    #[error("market {0} is already resolved")]
    AlreadyResolved(Uuid),

    #[error("market {0} is not resolved")]
    NotResolved(Uuid),

    #[error("market {0} is busy, retry later")]
    Busy(Uuid),

    #[error("market {0} changed concurrently, re-quote and retry")]
    Conflict(Uuid),

    #[error("persistence failure: {0}")]
    Persistence(#[source] anyhow::Error),
}

impl EngineError {
    /// Whether resubmitting (after a fresh quote) can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Busy(_) | EngineError::Conflict(_) | EngineError::PriceChanged { .. }
        )
    }

    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            EngineError::InvalidQuantity(_) => "invalid_quantity",
            EngineError::InvalidPrice(_) => "invalid_price",
            EngineError::InvalidLiquidity(_) => "invalid_liquidity",
            EngineError::InvalidMarket(_) => "invalid_market",
            EngineError::MarketNotFound(_) => "market_not_found",
            EngineError::UnknownOption { .. } => "unknown_option",
            EngineError::MarketClosed(_) => "market_closed",
            EngineError::PriceChanged { .. } => "price_changed",
            EngineError::InsufficientFunds { .. } => "insufficient_funds",
            EngineError::InsufficientShares { .. } => "insufficient_shares",
            EngineError::BalanceOverflow(_) => "balance_overflow",
            EngineError::AlreadyResolved(_) => "already_resolved",
            EngineError::NotResolved(_) => "not_resolved",
            EngineError::Busy(_) => "busy",
            EngineError::Conflict(_) => "conflict",
            EngineError::Persistence(_) => "persistence",
        }
    }

    pub(crate) fn from_quote(e: QuoteError, market_id: Uuid, option_id: Uuid) -> Self {
        match e {
            QuoteError::InvalidQuantity(q) => EngineError::InvalidQuantity(q),
            QuoteError::UnknownOption { .. } => EngineError::UnknownOption { market_id, option_id },
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::MarketNotFound(id) => EngineError::MarketNotFound(id),
            StoreError::VersionConflict { market_id, .. } => EngineError::Conflict(market_id),
            StoreError::AlreadyResolved(id) => EngineError::AlreadyResolved(id),
            StoreError::InsufficientFunds { required, available } => {
                EngineError::InsufficientFunds { required, available }
            }
            StoreError::InsufficientShares { requested, held } => {
                EngineError::InsufficientShares { requested, held }
            }
            StoreError::BalanceOverflow(id) => EngineError::BalanceOverflow(id),
            StoreError::Backend(e) => EngineError::Persistence(e),
        }
    }
}

/// HTTP-facing error.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
    retryable: bool,
}

fn engine_status(e: &EngineError) -> StatusCode {
    match e {
        EngineError::InvalidQuantity(_)
        | EngineError::InvalidPrice(_)
        | EngineError::InvalidLiquidity(_)
        | EngineError::InvalidMarket(_)
        | EngineError::UnknownOption { .. } => StatusCode::BAD_REQUEST,
        EngineError::MarketNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::MarketClosed(_)
        | EngineError::PriceChanged { .. }
        | EngineError::AlreadyResolved(_)
        | EngineError::NotResolved(_)
        | EngineError::Conflict(_) => StatusCode::CONFLICT,
        EngineError::InsufficientFunds { .. }
        | EngineError::InsufficientShares { .. }
        | EngineError::BalanceOverflow(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, reason, retryable) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None, false),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None, false),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".into(), None, false),
            AppError::Engine(EngineError::Persistence(e)) => {
                tracing::error!("Persistence error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".into(),
                    Some("persistence"),
                    false,
                )
            }
            AppError::Engine(e) => (engine_status(e), e.to_string(), Some(e.reason()), e.is_retryable()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into(), None, false)
            }
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                error: message,
                reason,
                retryable,
            }),
        )
            .into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.into())
    }
}

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;
use super::auth::require_admin;
use super::handlers;

pub fn create_router(state: AppState) -> Router {
    // Public routes: quotes and reads need no authentication; trade
    // submissions carry the caller's user id from the upstream gateway.
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::health::metrics))
        // Markets
        .route("/api/markets", get(handlers::markets::list))
        .route("/api/markets/:id", get(handlers::markets::detail))
        .route("/api/markets/:id/trades", get(handlers::markets::trades))
        // Pricing + settlement
        .route("/api/quotes", post(handlers::quotes::quote))
        .route("/api/trades", post(handlers::trades::submit))
        // Users
        .route("/api/users/:id/balance", get(handlers::users::balance))
        .route("/api/users/:id/positions", get(handlers::users::positions))
        .route("/api/users/:id/trades", get(handlers::users::trades))
        .route("/api/users/:id/ledger", get(handlers::users::ledger))
        // WebSocket
        .route("/ws", get(handlers::ws::handler));

    // Admin routes require a Bearer token when ADMIN_TOKEN is set
    let admin = Router::new()
        .route("/api/admin/markets", post(handlers::admin::create_market))
        .route("/api/admin/markets/:id/resolve", post(handlers::admin::resolve))
        .route("/api/admin/markets/:id/payouts", post(handlers::admin::payouts))
        .route("/api/admin/users/:id/grant", post(handlers::admin::grant))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(admin)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

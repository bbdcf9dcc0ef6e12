use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::events::MarketEvent;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    /// Only forward events for this market.
    pub market_id: Option<Uuid>,
}

/// GET /ws: live feed of settled trades and resolutions.
pub async fn handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_events(socket, state, params.market_id))
}

fn wanted(event: &MarketEvent, filter: Option<Uuid>) -> bool {
    filter.map_or(true, |id| event.market_id() == id)
}

async fn stream_events(mut socket: WebSocket, state: AppState, filter: Option<Uuid>) {
    tracing::info!(market_id = ?filter, "Market feed client connected");

    let mut rx = state.exchange.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) if wanted(&event, filter) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to serialize MarketEvent");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Market feed client lagged");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Ping(data))) => {
                    if socket.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!(market_id = ?filter, "Market feed client disconnected");
}

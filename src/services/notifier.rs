use serde_json::json;
use tokio::sync::broadcast;

use crate::events::{MarketEvent, MarketResolved};

/// Telegram notification service. Failures are logged but never block the main flow.
#[derive(Debug, Clone)]
pub struct Notifier {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl Notifier {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            bot_token,
            chat_id,
        }
    }

    /// Send a Telegram message. Failures are logged as warnings.
    pub async fn send(&self, message: &str) {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.bot_token
        );

        let body = json!({
            "chat_id": self.chat_id,
            "text": message,
            "parse_mode": "Markdown",
        });

        match self.http.post(&url).json(&body).send().await {
            Ok(resp) => {
                if !resp.status().is_success() {
                    tracing::warn!(
                        status = %resp.status(),
                        "Telegram sendMessage returned non-2xx"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send Telegram notification");
            }
        }
    }
}

/// Forward market resolutions from the event bus to Telegram until the bus closes.
pub async fn run_event_notifier(mut rx: broadcast::Receiver<MarketEvent>, notifier: Notifier) {
    loop {
        match rx.recv().await {
            Ok(MarketEvent::MarketResolved(resolved)) => {
                notifier.send(&format_resolution(&resolved)).await;
            }
            Ok(MarketEvent::TradeSettled(_)) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "Notifier lagged behind the event bus");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    tracing::info!("Event notifier stopped");
}

/// Format a market resolution message with its payout summary.
pub fn format_resolution(resolved: &MarketResolved) -> String {
    let p = &resolved.payouts;
    let mut msg = format!(
        "*Market Resolved*\nQuestion: {}\nWinner: {}\nPaid: {} winners, {} units\nFailed payouts: {}\nMarket: `{}`",
        resolved.question, resolved.winning_label, p.winners_paid, p.total_paid, p.failed, resolved.market_id,
    );
    if p.incomplete {
        msg.push_str("\nPayouts incomplete, re-run required");
    }
    msg
}

use serde::Serialize;
use uuid::Uuid;

use crate::models::Trade;
use crate::services::resolution::ResolutionReport;

/// Events broadcast to activity feeds, charts and notifiers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum MarketEvent {
    #[serde(rename = "trade_settled")]
    TradeSettled(TradeSettled),

    #[serde(rename = "market_resolved")]
    MarketResolved(MarketResolved),
}

impl MarketEvent {
    pub fn market_id(&self) -> Uuid {
        match self {
            MarketEvent::TradeSettled(e) => e.trade.market_id,
            MarketEvent::MarketResolved(e) => e.market_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionProbability {
    pub option_id: Uuid,
    pub probability: f64,
}

impl OptionProbability {
    pub fn from_pairs(pairs: &[(Uuid, f64)]) -> Vec<Self> {
        pairs
            .iter()
            .map(|(option_id, probability)| OptionProbability {
                option_id: *option_id,
                probability: *probability,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeSettled {
    pub trade: Trade,
    pub probabilities: Vec<OptionProbability>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketResolved {
    pub market_id: Uuid,
    pub question: String,
    pub winning_option_id: Uuid,
    pub winning_label: String,
    pub payouts: ResolutionReport,
}

use serde::Serialize;
use thiserror::Error;

use crate::models::Side;

use super::cost::cost;
use super::probability::probabilities;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuoteError {
    #[error("share quantity must be a positive finite number, got {0}")]
    InvalidQuantity(f64),

    #[error("option index {index} out of range for {outcomes} outcomes")]
    UnknownOption { index: usize, outcomes: usize },
}

/// Result of pricing a hypothetical trade. Nothing is committed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub side: Side,
    pub option_index: usize,
    pub shares: f64,
    /// `total / shares`.
    pub unit_price: f64,
    /// Cost of a buy or payout of a sell, never negative.
    pub total: f64,
    /// Share vector after the trade.
    pub new_shares: Vec<f64>,
    /// Probability vector after the trade.
    pub probabilities: Vec<f64>,
}

/// Price a buy or sell of `delta` shares of outcome `index`.
///
/// Sells floor the outstanding quantity at zero, which caps the payout
/// instead of failing.
pub fn quote(
    side: Side,
    shares: &[f64],
    b: f64,
    index: usize,
    delta: f64,
) -> Result<Quote, QuoteError> {
    if !delta.is_finite() || delta <= 0.0 {
        return Err(QuoteError::InvalidQuantity(delta));
    }
    if index >= shares.len() {
        return Err(QuoteError::UnknownOption {
            index,
            outcomes: shares.len(),
        });
    }

    let before = cost(shares, b);
    let mut new_shares = shares.to_vec();

    let total = match side {
        Side::Buy => {
            new_shares[index] += delta;
            (cost(&new_shares, b) - before).max(0.0)
        }
        Side::Sell => {
            new_shares[index] = (new_shares[index] - delta).max(0.0);
            (before - cost(&new_shares, b)).max(0.0)
        }
    };

    let probabilities = probabilities(&new_shares, b);

    Ok(Quote {
        side,
        option_index: index,
        shares: delta,
        unit_price: total / delta,
        total,
        new_shares,
        probabilities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const B: f64 = 100.0;

    #[test]
    fn test_buy_at_even_market_costs_about_half_per_share() {
        let q = quote(Side::Buy, &[0.0, 0.0], B, 0, 1.0).unwrap();
        assert!(q.unit_price > 0.5 && q.unit_price < 0.51);
        assert_eq!(q.new_shares, vec![1.0, 0.0]);
        assert!(q.probabilities[0] > 0.5);
    }

    #[test]
    fn test_rejects_non_positive_quantity() {
        for delta in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = quote(Side::Buy, &[0.0, 0.0], B, 0, delta).unwrap_err();
            assert!(matches!(err, QuoteError::InvalidQuantity(_)));
        }
    }

    #[test]
    fn test_rejects_unknown_option() {
        let err = quote(Side::Sell, &[0.0, 0.0], B, 2, 1.0).unwrap_err();
        assert_eq!(err, QuoteError::UnknownOption { index: 2, outcomes: 2 });
    }

    #[test]
    fn test_cost_strictly_increasing_in_quantity() {
        let q = [30.0, 10.0, 0.0];
        let mut last = 0.0;
        for delta in [0.5, 1.0, 2.0, 10.0, 50.0, 500.0] {
            let total = quote(Side::Buy, &q, B, 1, delta).unwrap().total;
            assert!(total > last, "cost({delta}) = {total} not above {last}");
            last = total;
        }
    }

    #[test]
    fn test_splitting_a_buy_is_never_cheaper() {
        let start = [5.0, 0.0];
        let whole = quote(Side::Buy, &start, B, 0, 40.0).unwrap();

        let mut q = start.to_vec();
        let mut pieces = 0.0;
        for _ in 0..4 {
            let part = quote(Side::Buy, &q, B, 0, 10.0).unwrap();
            pieces += part.total;
            q = part.new_shares;
        }

        assert!(pieces >= whole.total - 1e-9);
        assert_eq!(q, whole.new_shares);
    }

    #[test]
    fn test_buy_then_sell_round_trip() {
        let start = vec![12.0, 40.0, 3.0];
        let buy = quote(Side::Buy, &start, B, 2, 25.0).unwrap();
        let sell = quote(Side::Sell, &buy.new_shares, B, 2, 25.0).unwrap();

        assert_eq!(sell.new_shares, start);
        assert!((buy.total - sell.total).abs() < 1e-9);

        let original = probabilities(&start, B);
        for (a, b) in sell.probabilities.iter().zip(&original) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_oversized_sell_is_floored_at_zero() {
        let q = quote(Side::Sell, &[5.0, 0.0], B, 0, 50.0).unwrap();
        assert_eq!(q.new_shares, vec![0.0, 0.0]);
        let capped = quote(Side::Sell, &[5.0, 0.0], B, 0, 5.0).unwrap();
        assert_eq!(q.total, capped.total);
        assert!(q.unit_price < capped.unit_price);
    }

    #[test]
    fn test_quote_is_deterministic() {
        let shares = [17.25, 3.5, 90.0, 0.0];
        let a = quote(Side::Buy, &shares, 42.0, 3, 7.75).unwrap();
        let b = quote(Side::Buy, &shares, 42.0, 3, 7.75).unwrap();
        assert_eq!(a.total.to_bits(), b.total.to_bits());
        assert_eq!(a, b);
    }
}

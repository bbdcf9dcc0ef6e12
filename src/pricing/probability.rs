use super::cost::{log_sum_exp, scaled};

/// Project the LMSR price of every outcome:
/// p_i = exp(q_i / b) / Σ_j exp(q_j / b)
///
/// Evaluated as `exp(q_i/b - lse)` so it shares the stabilized path with the
/// cost function.
pub fn probabilities(shares: &[f64], b: f64) -> Vec<f64> {
    let xs = scaled(shares, b);
    let lse = log_sum_exp(&xs);
    xs.iter().map(|x| (x - lse).exp()).collect()
}

/// Probability vector for a resolved market: 1.0 on the winner, 0.0 elsewhere.
pub fn collapsed(outcomes: usize, winner: usize) -> Vec<f64> {
    (0..outcomes)
        .map(|i| if i == winner { 1.0 } else { 0.0 })
        .collect()
}

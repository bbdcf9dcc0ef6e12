//! LMSR cost function.
//!
//! C(q) = b * ln(Σ exp(q_i / b))
//!
//! Every `exp`/`ln` the exchange performs goes through [`log_sum_exp`], which
//! subtracts `max_i(q_i / b)` before exponentiating so share vectors far from
//! zero never overflow.

/// Stable `ln(Σ exp(x_i))`.
///
/// Returns `f64::NEG_INFINITY` for an empty slice.
pub fn log_sum_exp(xs: &[f64]) -> f64 {
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }

    let sum: f64 = xs.iter().map(|x| (x - max).exp()).sum();
    max + sum.ln()
}

/// Scale a share vector by the liquidity parameter: `q_i / b`.
pub fn scaled(shares: &[f64], b: f64) -> Vec<f64> {
    shares.iter().map(|q| q / b).collect()
}

/// Evaluate C(q) for the share vector `shares` at liquidity `b`.
///
/// `b` is validated when the market is created; passing `b <= 0` here is a
/// programming error and yields a meaningless value rather than a panic.
pub fn cost(shares: &[f64], b: f64) -> f64 {
    debug_assert!(b > 0.0, "liquidity parameter must be positive");
    b * log_sum_exp(&scaled(shares, b))
}

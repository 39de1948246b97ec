/// # Idle uncertainty growth
///
/// A latent rating that is not observed for a while becomes less certain.
/// Every family that models this does it the same way: the variance grows
/// linearly with the number of elapsed rating periods,
///
/// `σ' = sqrt(σ² + growth · t)`
///
/// where `growth` is the per-period process variance (Glicko's `c²`,
/// Glicko-2's `σ²` volatility, TrueSkill's `τ²`, Polyrating's omega) and `t`
/// the number of periods since the last estimate. The result is optionally
/// capped, usually at the deviation of a brand new entity.
///
/// Inflation is applied lazily, when the rating is next read as a prior, so
/// stored snapshots are never rewritten.
pub fn inflate_deviation(deviation: f64, growth_variance: f64, elapsed_periods: usize, cap: Option<f64>) -> f64 {
    let inflated = inflate_variance(deviation * deviation, growth_variance, elapsed_periods).sqrt();

    match cap {
        Some(cap) => inflated.min(cap.max(deviation)),
        None => inflated
    }
}

pub fn inflate_variance(variance: f64, growth_variance: f64, elapsed_periods: usize) -> f64 {
    variance + growth_variance * elapsed_periods as f64
}

/// Number of periods between the period of the last estimate and `now`.
pub fn elapsed_periods(last_period: usize, now: usize) -> usize {
    now.saturating_sub(last_period)
}

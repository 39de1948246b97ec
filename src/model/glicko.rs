use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::f64::consts::{LN_10, PI};
use tracing::debug;

use crate::{
    database::db_structs::EntityId,
    error::{RatingError, Result},
    model::{
        constants::GLICKO_C,
        decay::{elapsed_periods, inflate_deviation},
        rating_system::{last_rating, PeriodInput, PeriodUpdate, RatingSystem},
        rating_tracker::{RatingSnapshot, RatingTracker}
    }
};

const Q: f64 = LN_10 / 400.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlickoConfig {
    /// RD growth per idle period
    pub c: f64
}

impl Default for GlickoConfig {
    fn default() -> Self {
        GlickoConfig { c: GLICKO_C }
    }
}

impl GlickoConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.c.is_finite() && self.c >= 0.0) {
            return Err(RatingError::InvalidConfig(format!(
                "Glicko c must be non-negative, got {}",
                self.c
            )));
        }

        Ok(())
    }
}

/// # Glicko
///
/// Every entity active in the period is updated once from all of its
/// contests of that period, against the opponents' pre-period ratings.
///
/// Before the update the rating deviation of an entity last rated `t`
/// periods ago becomes `min(sqrt(RD² + c²·t), RD₀)` where `RD₀` is the
/// default deviation.
pub struct Glicko {
    name: String,
    config: GlickoConfig
}

impl Glicko {
    pub fn new(name: &str, config: GlickoConfig) -> Glicko {
        Glicko {
            name: name.to_string(),
            config
        }
    }

    fn prior(&self, input: &PeriodInput<'_>, tracker: &RatingTracker, entity_id: EntityId) -> (f64, f64) {
        let defaults = input.defaults();
        match last_rating(tracker, entity_id) {
            Some((rating, deviation, period)) => {
                let elapsed = elapsed_periods(period, input.current().index);
                let deviation = inflate_deviation(
                    deviation,
                    self.config.c * self.config.c,
                    elapsed,
                    Some(defaults.deviation)
                );
                (rating, deviation)
            }
            None => (defaults.mean, defaults.deviation)
        }
    }
}

pub fn g(deviation: f64) -> f64 {
    1.0 / (1.0 + 3.0 * Q * Q * deviation * deviation / (PI * PI)).sqrt()
}

pub fn expected_score(rating: f64, opponent: f64, opponent_deviation: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf(-g(opponent_deviation) * (rating - opponent) / 400.0))
}

impl RatingSystem for Glicko {
    fn name(&self) -> &str {
        &self.name
    }

    fn rate_period(&self, input: &PeriodInput<'_>, tracker: &RatingTracker) -> Result<PeriodUpdate> {
        let period = input.current();
        let contests = input.rated_contests(period)?;

        // (opponent, score) pairs per entity
        let mut results: IndexMap<EntityId, Vec<(EntityId, f64)>> = IndexMap::new();
        for contest in &contests {
            let share = contest.result.home_share();
            results.entry(contest.home).or_default().push((contest.away, share));
            results.entry(contest.away).or_default().push((contest.home, 1.0 - share));
        }

        let priors: IndexMap<EntityId, (f64, f64)> = results
            .keys()
            .map(|id| (*id, self.prior(input, tracker, *id)))
            .collect();

        let mut ratings = Vec::with_capacity(results.len());
        for (entity_id, games) in &results {
            let (rating, deviation) = priors[entity_id];

            let mut information = 0.0;
            let mut improvement = 0.0;
            for (opponent_id, score) in games {
                let (opponent, opponent_deviation) = priors[opponent_id];
                let g = g(opponent_deviation);
                let e = expected_score(rating, opponent, opponent_deviation);
                information += g * g * e * (1.0 - e);
                improvement += g * (score - e);
            }

            let precision = 1.0 / (deviation * deviation) + Q * Q * information;
            let new_rating = rating + Q / precision * improvement;
            let new_deviation = (1.0 / precision).sqrt();

            if !(new_rating.is_finite() && new_deviation.is_finite()) {
                return Err(RatingError::NumericalInstability {
                    period: period.index,
                    reason: format!("Glicko update for {} is not finite", entity_id)
                });
            }

            ratings.push((*entity_id, RatingSnapshot::scalar(period, new_rating, new_deviation)));
        }

        debug!("{}: period {} updated {} entities", self.name, period.index, ratings.len());

        Ok(PeriodUpdate {
            ratings,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_g() {
        // Values from Glickman's worked example
        assert_abs_diff_eq!(g(30.0), 0.9955, epsilon = 1e-4);
        assert_abs_diff_eq!(g(100.0), 0.9531, epsilon = 1e-4);
        assert_abs_diff_eq!(g(300.0), 0.7242, epsilon = 1e-4);
    }

    #[test]
    fn test_expected_score() {
        assert_abs_diff_eq!(expected_score(1500.0, 1400.0, 30.0), 0.639, epsilon = 1e-3);
        assert_abs_diff_eq!(expected_score(1500.0, 1550.0, 100.0), 0.432, epsilon = 1e-3);
        assert_abs_diff_eq!(expected_score(1500.0, 1700.0, 300.0), 0.303, epsilon = 1e-3);
    }

    #[test]
    fn test_negative_c_is_invalid() {
        assert!(GlickoConfig { c: -1.0 }.validate().is_err());
    }
}

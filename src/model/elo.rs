use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::{
    database::db_structs::EntityId,
    error::{RatingError, Result},
    model::{
        constants::ELO_K_FACTOR,
        rating_system::{last_rating, PeriodInput, PeriodUpdate, RatingSystem},
        rating_tracker::{RatingSnapshot, RatingTracker}
    }
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EloConfig {
    pub k_factor: f64
}

impl Default for EloConfig {
    fn default() -> Self {
        EloConfig { k_factor: ELO_K_FACTOR }
    }
}

impl EloConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.k_factor.is_finite() && self.k_factor > 0.0) {
            return Err(RatingError::InvalidConfig(format!(
                "Elo K-factor must be positive, got {}",
                self.k_factor
            )));
        }

        Ok(())
    }
}

/// Classic Elo: every contest moves both ratings by `K · (score − expected)`.
///
/// Contests are applied one by one in period order. Elo carries no
/// uncertainty, so snapshots report a deviation of zero.
pub struct Elo {
    name: String,
    config: EloConfig
}

impl Elo {
    pub fn new(name: &str, config: EloConfig) -> Elo {
        Elo {
            name: name.to_string(),
            config
        }
    }
}

/// Probability that a player rated `rating` scores against `opponent`.
pub fn expected_score(rating: f64, opponent: f64) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - rating) / 400.0))
}

impl RatingSystem for Elo {
    fn name(&self) -> &str {
        &self.name
    }

    fn rate_period(&self, input: &PeriodInput<'_>, tracker: &RatingTracker) -> Result<PeriodUpdate> {
        let period = input.current();
        let contests = input.rated_contests(period)?;

        let mut ratings: HashMap<EntityId, f64> = HashMap::new();
        let mut order = Vec::new();
        for contest in &contests {
            for entity_id in [contest.home, contest.away] {
                ratings.entry(entity_id).or_insert_with(|| {
                    order.push(entity_id);
                    last_rating(tracker, entity_id).map_or(input.defaults().mean, |(r, _, _)| r)
                });
            }
        }

        for contest in contests {
            let home = ratings[&contest.home];
            let away = ratings[&contest.away];
            let delta = self.config.k_factor * (contest.result.home_share() - expected_score(home, away));

            ratings.insert(contest.home, home + delta);
            ratings.insert(contest.away, away - delta);
        }

        debug!("{}: period {} updated {} entities", self.name, period.index, order.len());

        Ok(PeriodUpdate {
            ratings: order
                .into_iter()
                .map(|id| (id, RatingSnapshot::scalar(period, ratings[&id], 0.0)))
                .collect(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_expected_score() {
        assert_abs_diff_eq!(expected_score(1500.0, 1500.0), 0.5);
        assert_abs_diff_eq!(expected_score(1900.0, 1500.0), 10.0 / 11.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            expected_score(1613.0, 1477.0) + expected_score(1477.0, 1613.0),
            1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_invalid_k_factor() {
        assert!(EloConfig { k_factor: 0.0 }.validate().is_err());
        assert!(EloConfig::default().validate().is_ok());
    }
}

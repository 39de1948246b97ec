use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use std::f64::consts::SQRT_2;
use tracing::debug;

use crate::{
    config::DefaultRating,
    database::db_structs::EntityId,
    error::{RatingError, Result},
    model::{
        constants::{TRUESKILL_BETA_RATIO, TRUESKILL_DRAW_PROBABILITY, TRUESKILL_TAU_RATIO},
        decay::{elapsed_periods, inflate_deviation},
        rating_system::{last_rating, PeriodInput, PeriodUpdate, RatingSystem},
        rating_tracker::{RatingSnapshot, RatingTracker}
    }
};

/// Below this the normal CDF is treated as zero
const CDF_FLOOR: f64 = 2.222758749e-162;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrueSkillConfig {
    /// Performance deviation; half the default deviation when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<f64>,
    /// Skill drift per period; a hundredth of the default deviation when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tau: Option<f64>,
    pub draw_probability: f64
}

impl Default for TrueSkillConfig {
    fn default() -> Self {
        TrueSkillConfig {
            beta: None,
            tau: None,
            draw_probability: TRUESKILL_DRAW_PROBABILITY
        }
    }
}

impl TrueSkillConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(beta) = self.beta {
            if !(beta.is_finite() && beta > 0.0) {
                return Err(RatingError::InvalidConfig(format!("TrueSkill beta must be positive, got {}", beta)));
            }
        }
        if let Some(tau) = self.tau {
            if !(tau.is_finite() && tau >= 0.0) {
                return Err(RatingError::InvalidConfig(format!(
                    "TrueSkill tau must be non-negative, got {}",
                    tau
                )));
            }
        }
        if !(0.0..1.0).contains(&self.draw_probability) {
            return Err(RatingError::InvalidConfig(format!(
                "TrueSkill draw probability must lie in [0, 1), got {}",
                self.draw_probability
            )));
        }

        Ok(())
    }

    fn beta(&self, defaults: &DefaultRating) -> f64 {
        self.beta.unwrap_or(defaults.deviation * TRUESKILL_BETA_RATIO)
    }

    fn tau(&self, defaults: &DefaultRating) -> f64 {
        self.tau.unwrap_or(defaults.deviation * TRUESKILL_TAU_RATIO)
    }
}

/// Two-player TrueSkill.
///
/// Contests are applied one at a time within the period. The skill drift
/// `τ²` is added once per elapsed period when an entity is first seen in a
/// period, so idle entities grow uncertain without being touched.
pub struct TrueSkill {
    name: String,
    config: TrueSkillConfig,
    normal: Normal
}

impl TrueSkill {
    pub fn new(name: &str, config: TrueSkillConfig) -> TrueSkill {
        TrueSkill {
            name: name.to_string(),
            config,
            normal: Normal::standard()
        }
    }

    /// Score difference (in performance units) below which a contest is a draw.
    pub fn draw_margin(&self, beta: f64) -> f64 {
        self.normal.inverse_cdf((self.config.draw_probability + 1.0) / 2.0) * SQRT_2 * beta
    }

    fn v_win(&self, t: f64, margin: f64) -> f64 {
        let x = t - margin;
        let denom = self.normal.cdf(x);
        if denom < CDF_FLOOR {
            -x
        } else {
            self.normal.pdf(x) / denom
        }
    }

    fn w_win(&self, t: f64, margin: f64) -> f64 {
        let x = t - margin;
        let v = self.v_win(t, margin);
        (v * (v + x)).clamp(0.0, 1.0)
    }

    fn v_draw(&self, t: f64, margin: f64) -> f64 {
        let abs_t = t.abs();
        let a = margin - abs_t;
        let b = -margin - abs_t;
        let denom = self.normal.cdf(a) - self.normal.cdf(b);
        let v = if denom < CDF_FLOOR {
            a
        } else {
            (self.normal.pdf(b) - self.normal.pdf(a)) / denom
        };

        if t < 0.0 {
            -v
        } else {
            v
        }
    }

    fn w_draw(&self, t: f64, margin: f64) -> f64 {
        let abs_t = t.abs();
        let a = margin - abs_t;
        let b = -margin - abs_t;
        let denom = self.normal.cdf(a) - self.normal.cdf(b);
        if denom < CDF_FLOOR {
            return 1.0;
        }

        let v = self.v_draw(abs_t, margin);
        (v * v + (a * self.normal.pdf(a) - b * self.normal.pdf(b)) / denom).clamp(0.0, 1.0)
    }

    /// Updates `(μ, σ)` of both sides for a contest the home side won
    /// (`outcome > 0`), drew (`0`) or lost (`< 0`).
    fn update(&self, home: (f64, f64), away: (f64, f64), outcome: i8, beta: f64) -> ((f64, f64), (f64, f64)) {
        let (winner, loser) = if outcome < 0 { (away, home) } else { (home, away) };
        let (mu_w, sigma_w) = winner;
        let (mu_l, sigma_l) = loser;

        let c = (2.0 * beta * beta + sigma_w * sigma_w + sigma_l * sigma_l).sqrt();
        let t = (mu_w - mu_l) / c;
        let margin = self.draw_margin(beta) / c;
        let (v, w) = if outcome == 0 {
            (self.v_draw(t, margin), self.w_draw(t, margin))
        } else {
            (self.v_win(t, margin), self.w_win(t, margin))
        };

        let var_w = sigma_w * sigma_w;
        let var_l = sigma_l * sigma_l;
        let winner = (
            mu_w + var_w / c * v,
            (var_w * (1.0 - var_w / (c * c) * w)).max(0.0).sqrt()
        );
        let loser = (
            mu_l - var_l / c * v,
            (var_l * (1.0 - var_l / (c * c) * w)).max(0.0).sqrt()
        );

        if outcome < 0 {
            (loser, winner)
        } else {
            (winner, loser)
        }
    }

    fn prior(&self, input: &PeriodInput<'_>, tracker: &RatingTracker, entity_id: EntityId) -> (f64, f64) {
        let defaults = input.defaults();
        match last_rating(tracker, entity_id) {
            Some((mean, deviation, period)) => {
                let tau = self.config.tau(defaults);
                let elapsed = elapsed_periods(period, input.current().index);
                (mean, inflate_deviation(deviation, tau * tau, elapsed, None))
            }
            None => (defaults.mean, defaults.deviation)
        }
    }
}

impl RatingSystem for TrueSkill {
    fn name(&self) -> &str {
        &self.name
    }

    fn rate_period(&self, input: &PeriodInput<'_>, tracker: &RatingTracker) -> Result<PeriodUpdate> {
        let period = input.current();
        let contests = input.rated_contests(period)?;
        let beta = self.config.beta(input.defaults());

        let mut ratings: IndexMap<EntityId, (f64, f64)> = IndexMap::new();
        for contest in &contests {
            for entity_id in [contest.home, contest.away] {
                if !ratings.contains_key(&entity_id) {
                    ratings.insert(entity_id, self.prior(input, tracker, entity_id));
                }
            }
        }

        for contest in contests {
            let share = contest.result.home_share();
            let outcome = if share > 0.5 {
                1
            } else if share < 0.5 {
                -1
            } else {
                0
            };

            let (home, away) = self.update(ratings[&contest.home], ratings[&contest.away], outcome, beta);
            if !(home.0.is_finite() && home.1.is_finite() && away.0.is_finite() && away.1.is_finite()) {
                return Err(RatingError::NumericalInstability {
                    period: period.index,
                    reason: format!("TrueSkill update for {} is not finite", contest.id)
                });
            }

            ratings.insert(contest.home, home);
            ratings.insert(contest.away, away);
        }

        debug!("{}: period {} updated {} entities", self.name, period.index, ratings.len());

        Ok(PeriodUpdate {
            ratings: ratings
                .into_iter()
                .map(|(id, (mean, deviation))| (id, RatingSnapshot::scalar(period, mean, deviation)))
                .collect(),
            ..Default::default()
        })
    }
}

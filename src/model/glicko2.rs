use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

use crate::{
    database::db_structs::EntityId,
    error::{RatingError, Result},
    model::{
        constants::{GLICKO2_CONVERGENCE, GLICKO2_MAX_ITERATIONS, GLICKO2_TAU, GLICKO2_VOLATILITY, LOGISTIC_SCALE},
        decay::inflate_deviation,
        rating_system::{PeriodInput, PeriodUpdate, RatingSystem},
        rating_tracker::{RatingSnapshot, RatingTracker}
    }
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Glicko2Config {
    /// System constant constraining volatility changes
    pub tau: f64,
    /// Volatility of a new entity
    pub volatility: f64
}

impl Default for Glicko2Config {
    fn default() -> Self {
        Glicko2Config {
            tau: GLICKO2_TAU,
            volatility: GLICKO2_VOLATILITY
        }
    }
}

impl Glicko2Config {
    pub fn validate(&self) -> Result<()> {
        if !(self.tau.is_finite() && self.tau > 0.0) {
            return Err(RatingError::InvalidConfig(format!("Glicko-2 tau must be positive, got {}", self.tau)));
        }
        if !(self.volatility.is_finite() && self.volatility > 0.0) {
            return Err(RatingError::InvalidConfig(format!(
                "Glicko-2 volatility must be positive, got {}",
                self.volatility
            )));
        }

        Ok(())
    }
}

/// Rating on the Glicko-2 scale, centred on the default mean.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Scaled {
    mu: f64,
    phi: f64,
    sigma: f64
}

pub struct Glicko2 {
    name: String,
    config: Glicko2Config
}

impl Glicko2 {
    pub fn new(name: &str, config: Glicko2Config) -> Glicko2 {
        Glicko2 {
            name: name.to_string(),
            config
        }
    }

    /// Pre-period rating of an entity.
    ///
    /// A stored deviation already includes the volatility step of the period
    /// it was computed in, so only the periods strictly in between add `σ²`.
    fn prior(&self, input: &PeriodInput<'_>, tracker: &RatingTracker, entity_id: EntityId) -> Scaled {
        let defaults = input.defaults();
        match tracker.get_rating(entity_id) {
            Some(snapshot) => {
                let sigma = snapshot.volatility.unwrap_or(self.config.volatility);
                let idle = input.current().index.saturating_sub(snapshot.period + 1);
                let phi = inflate_deviation(
                    snapshot.deviation() / LOGISTIC_SCALE,
                    sigma * sigma,
                    idle,
                    Some(defaults.deviation / LOGISTIC_SCALE)
                );

                Scaled {
                    mu: (snapshot.rating() - defaults.mean) / LOGISTIC_SCALE,
                    phi,
                    sigma
                }
            }
            None => Scaled {
                mu: 0.0,
                phi: defaults.deviation / LOGISTIC_SCALE,
                sigma: self.config.volatility
            }
        }
    }

    /// New volatility by the Illinois variant of regula falsi.
    fn volatility(&self, current: Scaled, delta: f64, v: f64) -> f64 {
        let tau = self.config.tau;
        let phi_sq = current.phi * current.phi;
        let a = (current.sigma * current.sigma).ln();
        let f = |x: f64| {
            let ex = x.exp();
            let denom = phi_sq + v + ex;
            ex * (delta * delta - phi_sq - v - ex) / (2.0 * denom * denom) - (x - a) / (tau * tau)
        };

        let mut lower = a;
        let mut upper = if delta * delta > phi_sq + v {
            (delta * delta - phi_sq - v).ln()
        } else {
            let mut k = 1.0;
            while f(a - k * tau) < 0.0 && k < GLICKO2_MAX_ITERATIONS as f64 {
                k += 1.0;
            }
            a - k * tau
        };

        let mut f_lower = f(lower);
        let mut f_upper = f(upper);
        let mut iterations = 0;
        while (upper - lower).abs() > GLICKO2_CONVERGENCE && iterations < GLICKO2_MAX_ITERATIONS {
            let c = lower + (lower - upper) * f_lower / (f_upper - f_lower);
            let f_c = f(c);
            if f_c * f_upper <= 0.0 {
                lower = upper;
                f_lower = f_upper;
            } else {
                f_lower /= 2.0;
            }
            upper = c;
            f_upper = f_c;
            iterations += 1;
        }

        (lower / 2.0).exp()
    }
}

fn g(phi: f64) -> f64 {
    1.0 / (1.0 + 3.0 * phi * phi / (PI * PI)).sqrt()
}

fn expected_score(mu: f64, opponent_mu: f64, opponent_phi: f64) -> f64 {
    1.0 / (1.0 + (-g(opponent_phi) * (mu - opponent_mu)).exp())
}

impl RatingSystem for Glicko2 {
    fn name(&self) -> &str {
        &self.name
    }

    fn rate_period(&self, input: &PeriodInput<'_>, tracker: &RatingTracker) -> Result<PeriodUpdate> {
        let period = input.current();
        let contests = input.rated_contests(period)?;
        let defaults = input.defaults();

        let mut results: IndexMap<EntityId, Vec<(EntityId, f64)>> = IndexMap::new();
        for contest in &contests {
            let share = contest.result.home_share();
            results.entry(contest.home).or_default().push((contest.away, share));
            results.entry(contest.away).or_default().push((contest.home, 1.0 - share));
        }

        let priors: IndexMap<EntityId, Scaled> = results
            .keys()
            .map(|id| (*id, self.prior(input, tracker, *id)))
            .collect();

        let mut ratings = Vec::with_capacity(results.len());
        for (entity_id, games) in &results {
            let current = priors[entity_id];

            let mut v_inv = 0.0;
            let mut improvement = 0.0;
            for (opponent_id, score) in games {
                let opponent = priors[opponent_id];
                let g = g(opponent.phi);
                let e = expected_score(current.mu, opponent.mu, opponent.phi);
                v_inv += g * g * e * (1.0 - e);
                improvement += g * (score - e);
            }

            if v_inv <= 0.0 {
                return Err(RatingError::NumericalInstability {
                    period: period.index,
                    reason: format!("Glicko-2 information for {} vanished", entity_id)
                });
            }

            let v = 1.0 / v_inv;
            let sigma = self.volatility(current, v * improvement, v);
            let phi_star_sq = current.phi * current.phi + sigma * sigma;
            let phi = 1.0 / (1.0 / phi_star_sq + 1.0 / v).sqrt();
            let mu = current.mu + phi * phi * improvement;

            if !(mu.is_finite() && phi.is_finite() && sigma.is_finite()) {
                return Err(RatingError::NumericalInstability {
                    period: period.index,
                    reason: format!("Glicko-2 update for {} is not finite", entity_id)
                });
            }

            let snapshot = RatingSnapshot::scalar(period, mu * LOGISTIC_SCALE + defaults.mean, phi * LOGISTIC_SCALE)
                .with_volatility(sigma);
            ratings.push((*entity_id, snapshot));
        }

        debug!("{}: period {} updated {} entities", self.name, period.index, ratings.len());

        Ok(PeriodUpdate {
            ratings,
            ..Default::default()
        })
    }
}

pub mod advantage;
pub mod likelihood;
pub mod linearization;
pub mod optimizer;
pub mod posterior;
pub mod state_space;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::{
    error::{RatingError, Result},
    model::{
        constants::{LOGISTIC_SCALE, OPTIMIZER_MAX_ITERATIONS, OPTIMIZER_TOLERANCE},
        rating_system::{Convergence, JointUpdate, PeriodInput, PeriodUpdate, RatingSystem},
        rating_tracker::{RatingSnapshot, RatingTracker, SharedSnapshot}
    }
};
use advantage::{resolve_all, AdvantageSpec};
use likelihood::Likelihood;
use linearization::LinearizationWindow;
use optimizer::{maximize, Settings};
use state_space::{LatentKey, ModelParameters, StateSpace};

fn default_tolerance() -> f64 {
    OPTIMIZER_TOLERANCE
}

fn default_max_iterations() -> usize {
    OPTIMIZER_MAX_ITERATIONS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolyratingConfig {
    #[serde(default)]
    pub likelihood: Likelihood,
    /// Skill variance added per period, in rating points squared
    #[serde(default)]
    pub omega: f64,
    #[serde(default)]
    pub advantages: Vec<AdvantageSpec>,
    #[serde(default)]
    pub window: LinearizationWindow,
    /// Convergence threshold on the internal (natural logit) scale
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize
}

impl Default for PolyratingConfig {
    fn default() -> Self {
        PolyratingConfig {
            likelihood: Likelihood::default(),
            omega: 0.0,
            advantages: Vec::new(),
            window: LinearizationWindow::default(),
            tolerance: OPTIMIZER_TOLERANCE,
            max_iterations: OPTIMIZER_MAX_ITERATIONS
        }
    }
}

impl PolyratingConfig {
    pub fn with_likelihood(mut self, likelihood: Likelihood) -> Self {
        self.likelihood = likelihood;
        self
    }

    pub fn with_omega(mut self, omega: f64) -> Self {
        self.omega = omega;
        self
    }

    pub fn with_advantage(mut self, advantage: AdvantageSpec) -> Self {
        self.advantages.push(advantage);
        self
    }

    pub fn with_window(mut self, window: LinearizationWindow) -> Self {
        self.window = window;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.likelihood.validate()?;
        self.window.validate()?;

        if !(self.omega.is_finite() && self.omega >= 0.0) {
            return Err(RatingError::InvalidConfig(format!(
                "Polyrating omega must be non-negative, got {}",
                self.omega
            )));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(RatingError::InvalidConfig(format!(
                "Optimizer tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.max_iterations == 0 {
            return Err(RatingError::InvalidConfig(
                "Optimizer needs at least one iteration".to_string()
            ));
        }

        let mut names = HashSet::new();
        for advantage in &self.advantages {
            advantage.validate()?;
            if !names.insert(advantage.name.as_str()) {
                return Err(RatingError::InvalidConfig(format!(
                    "Advantage '{}' is configured twice",
                    advantage.name
                )));
            }
        }

        Ok(())
    }

    fn settings(&self) -> Settings {
        Settings {
            tolerance: self.tolerance,
            max_iterations: self.max_iterations
        }
    }
}

/// # Polyrating
///
/// Multivariate Gaussian ratings fitted by maximum a posteriori.
///
/// Each entity has a skill and, per configured advantage, either a private
/// latent value or access to one shared by a set of entities. The strength
/// of a side in a contest is its skill plus the advantages it carries,
/// weighted by their values, and the outcome depends on the strength
/// difference through the configured likelihood.
///
/// Rating period `t` re-fits every period in the linearization window
/// jointly, then reports the posterior at `t` for the entities that played
/// in `t`.
pub struct Polyrating {
    name: String,
    config: PolyratingConfig
}

impl Polyrating {
    pub fn new(name: &str, config: PolyratingConfig) -> Polyrating {
        Polyrating {
            name: name.to_string(),
            config
        }
    }

    pub fn config(&self) -> &PolyratingConfig {
        &self.config
    }
}

impl RatingSystem for Polyrating {
    fn name(&self) -> &str {
        &self.name
    }

    fn rate_period(&self, input: &PeriodInput<'_>, tracker: &RatingTracker) -> Result<PeriodUpdate> {
        let period = input.current();
        let advantages = resolve_all(&self.config.advantages, input.entities())?;
        let model = ModelParameters {
            likelihood: self.config.likelihood,
            omega: self.config.omega / (LOGISTIC_SCALE * LOGISTIC_SCALE),
            advantages: &advantages
        };
        let window_start = self.config.window.start(period.index);

        let space = StateSpace::build(input, tracker, &model, window_start)?;
        if space.active_entities().next().is_none() {
            return Ok(PeriodUpdate::default());
        }

        // Bounded windows carry the joint posterior of every latent forward
        let bounded = matches!(self.config.window, LinearizationWindow::Periods(_));
        let tracked = if bounded { space.latest_params() } else { Vec::new() };
        let fit = maximize(space.problem(), &self.config.settings(), period.index, &tracked)?;
        debug!(
            "{}: period {} fitted {} parameters over {} contests in {} iterations",
            self.name,
            period.index,
            space.len(),
            space.problem().observations.len(),
            fit.iterations
        );

        let estimate = |key: &LatentKey| {
            space
                .param(key, period.index)
                .map(|i| (fit.mean[i] * LOGISTIC_SCALE, fit.deviation[i] * LOGISTIC_SCALE))
        };

        let mut ratings = Vec::new();
        for entity_id in space.active_entities() {
            let Some((mean, deviation)) = estimate(&LatentKey::Skill(entity_id)) else {
                continue;
            };
            let mut snapshot = RatingSnapshot::scalar(period, mean, deviation);

            for advantage in advantages.values() {
                let key = if advantage.is_shared() {
                    if !space.uses_shared(entity_id, &advantage.name) {
                        continue;
                    }
                    LatentKey::Shared(advantage.name.clone())
                } else {
                    LatentKey::Individual(entity_id, advantage.name.clone())
                };

                if let Some((mean, deviation)) = estimate(&key) {
                    snapshot = snapshot.with_component(&advantage.name, mean, deviation);
                }
            }

            ratings.push((entity_id, snapshot));
        }

        let shared = advantages
            .values()
            .filter(|a| a.is_shared())
            .filter_map(|a| {
                estimate(&LatentKey::Shared(a.name.clone())).map(|(mean, deviation)| {
                    (
                        a.name.clone(),
                        SharedSnapshot {
                            period: period.index,
                            mean,
                            deviation
                        }
                    )
                })
            })
            .collect();

        let joint = bounded.then(|| JointUpdate {
            posterior: space.joint_posterior(period.index, &fit),
            horizon: self.config.window.start(period.index + 1)
        });

        Ok(PeriodUpdate {
            ratings,
            shared,
            joint,
            convergence: Some(Convergence {
                iterations: fit.iterations,
                converged: fit.converged,
                gradient_norm: fit.gradient_norm
            })
        })
    }
}

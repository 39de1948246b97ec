use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::{
    database::db_structs::EntityId,
    error::{RatingError, Result},
    model::{
        constants::LOGISTIC_SCALE,
        decay::inflate_variance,
        polyrating::{
            advantage::ResolvedAdvantage,
            likelihood::Likelihood,
            optimizer::{precision_of, Fit, JointPrior, Link, Observation, Prior, Problem},
            posterior::{CarriedLatent, JointPosterior}
        },
        rating_system::PeriodInput,
        rating_tracker::RatingTracker
    }
};

/// A latent quantity of the model, independent of time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LatentKey {
    Skill(EntityId),
    Individual(EntityId, String),
    Shared(String)
}

impl LatentKey {
    /// The entity owning this latent; shared advantages have none.
    pub fn entity(&self) -> Option<EntityId> {
        match self {
            LatentKey::Skill(entity_id) | LatentKey::Individual(entity_id, _) => Some(*entity_id),
            LatentKey::Shared(_) => None
        }
    }
}

/// Model-wide parameters on the internal scale.
pub struct ModelParameters<'a> {
    pub likelihood: Likelihood,
    /// Skill process variance per period
    pub omega: f64,
    pub advantages: &'a IndexMap<String, ResolvedAdvantage>
}

/// The joint log-posterior over every latent occurrence in a window of
/// periods, laid out as one flat parameter vector.
///
/// Each latent key forms a chain over the periods it occurs in. With zero
/// process variance the whole chain is one parameter; otherwise consecutive
/// occurrences are tied by a random-walk link of variance `omega × gap`.
/// The head of each chain carries the prior. When an earlier window left a
/// joint posterior behind, its latents become boundary parameters under one
/// multivariate prior and chains continue from them. Otherwise the head
/// takes the latest marginal posterior from before the window, inflated by
/// the elapsed periods, or the default.
pub struct StateSpace {
    index: IndexMap<(LatentKey, usize), usize>,
    /// Latest occurrence (period, parameter) of every latent, including those
    /// only carried in from before the window
    latest: IndexMap<LatentKey, (usize, usize)>,
    problem: Problem,
    /// Entities rated in the last period of the window, in order of appearance
    active: IndexSet<EntityId>,
    /// Shared advantages each entity carried in the last period of the window
    shared_users: BTreeSet<(EntityId, String)>
}

impl StateSpace {
    pub fn build(
        input: &PeriodInput<'_>,
        tracker: &RatingTracker,
        model: &ModelParameters<'_>,
        window_start: usize
    ) -> Result<StateSpace> {
        let current = input.current().index;
        let mut occurrences: IndexMap<LatentKey, BTreeSet<usize>> = IndexMap::new();
        let mut pending = Vec::new();
        let mut active = IndexSet::new();
        let mut shared_users = BTreeSet::new();

        for period in &input.periods()[window_start..=current] {
            for contest in input.rated_contests(period)? {
                let mut terms = Vec::new();
                let sides = [
                    (contest.home, &contest.advantages_home, 1.0),
                    (contest.away, &contest.advantages_out, -1.0)
                ];

                for (entity_id, advantages, sign) in sides {
                    terms.push((LatentKey::Skill(entity_id), sign));
                    if period.index == current {
                        active.insert(entity_id);
                    }

                    for (name, value) in advantages {
                        if *value == 0.0 {
                            continue;
                        }
                        let Some(advantage) = model.advantages.get(name) else {
                            debug!("Ignoring unconfigured advantage '{}' in {}", name, contest.id);
                            continue;
                        };
                        if !advantage.applies_to(entity_id) {
                            continue;
                        }

                        let key = if advantage.is_shared() {
                            if period.index == current {
                                shared_users.insert((entity_id, name.clone()));
                            }
                            LatentKey::Shared(name.clone())
                        } else {
                            LatentKey::Individual(entity_id, name.clone())
                        };
                        terms.push((key, sign * value));
                    }
                }

                for (key, _) in &terms {
                    occurrences.entry(key.clone()).or_default().insert(period.index);
                }
                pending.push((period.index, terms, contest.result.home_share()));
            }
        }

        let mut index = IndexMap::new();
        let mut latest: IndexMap<LatentKey, (usize, usize)> = IndexMap::new();
        let mut problem = Problem {
            initial: Vec::new(),
            priors: Vec::new(),
            joint_priors: Vec::new(),
            links: Vec::new(),
            observations: Vec::with_capacity(pending.len()),
            likelihood: model.likelihood
        };

        let carried = if window_start > 0 {
            tracker.joint_before(window_start).filter(|p| !p.is_empty())
        } else {
            None
        };
        if let Some(posterior) = carried {
            let precision = precision_of(&posterior.covariance_matrix()).ok_or_else(|| {
                RatingError::NumericalInstability {
                    period: current,
                    reason: format!("Carried covariance from period {} is not positive definite", posterior.period)
                }
            })?;

            let mut params = Vec::with_capacity(posterior.len());
            for latent in &posterior.latents {
                let param = problem.initial.len();
                problem.initial.push(latent.mean);
                params.push(param);
                latest.insert(latent.key.clone(), (latent.period, param));
            }
            problem.joint_priors.push(JointPrior {
                params,
                mean: posterior.latents.iter().map(|l| l.mean).collect(),
                precision
            });
        }

        for (key, periods) in &occurrences {
            let omega = match key {
                LatentKey::Skill(_) => model.omega,
                LatentKey::Individual(_, name) | LatentKey::Shared(name) => model.advantages[name].omega
            };

            let mut chain = periods.iter().copied();
            let Some(head) = chain.next() else {
                continue;
            };

            let head_param = match latest.get(key).copied() {
                Some((_, boundary)) if omega == 0.0 => boundary,
                Some((period, boundary)) => {
                    let (param, mean) = (problem.initial.len(), problem.initial[boundary]);
                    problem.initial.push(mean);
                    problem.links.push(Link {
                        a: boundary,
                        b: param,
                        precision: 1.0 / (omega * (head - period) as f64)
                    });
                    param
                }
                None => {
                    let (mean, variance) = head_prior(input, tracker, model, key, head, window_start, omega);
                    if !(mean.is_finite() && variance.is_finite() && variance > 0.0) {
                        return Err(RatingError::NumericalInstability {
                            period: current,
                            reason: format!("Invalid prior for {:?}: mean {}, variance {}", key, mean, variance)
                        });
                    }

                    let param = problem.initial.len();
                    problem.initial.push(mean);
                    problem.priors.push(Prior {
                        param,
                        mean,
                        precision: 1.0 / variance
                    });
                    param
                }
            };
            index.insert((key.clone(), head), head_param);

            let mut previous = (head, head_param);
            for period in chain {
                if omega == 0.0 {
                    index.insert((key.clone(), period), head_param);
                    previous = (period, head_param);
                    continue;
                }

                let (param, mean) = (problem.initial.len(), problem.initial[head_param]);
                problem.initial.push(mean);
                problem.links.push(Link {
                    a: previous.1,
                    b: param,
                    precision: 1.0 / (omega * (period - previous.0) as f64)
                });
                index.insert((key.clone(), period), param);
                previous = (period, param);
            }
            latest.insert(key.clone(), previous);
        }

        for (period, terms, score) in pending {
            let mut merged: Vec<(usize, f64)> = Vec::with_capacity(terms.len());
            for (key, coefficient) in terms {
                let param = index[&(key, period)];
                match merged.iter_mut().find(|(i, _)| *i == param) {
                    Some((_, c)) => *c += coefficient,
                    None => merged.push((param, coefficient))
                }
            }
            problem.observations.push(Observation { terms: merged, score });
        }

        Ok(StateSpace {
            index,
            latest,
            problem,
            active,
            shared_users
        })
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn len(&self) -> usize {
        self.problem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problem.is_empty()
    }

    /// The parameter holding `key` in `period`, if the key occurs there.
    pub fn param(&self, key: &LatentKey, period: usize) -> Option<usize> {
        self.index.get(&(key.clone(), period)).copied()
    }

    /// Parameters of the latest occurrence of every latent, in the order
    /// [`StateSpace::joint_posterior`] expects its covariance.
    pub fn latest_params(&self) -> Vec<usize> {
        self.latest.values().map(|(_, param)| *param).collect()
    }

    /// The posterior over the latest occurrence of every latent, from a fit
    /// whose joint covariance was requested for [`StateSpace::latest_params`].
    pub fn joint_posterior(&self, period: usize, fit: &Fit) -> JointPosterior {
        let latents = self
            .latest
            .iter()
            .map(|(key, (occurrence, param))| CarriedLatent {
                key: key.clone(),
                period: *occurrence,
                mean: fit.mean[*param]
            })
            .collect();

        JointPosterior::new(period, latents, &fit.joint_covariance)
    }

    pub fn active_entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.active.iter().copied()
    }

    pub fn uses_shared(&self, entity_id: EntityId, name: &str) -> bool {
        self.shared_users.contains(&(entity_id, name.to_string()))
    }
}

/// Mean and variance (internal scale) of the first occurrence of `key` in
/// the window, from the latest estimate strictly before the window.
fn head_prior(
    input: &PeriodInput<'_>,
    tracker: &RatingTracker,
    model: &ModelParameters<'_>,
    key: &LatentKey,
    head: usize,
    window_start: usize,
    omega: f64
) -> (f64, f64) {
    let scale = LOGISTIC_SCALE;
    let previous = match key {
        LatentKey::Skill(entity_id) => tracker
            .latest_before(*entity_id, window_start)
            .map(|s| (s.period, s.rating(), s.deviation())),
        LatentKey::Individual(entity_id, name) => tracker
            .latest_component_before(*entity_id, name, window_start)
            .map(|(period, c)| (period, c.mean, c.deviation)),
        LatentKey::Shared(name) => tracker
            .latest_shared_before(name, window_start)
            .map(|s| (s.period, s.mean, s.deviation))
    };

    match previous {
        Some((period, mean, deviation)) => {
            let variance = (deviation / scale).powi(2);
            (mean / scale, inflate_variance(variance, omega, head.saturating_sub(period)))
        }
        None => match key {
            LatentKey::Skill(_) => {
                let defaults = input.defaults();
                (defaults.mean / scale, (defaults.deviation / scale).powi(2))
            }
            LatentKey::Individual(_, name) | LatentKey::Shared(name) => {
                let advantage = &model.advantages[name];
                (advantage.mean, advantage.deviation * advantage.deviation)
            }
        }
    }
}

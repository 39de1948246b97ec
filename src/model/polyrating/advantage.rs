use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{
    database::db_structs::{Entity, EntityId},
    error::{RatingError, Result},
    model::constants::{LOGISTIC_SCALE, RATING_COMPONENT}
};

/// Gaussian prior of an advantage, in rating points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdvantagePrior {
    pub mean: f64,
    pub deviation: f64
}

impl Default for AdvantagePrior {
    fn default() -> Self {
        AdvantagePrior {
            mean: 0.0,
            deviation: 50.0
        }
    }
}

/// Which entities a shared advantage applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityMatcher {
    All,
    Ids(BTreeSet<EntityId>),
    Names(Vec<String>)
}

impl EntityMatcher {
    /// Resolves the matcher against a population.
    pub fn resolve(&self, entities: &IndexMap<EntityId, Entity>) -> Result<BTreeSet<EntityId>> {
        match self {
            EntityMatcher::All => Ok(entities.keys().copied().collect()),
            EntityMatcher::Ids(ids) => {
                if let Some(missing) = ids.iter().find(|id| !entities.contains_key(*id)) {
                    return Err(RatingError::UnknownEntity(*missing));
                }
                Ok(ids.clone())
            }
            EntityMatcher::Names(names) => names
                .iter()
                .map(|name| {
                    entities
                        .values()
                        .find(|e| &e.name == name)
                        .map(|e| e.id)
                        .ok_or_else(|| RatingError::UnknownEntityName(name.clone()))
                })
                .collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum AdvantageScope {
    /// Every entity carries its own latent value.
    Individual,
    /// One latent value shared by all matched entities.
    Shared { matcher: EntityMatcher }
}

/// A contextual effect added to a side's strength, scaled by the value the
/// side carries in the contest (e.g. `white = 1`, `home = 1`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvantageSpec {
    pub name: String,
    #[serde(default)]
    pub prior: AdvantagePrior,
    /// Variance added per period, in rating points squared
    #[serde(default)]
    pub omega: f64,
    pub scope: AdvantageScope
}

impl AdvantageSpec {
    pub fn individual(name: &str, prior: AdvantagePrior) -> AdvantageSpec {
        AdvantageSpec {
            name: name.to_string(),
            prior,
            omega: 0.0,
            scope: AdvantageScope::Individual
        }
    }

    pub fn shared(name: &str, prior: AdvantagePrior, matcher: EntityMatcher) -> AdvantageSpec {
        AdvantageSpec {
            name: name.to_string(),
            prior,
            omega: 0.0,
            scope: AdvantageScope::Shared { matcher }
        }
    }

    pub fn with_omega(mut self, omega: f64) -> AdvantageSpec {
        self.omega = omega;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() || self.name == RATING_COMPONENT {
            return Err(RatingError::InvalidConfig(format!(
                "'{}' is not a valid advantage name",
                self.name
            )));
        }
        if !(self.prior.mean.is_finite() && self.prior.deviation.is_finite() && self.prior.deviation > 0.0) {
            return Err(RatingError::InvalidConfig(format!(
                "Advantage '{}' needs a finite mean and a positive deviation",
                self.name
            )));
        }
        if !(self.omega.is_finite() && self.omega >= 0.0) {
            return Err(RatingError::InvalidConfig(format!(
                "Advantage '{}' omega must be non-negative",
                self.name
            )));
        }

        Ok(())
    }
}

/// An advantage ready for one computation, on the internal scale.
#[derive(Debug, Clone)]
pub struct ResolvedAdvantage {
    pub name: String,
    pub mean: f64,
    pub deviation: f64,
    pub omega: f64,
    /// `None` for individual advantages
    pub members: Option<BTreeSet<EntityId>>
}

impl ResolvedAdvantage {
    pub fn is_shared(&self) -> bool {
        self.members.is_some()
    }

    pub fn applies_to(&self, entity_id: EntityId) -> bool {
        self.members.as_ref().map_or(true, |m| m.contains(&entity_id))
    }
}

/// Resolves every configured advantage against `entities`, keeping
/// configuration order.
pub fn resolve_all(
    specs: &[AdvantageSpec],
    entities: &IndexMap<EntityId, Entity>
) -> Result<IndexMap<String, ResolvedAdvantage>> {
    specs
        .iter()
        .map(|spec| {
            let members = match &spec.scope {
                AdvantageScope::Individual => None,
                AdvantageScope::Shared { matcher } => Some(matcher.resolve(entities)?)
            };

            Ok((
                spec.name.clone(),
                ResolvedAdvantage {
                    name: spec.name.clone(),
                    mean: spec.prior.mean / LOGISTIC_SCALE,
                    deviation: spec.prior.deviation / LOGISTIC_SCALE,
                    omega: spec.omega / (LOGISTIC_SCALE * LOGISTIC_SCALE),
                    members
                }
            ))
        })
        .collect()
}

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    database::db_structs::EntityId,
    model::{constants::RATING_COMPONENT, period::RatingPeriod, polyrating::posterior::JointPosterior}
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingComponent {
    pub name: String,
    pub mean: f64,
    pub deviation: f64
}

/// Posterior of one entity at the end of one rating period.
///
/// The first component is always the base rating; advantage components
/// follow in configuration order and are only present when they were
/// estimated in that period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSnapshot {
    pub period: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub components: Vec<RatingComponent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volatility: Option<f64>
}

impl RatingSnapshot {
    pub fn scalar(period: &RatingPeriod, mean: f64, deviation: f64) -> RatingSnapshot {
        RatingSnapshot {
            period: period.index,
            start: period.start,
            end: period.end,
            components: vec![RatingComponent {
                name: RATING_COMPONENT.to_string(),
                mean,
                deviation
            }],
            volatility: None
        }
    }

    pub fn with_component(mut self, name: &str, mean: f64, deviation: f64) -> RatingSnapshot {
        self.components.push(RatingComponent {
            name: name.to_string(),
            mean,
            deviation
        });
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> RatingSnapshot {
        self.volatility = Some(volatility);
        self
    }

    pub fn rating(&self) -> f64 {
        self.components.first().map_or(f64::NAN, |c| c.mean)
    }

    pub fn deviation(&self) -> f64 {
        self.components.first().map_or(f64::NAN, |c| c.deviation)
    }

    pub fn component(&self, name: &str) -> Option<&RatingComponent> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn mean_vector(&self) -> Vec<f64> {
        self.components.iter().map(|c| c.mean).collect()
    }

    pub fn deviation_vector(&self) -> Vec<f64> {
        self.components.iter().map(|c| c.deviation).collect()
    }
}

/// Estimate of a shared advantage for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedSnapshot {
    pub period: usize,
    pub mean: f64,
    pub deviation: f64
}

/// The output of one rating system over the periods it has processed.
///
/// Snapshots are only ever appended, one per entity per period in which the
/// entity was rated. The finalized period ledger is kept so later incremental
/// runs can verify that the history did not change underneath them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingTracker {
    system: String,
    periods: Vec<RatingPeriod>,
    entities: IndexMap<EntityId, Vec<RatingSnapshot>>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    shared: IndexMap<String, Vec<SharedSnapshot>>,
    /// Carried joint posteriors, ascending by period
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    joint: Vec<JointPosterior>
}

impl RatingTracker {
    pub fn new(system: &str) -> RatingTracker {
        RatingTracker {
            system: system.to_string(),
            periods: Vec::new(),
            entities: IndexMap::new(),
            shared: IndexMap::new(),
            joint: Vec::new()
        }
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    /// Periods finalized so far, in order.
    pub fn periods(&self) -> &[RatingPeriod] {
        &self.periods
    }

    /// Records a finalized period together with the snapshots produced for it.
    pub fn insert_period(
        &mut self,
        period: RatingPeriod,
        ratings: Vec<(EntityId, RatingSnapshot)>,
        shared: Vec<(String, SharedSnapshot)>
    ) {
        for (entity_id, snapshot) in ratings {
            let history = self.entities.entry(entity_id).or_default();
            debug_assert!(history.last().map_or(true, |last| last.period < snapshot.period));
            history.push(snapshot);
        }

        for (name, snapshot) in shared {
            self.shared.entry(name).or_default().push(snapshot);
        }

        self.periods.push(period);
    }

    /// The latest rating of an entity.
    pub fn get_rating(&self, entity_id: EntityId) -> Option<&RatingSnapshot> {
        self.entities.get(&entity_id).and_then(|h| h.last())
    }

    pub fn get_history(&self, entity_id: EntityId) -> &[RatingSnapshot] {
        self.entities.get(&entity_id).map_or(&[], |h| h.as_slice())
    }

    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// The latest snapshot of an entity strictly before `period`.
    pub fn latest_before(&self, entity_id: EntityId, period: usize) -> Option<&RatingSnapshot> {
        self.get_history(entity_id).iter().rev().find(|s| s.period < period)
    }

    /// The latest estimate of one named component strictly before `period`,
    /// together with the period it was estimated in.
    pub fn latest_component_before(
        &self,
        entity_id: EntityId,
        name: &str,
        period: usize
    ) -> Option<(usize, &RatingComponent)> {
        self.get_history(entity_id)
            .iter()
            .rev()
            .filter(|s| s.period < period)
            .find_map(|s| s.component(name).map(|c| (s.period, c)))
    }

    pub fn shared_history(&self, name: &str) -> &[SharedSnapshot] {
        self.shared.get(name).map_or(&[], |h| h.as_slice())
    }

    pub fn latest_shared_before(&self, name: &str, period: usize) -> Option<&SharedSnapshot> {
        self.shared_history(name).iter().rev().find(|s| s.period < period)
    }

    /// The latest carried joint posterior strictly before `period`.
    pub fn joint_before(&self, period: usize) -> Option<&JointPosterior> {
        self.joint.iter().rev().find(|p| p.period < period)
    }

    /// Stores a joint posterior and forgets every older one that no window
    /// starting at `horizon` or later can still reach.
    pub fn push_joint(&mut self, posterior: JointPosterior, horizon: usize) {
        debug_assert!(self.joint.last().map_or(true, |last| last.period < posterior.period));
        self.joint.push(posterior);

        if let Some(reachable) = self.joint.iter().rposition(|p| p.period < horizon) {
            self.joint.drain(..reachable);
        }
    }

    pub fn joint_posteriors(&self) -> &[JointPosterior] {
        &self.joint
    }

    pub fn remove_entity(&mut self, entity_id: EntityId) {
        self.entities.shift_remove(&entity_id);
        for posterior in &mut self.joint {
            *posterior = posterior.without_entity(entity_id);
        }
    }
}

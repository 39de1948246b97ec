use indexmap::IndexMap;

use crate::{
    config::DefaultRating,
    database::db_structs::{Contest, ContestId, Entity, EntityId},
    error::{RatingError, Result},
    model::{
        period::RatingPeriod,
        polyrating::posterior::JointPosterior,
        rating_tracker::{RatingSnapshot, RatingTracker, SharedSnapshot}
    }
};

/// Everything a rating system sees when rating one period.
pub struct PeriodInput<'a> {
    /// Every period from the first up to and including the current one.
    /// `periods[i].index == i`.
    periods: &'a [RatingPeriod],
    contests: &'a IndexMap<ContestId, Contest>,
    entities: &'a IndexMap<EntityId, Entity>,
    defaults: &'a DefaultRating
}

impl<'a> PeriodInput<'a> {
    /// Returns `None` when `periods` is empty.
    pub fn new(
        periods: &'a [RatingPeriod],
        contests: &'a IndexMap<ContestId, Contest>,
        entities: &'a IndexMap<EntityId, Entity>,
        defaults: &'a DefaultRating
    ) -> Option<PeriodInput<'a>> {
        if periods.is_empty() {
            return None;
        }

        Some(PeriodInput {
            periods,
            contests,
            entities,
            defaults
        })
    }

    pub fn current(&self) -> &'a RatingPeriod {
        &self.periods[self.periods.len() - 1]
    }

    pub fn periods(&self) -> &'a [RatingPeriod] {
        self.periods
    }

    pub fn entities(&self) -> &'a IndexMap<EntityId, Entity> {
        self.entities
    }

    pub fn defaults(&self) -> &'a DefaultRating {
        self.defaults
    }

    /// The non-forfeited contests of `period`, in period order.
    ///
    /// Fails if a contest is missing from the table or references an entity
    /// outside the population of this computation.
    pub fn rated_contests(&self, period: &RatingPeriod) -> Result<Vec<&'a Contest>> {
        let mut rated = Vec::with_capacity(period.contests.len());
        for contest_id in &period.contests {
            let contest = self
                .contests
                .get(contest_id)
                .ok_or(RatingError::UnknownContest(*contest_id))?;

            for entity_id in [contest.home, contest.away] {
                if !self.entities.contains_key(&entity_id) {
                    return Err(RatingError::UnknownEntity(entity_id));
                }
            }

            if contest.is_rated() {
                rated.push(contest);
            }
        }

        Ok(rated)
    }
}

/// Convergence diagnostics of an iterative period fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Convergence {
    pub iterations: usize,
    pub converged: bool,
    pub gradient_norm: f64
}

/// A joint posterior to keep for later windows, and the earliest window
/// start any later period can use.
#[derive(Debug, Clone)]
pub struct JointUpdate {
    pub posterior: JointPosterior,
    pub horizon: usize
}

/// New posteriors produced for one period.
#[derive(Debug, Clone, Default)]
pub struct PeriodUpdate {
    pub ratings: Vec<(EntityId, RatingSnapshot)>,
    pub shared: Vec<(String, SharedSnapshot)>,
    pub joint: Option<JointUpdate>,
    pub convergence: Option<Convergence>
}

/// A rating algorithm family.
///
/// Implementations are stateless between calls: everything they know about
/// the past comes from the read-only tracker, and everything they learn is
/// returned in the [`PeriodUpdate`]. Entities without rated contests in the
/// period are left out of the update and keep their previous snapshot.
pub trait RatingSystem: Send + Sync {
    fn name(&self) -> &str;

    fn rate_period(&self, input: &PeriodInput<'_>, tracker: &RatingTracker) -> Result<PeriodUpdate>;
}

/// The last known (rating, deviation, period) of an entity, if any.
pub fn last_rating(tracker: &RatingTracker, entity_id: EntityId) -> Option<(f64, f64, usize)> {
    tracker
        .get_rating(entity_id)
        .map(|s| (s.rating(), s.deviation(), s.period))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::structures::game_result::GameResult,
        utils::test_utils::{contest_between, entity_table, period_at}
    };

    #[test]
    fn test_rated_contests_skip_forfeits() {
        let entities = entity_table(&[1, 2]);
        let mut contests = IndexMap::new();
        contests.insert(ContestId(1), contest_between(1, 1, 2, GameResult::win()));
        contests.insert(
            ContestId(2),
            contest_between(2, 1, 2, "1-0F".parse().unwrap())
        );

        let mut period = period_at(0);
        period.contests = vec![ContestId(1), ContestId(2)];
        let periods = vec![period];
        let defaults = DefaultRating::default();

        let input = PeriodInput::new(&periods, &contests, &entities, &defaults).unwrap();
        let rated = input.rated_contests(input.current()).unwrap();

        assert_eq!(rated.len(), 1);
        assert_eq!(rated[0].id, ContestId(1));
    }

    #[test]
    fn test_rated_contests_unknown_entity() {
        let entities = entity_table(&[1]);
        let mut contests = IndexMap::new();
        contests.insert(ContestId(1), contest_between(1, 1, 2, GameResult::win()));

        let mut period = period_at(0);
        period.contests = vec![ContestId(1)];
        let periods = vec![period];
        let defaults = DefaultRating::default();

        let input = PeriodInput::new(&periods, &contests, &entities, &defaults).unwrap();

        assert!(matches!(
            input.rated_contests(input.current()),
            Err(RatingError::UnknownEntity(EntityId(2)))
        ));
    }

    #[test]
    fn test_input_requires_a_period() {
        let entities = entity_table(&[]);
        let contests = IndexMap::new();
        let defaults = DefaultRating::default();

        assert!(PeriodInput::new(&[], &contests, &entities, &defaults).is_none());
    }
}

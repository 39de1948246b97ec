use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use super::db_structs::{
    Contest, ContestId, Entity, EntityId, NewContest, Tournament, TournamentId, TournamentInfo
};
use crate::{
    config::EngineConfig,
    error::{RatingError, Result},
    model::{
        processor::{RatingProcessor, RunOutcome, RunReport},
        rating_system::RatingSystem,
        rating_tracker::{RatingSnapshot, RatingTracker},
        structures::game_result::GameResult
    }
};

/// Next id to hand out per table. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCounters {
    pub entity: u32,
    pub contest: u32,
    pub tournament: u32
}

impl Default for IdCounters {
    fn default() -> Self {
        IdCounters {
            entity: 1,
            contest: 1,
            tournament: 1
        }
    }
}

/// In-memory store of entities, contests, tournaments and the ratings
/// computed from them, one tracker per configured rating system.
#[derive(Debug, Clone)]
pub struct Database {
    pub(crate) config: EngineConfig,
    pub(crate) entities: IndexMap<EntityId, Entity>,
    pub(crate) names: HashMap<String, EntityId>,
    pub(crate) contests: IndexMap<ContestId, Contest>,
    pub(crate) tournaments: IndexMap<TournamentId, Tournament>,
    pub(crate) ratings: IndexMap<String, RatingTracker>,
    pub(crate) next_ids: IdCounters
}

impl Database {
    pub fn new(config: EngineConfig) -> Result<Database> {
        config.validate()?;

        Ok(Database {
            config,
            entities: IndexMap::new(),
            names: HashMap::new(),
            contests: IndexMap::new(),
            tournaments: IndexMap::new(),
            ratings: IndexMap::new(),
            next_ids: IdCounters::default()
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replaces the configuration. Computed ratings no longer match it and
    /// are dropped.
    pub fn set_config(&mut self, config: EngineConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.ratings.clear();

        Ok(())
    }

    pub fn entities(&self) -> &IndexMap<EntityId, Entity> {
        &self.entities
    }

    pub fn contests(&self) -> &IndexMap<ContestId, Contest> {
        &self.contests
    }

    pub fn tournaments(&self) -> &IndexMap<TournamentId, Tournament> {
        &self.tournaments
    }

    pub fn entity(&self, id: EntityId) -> Result<&Entity> {
        self.entities.get(&id).ok_or(RatingError::UnknownEntity(id))
    }

    pub fn contest(&self, id: ContestId) -> Result<&Contest> {
        self.contests.get(&id).ok_or(RatingError::UnknownContest(id))
    }

    pub fn tournament(&self, id: TournamentId) -> Result<&Tournament> {
        self.tournaments.get(&id).ok_or(RatingError::UnknownTournament(id))
    }

    // Entities

    pub fn add_entity(&mut self, name: &str) -> Result<EntityId> {
        if self.names.contains_key(name) {
            return Err(RatingError::DuplicateEntity(name.to_string()));
        }

        let id = EntityId(self.next_ids.entity);
        self.next_ids.entity += 1;
        self.entities.insert(
            id,
            Entity {
                id,
                name: name.to_string()
            }
        );
        self.names.insert(name.to_string(), id);

        Ok(id)
    }

    pub fn entity_id(&self, name: &str) -> Result<EntityId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| RatingError::UnknownEntityName(name.to_string()))
    }

    /// Looks an entity up by name, registering it on first reference.
    pub fn entity_or_insert(&mut self, name: &str) -> EntityId {
        match self.names.get(name) {
            Some(id) => *id,
            None => {
                let id = EntityId(self.next_ids.entity);
                self.next_ids.entity += 1;
                self.entities.insert(
                    id,
                    Entity {
                        id,
                        name: name.to_string()
                    }
                );
                self.names.insert(name.to_string(), id);
                id
            }
        }
    }

    /// Removes an entity together with every contest it took part in and
    /// its rating histories.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<Entity> {
        let entity = self.entities.shift_remove(&id).ok_or(RatingError::UnknownEntity(id))?;
        self.names.remove(&entity.name);

        let orphaned = self.contests.values().filter(|c| c.involves(id)).map(|c| c.id).collect_vec();
        for contest_id in &orphaned {
            self.detach_contest(*contest_id);
        }
        for tracker in self.ratings.values_mut() {
            tracker.remove_entity(id);
        }

        info!("Removed {} ({}) and {} contests", entity.name, id, orphaned.len());

        Ok(entity)
    }

    // Tournaments

    pub fn add_tournament(&mut self, info: TournamentInfo) -> TournamentId {
        let id = TournamentId(self.next_ids.tournament);
        self.next_ids.tournament += 1;
        self.tournaments.insert(
            id,
            Tournament {
                id,
                info,
                contests: Vec::new()
            }
        );

        id
    }

    /// Removes a tournament and sweeps its contests.
    pub fn remove_tournament(&mut self, id: TournamentId) -> Result<Tournament> {
        let tournament = self
            .tournaments
            .shift_remove(&id)
            .ok_or(RatingError::UnknownTournament(id))?;
        for contest_id in &tournament.contests {
            self.contests.shift_remove(contest_id);
        }

        debug!("Removed {} and {} contests", id, tournament.contests.len());

        Ok(tournament)
    }

    /// Tournament score of every participant under the results' point values,
    /// highest first. Forfeits count.
    pub fn tournament_standings(&self, id: TournamentId) -> Result<Vec<(EntityId, f64)>> {
        let tournament = self.tournament(id)?;
        let mut scores: IndexMap<EntityId, f64> = IndexMap::new();
        for contest_id in &tournament.contests {
            let contest = self.contest(*contest_id)?;
            let (home, away) = contest.result.points();
            *scores.entry(contest.home).or_default() += home;
            *scores.entry(contest.away).or_default() += away;
        }

        Ok(scores
            .into_iter()
            .sorted_by(|a, b| b.1.total_cmp(&a.1))
            .collect())
    }

    // Contests

    pub fn add_contest(&mut self, contest: NewContest) -> Result<ContestId> {
        if contest.home == contest.away {
            return Err(RatingError::InvalidContest(format!(
                "{} cannot play against itself",
                contest.home
            )));
        }
        for entity_id in [contest.home, contest.away] {
            if !self.entities.contains_key(&entity_id) {
                return Err(RatingError::UnknownEntity(entity_id));
            }
        }
        if let Some(tournament) = contest.tournament {
            if !self.tournaments.contains_key(&tournament) {
                return Err(RatingError::UnknownTournament(tournament));
            }
        }
        contest.result.validate()?;
        if let Some((name, value)) = contest
            .advantages_home
            .iter()
            .chain(contest.advantages_out.iter())
            .find(|(_, v)| !v.is_finite())
        {
            return Err(RatingError::InvalidContest(format!(
                "Advantage '{}' has non-finite value {}",
                name, value
            )));
        }

        let id = ContestId(self.next_ids.contest);
        self.next_ids.contest += 1;
        if let Some(tournament) = contest.tournament.and_then(|t| self.tournaments.get_mut(&t)) {
            tournament.contests.push(id);
        }
        self.contests.insert(
            id,
            Contest {
                id,
                home: contest.home,
                away: contest.away,
                timestamp: contest.timestamp,
                result: contest.result,
                advantages_home: contest.advantages_home,
                advantages_out: contest.advantages_out,
                tournament: contest.tournament
            }
        );

        Ok(id)
    }

    /// Records a game between two entities given by name, registering
    /// unknown names. The result uses the textual grammar, e.g. `"1-0"`,
    /// `"1/2-1/2"` or `"0-1F"`.
    pub fn record_game(
        &mut self,
        home: &str,
        away: &str,
        timestamp: DateTime<Utc>,
        result: &str
    ) -> Result<ContestId> {
        let result: GameResult = result.parse()?;
        if home == away {
            return Err(RatingError::InvalidContest(format!("'{}' cannot play against itself", home)));
        }

        let home = self.entity_or_insert(home);
        let away = self.entity_or_insert(away);
        self.add_contest(NewContest::new(home, away, timestamp, result))
    }

    pub fn remove_contest(&mut self, id: ContestId) -> Result<Contest> {
        self.detach_contest(id).ok_or(RatingError::UnknownContest(id))
    }

    fn detach_contest(&mut self, id: ContestId) -> Option<Contest> {
        let contest = self.contests.shift_remove(&id)?;
        if let Some(tournament) = contest.tournament.and_then(|t| self.tournaments.get_mut(&t)) {
            tournament.contests.retain(|c| *c != id);
        }

        Some(contest)
    }

    // Ratings

    pub fn tracker(&self, system: &str) -> Option<&RatingTracker> {
        self.ratings.get(system)
    }

    pub fn trackers(&self) -> impl Iterator<Item = &RatingTracker> {
        self.ratings.values()
    }

    /// Every snapshot of `entity` under `system`, oldest first. Empty until
    /// the system has been computed.
    pub fn rating_history(&self, system: &str, entity: EntityId) -> Result<&[RatingSnapshot]> {
        self.config.system(system)?;
        self.entity(entity)?;

        Ok(self.ratings.get(system).map_or(&[], |t| t.get_history(entity)))
    }

    pub fn current_rating(&self, system: &str, entity: EntityId) -> Result<Option<&RatingSnapshot>> {
        Ok(self.rating_history(system, entity)?.last())
    }

    fn build_system(&self, name: &str) -> Result<Box<dyn RatingSystem>> {
        Ok(self.config.system(name)?.kind.build(name))
    }

    /// Recomputes `system` over the whole history. Previous ratings are only
    /// replaced if the run succeeds.
    pub fn recompute(&mut self, system: &str) -> Result<RunReport> {
        let rating_system = self.build_system(system)?;
        let outcome = RatingProcessor::new(self).run(rating_system.as_ref())?;

        Ok(self.commit(outcome))
    }

    /// Rates only periods not yet finalized for `system`, falling back to a
    /// full recompute when nothing was computed before.
    pub fn recompute_incremental(&mut self, system: &str) -> Result<RunReport> {
        let rating_system = self.build_system(system)?;
        let outcome = match self.ratings.get(system) {
            Some(previous) => RatingProcessor::new(self).run_incremental(rating_system.as_ref(), previous)?,
            None => RatingProcessor::new(self).run(rating_system.as_ref())?
        };

        Ok(self.commit(outcome))
    }

    /// Recomputes every configured system in parallel. Nothing is committed
    /// unless all of them succeed.
    pub fn recompute_all(&mut self) -> Result<Vec<RunReport>> {
        let systems: Vec<Box<dyn RatingSystem>> = self
            .config
            .systems
            .iter()
            .map(|spec| spec.kind.build(&spec.name))
            .collect();
        let outcomes = RatingProcessor::new(self).run_all(&systems)?;

        Ok(outcomes.into_iter().map(|outcome| self.commit(outcome)).collect())
    }

    fn commit(&mut self, outcome: RunOutcome) -> RunReport {
        let RunOutcome { tracker, report } = outcome;
        self.ratings.insert(report.system.clone(), tracker);

        report
    }
}

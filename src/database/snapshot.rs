use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};
use tracing::info;

use super::{
    db::{Database, IdCounters},
    db_structs::{Contest, Entity, Tournament}
};
use crate::{
    config::EngineConfig,
    error::{RatingError, Result},
    model::rating_tracker::RatingTracker
};

pub const SNAPSHOT_VERSION: u8 = 1;

/// Serialized form of a [`Database`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: u8,
    pub config: EngineConfig,
    pub entities: Vec<Entity>,
    pub contests: Vec<Contest>,
    pub tournaments: Vec<Tournament>,
    pub ratings: Vec<RatingTracker>,
    pub next_ids: IdCounters
}

#[derive(Deserialize)]
struct VersionHeader {
    version: u8
}

impl DatabaseSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a snapshot, rejecting versions this build cannot read before
    /// looking at the rest of the document.
    pub fn from_json(json: &str) -> Result<DatabaseSnapshot> {
        let header: VersionHeader = serde_json::from_str(json)?;
        if header.version != SNAPSHOT_VERSION {
            return Err(RatingError::UnsupportedSnapshotVersion(header.version));
        }

        Ok(serde_json::from_str(json)?)
    }
}

impl Database {
    pub fn snapshot(&self) -> DatabaseSnapshot {
        DatabaseSnapshot {
            version: SNAPSHOT_VERSION,
            config: self.config.clone(),
            entities: self.entities.values().cloned().collect(),
            contests: self.contests.values().cloned().collect(),
            tournaments: self.tournaments.values().cloned().collect(),
            ratings: self.ratings.values().cloned().collect(),
            next_ids: self.next_ids
        }
    }

    /// Rebuilds a store from a snapshot, checking every reference.
    pub fn from_snapshot(snapshot: DatabaseSnapshot) -> Result<Database> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(RatingError::UnsupportedSnapshotVersion(snapshot.version));
        }

        let mut database = Database::new(snapshot.config)?;

        for entity in snapshot.entities {
            if entity.id.0 >= snapshot.next_ids.entity || database.entities.contains_key(&entity.id) {
                return Err(RatingError::InvalidConfig(format!("Snapshot has an invalid id {}", entity.id)));
            }
            if database.names.insert(entity.name.clone(), entity.id).is_some() {
                return Err(RatingError::DuplicateEntity(entity.name));
            }
            database.entities.insert(entity.id, entity);
        }

        let mut tournaments = IndexMap::new();
        for tournament in snapshot.tournaments {
            if tournament.id.0 >= snapshot.next_ids.tournament {
                return Err(RatingError::InvalidConfig(format!(
                    "Snapshot has an invalid id {}",
                    tournament.id
                )));
            }
            tournaments.insert(tournament.id, tournament);
        }

        for contest in snapshot.contests {
            if contest.id.0 >= snapshot.next_ids.contest || database.contests.contains_key(&contest.id) {
                return Err(RatingError::InvalidConfig(format!("Snapshot has an invalid id {}", contest.id)));
            }
            if contest.home == contest.away {
                return Err(RatingError::InvalidContest(format!("{} has identical sides", contest.id)));
            }
            for entity_id in [contest.home, contest.away] {
                if !database.entities.contains_key(&entity_id) {
                    return Err(RatingError::UnknownEntity(entity_id));
                }
            }
            if let Some(tournament) = contest.tournament {
                if !tournaments.contains_key(&tournament) {
                    return Err(RatingError::UnknownTournament(tournament));
                }
            }
            contest.result.validate()?;
            database.contests.insert(contest.id, contest);
        }

        for tournament in tournaments.values() {
            if let Some(missing) = tournament.contests.iter().find(|c| !database.contests.contains_key(*c)) {
                return Err(RatingError::UnknownContest(*missing));
            }
        }
        database.tournaments = tournaments;

        let mut ratings = HashMap::new();
        for tracker in snapshot.ratings {
            let name = tracker.system().to_string();
            database.config.system(&name)?;
            ratings.insert(name, tracker);
        }
        // Keep trackers in configuration order
        for spec in &database.config.systems {
            if let Some(tracker) = ratings.remove(&spec.name) {
                database.ratings.insert(spec.name.clone(), tracker);
            }
        }

        database.next_ids = snapshot.next_ids;

        Ok(database)
    }

    pub fn to_json(&self) -> Result<String> {
        self.snapshot().to_json()
    }

    pub fn from_json(json: &str) -> Result<Database> {
        Database::from_snapshot(DatabaseSnapshot::from_json(json)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json()?)?;
        info!("Saved {} entities and {} contests to {}", self.entities.len(), self.contests.len(), path.display());

        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Database> {
        let path = path.as_ref();
        let database = Database::from_json(&fs::read_to_string(path)?)?;
        info!("Loaded {} entities and {} contests from {}", database.entities.len(), database.contests.len(), path.display());

        Ok(database)
    }
}

use crate::model::structures::game_result::GameResult;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

macro_rules! id_type {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

id_type!(EntityId, "entity");
id_type!(ContestId, "contest");
id_type!(TournamentId, "tournament");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String
}

/// Advantage name -> value carried by one side of a contest
pub type Advantages = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    pub id: ContestId,
    pub home: EntityId,
    pub away: EntityId,
    pub timestamp: DateTime<Utc>,
    pub result: GameResult,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub advantages_home: Advantages,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub advantages_out: Advantages,
    pub tournament: Option<TournamentId>
}

impl Contest {
    /// Forfeits are kept for the record but never enter a likelihood.
    pub fn is_rated(&self) -> bool {
        !self.result.is_forfeit()
    }

    pub fn involves(&self, entity: EntityId) -> bool {
        self.home == entity || self.away == entity
    }

    /// Returns a copy with home and away (and their scores and advantages) exchanged.
    pub fn swapped(&self) -> Contest {
        Contest {
            home: self.away,
            away: self.home,
            result: self.result.swapped(),
            advantages_home: self.advantages_out.clone(),
            advantages_out: self.advantages_home.clone(),
            ..self.clone()
        }
    }
}

/// Input for [`crate::database::db::Database::add_contest`]. Ids are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewContest {
    pub home: EntityId,
    pub away: EntityId,
    pub timestamp: DateTime<Utc>,
    pub result: GameResult,
    pub advantages_home: Advantages,
    pub advantages_out: Advantages,
    pub tournament: Option<TournamentId>
}

impl NewContest {
    pub fn new(home: EntityId, away: EntityId, timestamp: DateTime<Utc>, result: GameResult) -> Self {
        NewContest {
            home,
            away,
            timestamp,
            result,
            advantages_home: Advantages::new(),
            advantages_out: Advantages::new(),
            tournament: None
        }
    }

    pub fn with_home_advantage(mut self, name: &str, value: f64) -> Self {
        self.advantages_home.insert(name.to_string(), value);
        self
    }

    pub fn with_away_advantage(mut self, name: &str, value: f64) -> Self {
        self.advantages_out.insert(name.to_string(), value);
        self
    }

    pub fn in_tournament(mut self, tournament: TournamentId) -> Self {
        self.tournament = Some(tournament);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentInfo {
    pub name: String,
    pub date: Option<NaiveDate>,
    pub rounds: u32,
    /// Free-form label such as "swiss" or "round robin"
    pub format: String
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    #[serde(flatten)]
    pub info: TournamentInfo,
    pub contests: Vec<ContestId>
}

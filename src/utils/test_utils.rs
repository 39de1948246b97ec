use crate::{
    config::EngineConfig,
    database::{
        db::Database,
        db_structs::{Contest, ContestId, Entity, EntityId, NewContest}
    },
    error::Result,
    model::{
        period::RatingPeriod,
        structures::game_result::GameResult
    }
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use indexmap::IndexMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Midnight UTC, `n` days after 2024-01-01.
pub fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default() + Duration::days(n)
}

/// An empty one-day period with the given index.
pub fn period_at(index: usize) -> RatingPeriod {
    RatingPeriod {
        index,
        start: day(index as i64),
        end: day(index as i64 + 1),
        contests: Vec::new()
    }
}

/// Entities named `entity<id>`.
pub fn entity_table(ids: &[u32]) -> IndexMap<EntityId, Entity> {
    ids.iter()
        .map(|id| {
            (
                EntityId(*id),
                Entity {
                    id: EntityId(*id),
                    name: format!("entity{}", id)
                }
            )
        })
        .collect()
}

pub fn contest_between(id: u32, home: u32, away: u32, result: GameResult) -> Contest {
    Contest {
        id: ContestId(id),
        home: EntityId(home),
        away: EntityId(away),
        timestamp: day(0),
        result,
        advantages_home: Default::default(),
        advantages_out: Default::default(),
        tournament: None
    }
}

/// A reproducible history: `n_entities` entities with hidden strengths
/// playing `n_contests` games spread evenly over `days` days.
///
/// Outcomes follow the logistic model on the hidden strengths, with
/// roughly one game in ten drawn.
pub fn generate_database(
    seed: u64,
    n_entities: usize,
    n_contests: usize,
    days: i64,
    config: EngineConfig
) -> Result<Database> {
    // Initialize seeded RNG for reproducible results
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut database = Database::new(config)?;

    let mut entities = Vec::with_capacity(n_entities);
    for i in 0..n_entities {
        let id = database.add_entity(&format!("entity{}", i))?;
        let strength: f64 = rng.random_range(1000.0..=2000.0);
        entities.push((id, strength));
    }

    if n_entities < 2 {
        return Ok(database);
    }

    let spacing = (days.max(1) * 86_400) / n_contests.max(1) as i64;
    for i in 0..n_contests {
        let home = rng.random_range(0..n_entities);
        let mut away = rng.random_range(0..n_entities - 1);
        if away >= home {
            away += 1;
        }

        let (home_id, home_strength) = entities[home];
        let (away_id, away_strength) = entities[away];
        let p_home = 1.0 / (1.0 + 10f64.powf((away_strength - home_strength) / 400.0));
        let roll: f64 = rng.random();
        let result = if rng.random_bool(0.1) {
            GameResult::draw()
        } else if roll < p_home {
            GameResult::win()
        } else {
            GameResult::loss()
        };

        let timestamp = day(0) + Duration::seconds(spacing * i as i64);
        database.add_contest(NewContest::new(home_id, away_id, timestamp, result))?;
    }

    Ok(database)
}

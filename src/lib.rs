//! Period-based skill ratings from pairwise contests.
//!
//! A [`Database`](database::db::Database) holds entities, contests and
//! tournaments. Its history is cut into rating periods and fed, period by
//! period, through one or more configured rating systems: Elo, Glicko,
//! Glicko-2, TrueSkill or the multivariate Polyrating model.

pub mod config;
pub mod database;
pub mod error;
pub mod model;
pub mod utils;

pub use config::{DefaultRating, EngineConfig, SystemSpec};
pub use database::{
    db::Database,
    db_structs::{ContestId, EntityId, NewContest, TournamentId, TournamentInfo},
    snapshot::DatabaseSnapshot
};
pub use error::{NonConvergenceWarning, RatingError, Result};
pub use model::{
    processor::{RatingProcessor, RunReport},
    rating_tracker::{RatingSnapshot, RatingTracker},
    structures::{game_result::GameResult, period_policy::PeriodPolicy, system_kind::RatingSystemKind}
};

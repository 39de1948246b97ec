use crate::database::db_structs::{ContestId, EntityId, TournamentId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RatingError {
    #[error("Invalid result '{input}': {reason}")]
    InvalidResult { input: String, reason: &'static str },

    #[error("Unknown entity {0}")]
    UnknownEntity(EntityId),

    #[error("Unknown entity name '{0}'")]
    UnknownEntityName(String),

    #[error("An entity named '{0}' already exists")]
    DuplicateEntity(String),

    #[error("Unknown contest {0}")]
    UnknownContest(ContestId),

    #[error("Unknown tournament {0}")]
    UnknownTournament(TournamentId),

    #[error("Invalid contest: {0}")]
    InvalidContest(String),

    #[error("No rating system named '{0}' is configured")]
    UnknownSystem(String),

    #[error("Contest {contest} falls in already finalized period {period}; a full recompute is required")]
    InconsistentPeriodOrder { contest: ContestId, period: usize },

    #[error("Numerical instability in period {period}: {reason}")]
    NumericalInstability { period: usize, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported snapshot version {0}")]
    UnsupportedSnapshotVersion(u8),

    #[error("Failed to (de)serialize snapshot: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error)
}

pub type Result<T> = std::result::Result<T, RatingError>;

/// Non-fatal: the optimizer hit its iteration cap. The last iterate was kept.
#[derive(Debug, Clone, PartialEq)]
pub struct NonConvergenceWarning {
    pub system: String,
    pub period: usize,
    pub iterations: usize,
    pub gradient_norm: f64
}

impl std::fmt::Display for NonConvergenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: period {} did not converge after {} iterations (|g| = {:e})",
            self.system, self.period, self.iterations, self.gradient_norm
        )
    }
}

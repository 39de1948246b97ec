use serde::{Deserialize, Serialize};
use std::{collections::HashSet, env, str::FromStr};
use tracing::debug;

use crate::{
    error::{RatingError, Result},
    model::{
        constants::{DEFAULT_DEVIATION, DEFAULT_MEAN},
        polyrating::{linearization::LinearizationWindow, PolyratingConfig},
        structures::{period_policy::PeriodPolicy, system_kind::RatingSystemKind}
    }
};

/// Prior of an entity that has never been rated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DefaultRating {
    pub mean: f64,
    pub deviation: f64
}

impl Default for DefaultRating {
    fn default() -> Self {
        DefaultRating {
            mean: DEFAULT_MEAN,
            deviation: DEFAULT_DEVIATION
        }
    }
}

impl DefaultRating {
    pub fn validate(&self) -> Result<()> {
        if !(self.mean.is_finite() && self.deviation.is_finite() && self.deviation > 0.0) {
            return Err(RatingError::InvalidConfig(format!(
                "Default rating needs a finite mean and a positive deviation, got {} / {}",
                self.mean, self.deviation
            )));
        }

        Ok(())
    }
}

/// A named rating system. Ratings are stored and recomputed per name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSpec {
    pub name: String,
    pub kind: RatingSystemKind
}

impl SystemSpec {
    pub fn new(name: &str, kind: RatingSystemKind) -> SystemSpec {
        SystemSpec {
            name: name.to_string(),
            kind
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub period_policy: PeriodPolicy,
    pub default_rating: DefaultRating,
    pub systems: Vec<SystemSpec>
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            period_policy: PeriodPolicy::default(),
            default_rating: DefaultRating::default(),
            systems: vec![SystemSpec::new(
                "polyrating",
                RatingSystemKind::Polyrating(PolyratingConfig::default())
            )]
        }
    }
}

fn var<T: FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| RatingError::InvalidConfig(format!("{} has an invalid value '{}'", key, value))),
        Err(_) => Ok(None)
    }
}

impl EngineConfig {
    /// Builds a configuration from the environment (and a `.env` file, if
    /// present). Unset variables keep their defaults.
    ///
    /// - `RATING_PERIOD_DAYS`, or `RATING_PERIOD_GAMES` for count-based periods
    /// - `DEFAULT_RATING_MEAN`, `DEFAULT_RATING_DEVIATION`
    /// - `POLYRATING_WINDOW` (`unbounded` or a period count),
    ///   `POLYRATING_TOLERANCE`, `POLYRATING_MAX_ITERATIONS`, `POLYRATING_OMEGA`
    pub fn from_env() -> Result<EngineConfig> {
        dotenv::dotenv().ok();

        let mut config = EngineConfig::default();

        if let Some(days) = var::<i64>("RATING_PERIOD_DAYS")? {
            config.period_policy = PeriodPolicy::days(days);
        }
        if let Some(games) = var::<usize>("RATING_PERIOD_GAMES")? {
            config.period_policy = PeriodPolicy::contests(games);
        }
        if let Some(mean) = var("DEFAULT_RATING_MEAN")? {
            config.default_rating.mean = mean;
        }
        if let Some(deviation) = var("DEFAULT_RATING_DEVIATION")? {
            config.default_rating.deviation = deviation;
        }

        let mut polyrating = PolyratingConfig::default();
        if let Some(window) = var::<LinearizationWindow>("POLYRATING_WINDOW")? {
            polyrating.window = window;
        }
        if let Some(tolerance) = var("POLYRATING_TOLERANCE")? {
            polyrating.tolerance = tolerance;
        }
        if let Some(max_iterations) = var("POLYRATING_MAX_ITERATIONS")? {
            polyrating.max_iterations = max_iterations;
        }
        if let Some(omega) = var("POLYRATING_OMEGA")? {
            polyrating.omega = omega;
        }
        config.systems = vec![SystemSpec::new("polyrating", RatingSystemKind::Polyrating(polyrating))];

        config.validate()?;
        debug!("Loaded configuration from environment: {:?}", config);

        Ok(config)
    }

    pub fn with_system(mut self, name: &str, kind: RatingSystemKind) -> Self {
        self.systems.retain(|s| s.name != name);
        self.systems.push(SystemSpec::new(name, kind));
        self
    }

    pub fn with_period_policy(mut self, policy: PeriodPolicy) -> Self {
        self.period_policy = policy;
        self
    }

    pub fn system(&self, name: &str) -> Result<&SystemSpec> {
        self.systems
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| RatingError::UnknownSystem(name.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.period_policy.validate()?;
        self.default_rating.validate()?;

        let mut names = HashSet::new();
        for system in &self.systems {
            if system.name.is_empty() || !names.insert(system.name.as_str()) {
                return Err(RatingError::InvalidConfig(format!(
                    "Rating system names must be unique and non-empty, got '{}'",
                    system.name
                )));
            }
            system.kind.validate()?;
        }

        Ok(())
    }
}

use serde::{Deserialize, Serialize};
use strum_macros::IntoStaticStr;

use crate::{
    error::Result,
    model::{
        elo::{Elo, EloConfig},
        glicko::{Glicko, GlickoConfig},
        glicko2::{Glicko2, Glicko2Config},
        polyrating::{Polyrating, PolyratingConfig},
        rating_system::RatingSystem,
        trueskill::{TrueSkill, TrueSkillConfig}
    }
};

/// A rating algorithm family together with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "family", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RatingSystemKind {
    Elo(EloConfig),
    Glicko(GlickoConfig),
    Glicko2(Glicko2Config),
    #[serde(rename = "trueskill")]
    #[strum(serialize = "trueskill")]
    TrueSkill(TrueSkillConfig),
    Polyrating(PolyratingConfig)
}

impl RatingSystemKind {
    pub fn family(&self) -> &'static str {
        self.into()
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            RatingSystemKind::Elo(config) => config.validate(),
            RatingSystemKind::Glicko(config) => config.validate(),
            RatingSystemKind::Glicko2(config) => config.validate(),
            RatingSystemKind::TrueSkill(config) => config.validate(),
            RatingSystemKind::Polyrating(config) => config.validate()
        }
    }

    pub fn build(&self, name: &str) -> Box<dyn RatingSystem> {
        match self {
            RatingSystemKind::Elo(config) => Box::new(Elo::new(name, *config)),
            RatingSystemKind::Glicko(config) => Box::new(Glicko::new(name, *config)),
            RatingSystemKind::Glicko2(config) => Box::new(Glicko2::new(name, *config)),
            RatingSystemKind::TrueSkill(config) => Box::new(TrueSkill::new(name, *config)),
            RatingSystemKind::Polyrating(config) => Box::new(Polyrating::new(name, config.clone()))
        }
    }
}

use polyrating::{
    model::{
        elo::EloConfig,
        glicko::GlickoConfig,
        glicko2::Glicko2Config,
        polyrating::{likelihood::LikelihoodKind, PolyratingConfig},
        trueskill::TrueSkillConfig
    },
    utils::logging::init_tracing,
    Database, EngineConfig, PeriodPolicy, RatingSystemKind
};
use std::sync::Once;
use strum::IntoEnumIterator;

static INIT: Once = Once::new();

/// Initialize test environment with RUST_LOG=WARN
pub fn init_test_env() {
    INIT.call_once(|| {
        std::env::set_var("RUST_LOG", "warn");
        init_tracing();
    });
}

/// Every family once, plus Polyrating under each likelihood.
pub fn all_systems() -> Vec<(String, RatingSystemKind)> {
    let mut systems = vec![
        ("elo".to_string(), RatingSystemKind::Elo(EloConfig::default())),
        ("glicko".to_string(), RatingSystemKind::Glicko(GlickoConfig::default())),
        ("glicko2".to_string(), RatingSystemKind::Glicko2(Glicko2Config::default())),
        ("trueskill".to_string(), RatingSystemKind::TrueSkill(TrueSkillConfig::default()))
    ];
    for kind in LikelihoodKind::iter() {
        systems.push((
            format!("polyrating-{}", kind),
            RatingSystemKind::Polyrating(PolyratingConfig::default().with_likelihood(kind.with_defaults()))
        ));
    }

    systems
}

pub fn database_with(policy: PeriodPolicy, systems: Vec<(String, RatingSystemKind)>) -> Database {
    let mut config = EngineConfig::default().with_period_policy(policy);
    config.systems.clear();
    for (name, kind) in systems {
        config = config.with_system(&name, kind);
    }

    Database::new(config).unwrap()
}

pub fn polyrating_database(policy: PeriodPolicy, config: PolyratingConfig) -> Database {
    database_with(policy, vec![("polyrating".to_string(), RatingSystemKind::Polyrating(config))])
}

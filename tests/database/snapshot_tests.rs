use crate::common::{all_systems, init_test_env};
use polyrating::{
    model::polyrating::{
        advantage::{AdvantagePrior, AdvantageSpec, EntityMatcher},
        PolyratingConfig
    },
    utils::test_utils::{day, generate_database},
    Database, DatabaseSnapshot, EngineConfig, NewContest, PeriodPolicy, RatingError, RatingSystemKind,
    TournamentInfo
};
use std::{env, fs, path::PathBuf};

fn temp_path(name: &str) -> PathBuf {
    env::temp_dir().join(format!("polyrating-{}-{}.json", name, std::process::id()))
}

#[test]
fn test_save_and_load() {
    init_test_env();

    let mut config = EngineConfig::default().with_period_policy(PeriodPolicy::days(7));
    for (name, kind) in all_systems() {
        config = config.with_system(&name, kind);
    }
    let mut db = generate_database(5, 6, 30, 21, config).unwrap();
    let tournament = db.add_tournament(TournamentInfo {
        name: "Autumn Open".to_string(),
        date: Some(day(22).date_naive()),
        rounds: 1,
        format: "swiss".to_string()
    });
    let ids: Vec<_> = db.entities().keys().copied().take(2).collect();
    db.add_contest(
        NewContest::new(ids[0], ids[1], day(22), "1-0".parse().unwrap())
            .with_home_advantage("white", 1.0)
            .in_tournament(tournament)
    )
    .unwrap();
    db.recompute_all().unwrap();

    let path = temp_path("save-load");
    db.save(&path).unwrap();
    let loaded = Database::load(&path);
    fs::remove_file(&path).ok();
    let loaded = loaded.unwrap();

    assert_eq!(loaded.snapshot(), db.snapshot());
    assert_eq!(loaded.config(), db.config());

    // Ids keep counting where the saved store stopped
    let mut loaded = loaded;
    let next = loaded.add_entity("newcomer").unwrap();
    assert!(db.entities().keys().all(|id| id.0 < next.0));
}

#[test]
fn test_config_survives_json() {
    let home = AdvantageSpec::shared(
        "home",
        AdvantagePrior {
            mean: 10.0,
            deviation: 30.0
        },
        EntityMatcher::Names(vec!["A".to_string()])
    )
    .with_omega(2.0);
    let config = EngineConfig::default().with_system(
        "polyrating",
        RatingSystemKind::Polyrating(PolyratingConfig::default().with_omega(25.0).with_advantage(home))
    );
    let mut db = Database::new(config).unwrap();
    db.add_entity("A").unwrap();

    let restored = Database::from_json(&db.to_json().unwrap()).unwrap();

    assert_eq!(restored.config(), db.config());
}

#[test]
fn test_load_rejects_unknown_version() {
    init_test_env();

    let db = Database::new(EngineConfig::default()).unwrap();
    let mut snapshot = db.snapshot();
    snapshot.version = 2;
    let json = snapshot.to_json().unwrap();

    assert!(matches!(
        DatabaseSnapshot::from_json(&json),
        Err(RatingError::UnsupportedSnapshotVersion(2))
    ));
    assert!(matches!(
        Database::from_snapshot(snapshot),
        Err(RatingError::UnsupportedSnapshotVersion(2))
    ));
}

#[test]
fn test_load_rejects_malformed_input() {
    let path = temp_path("malformed");
    fs::write(&path, "{ not json").unwrap();
    let result = Database::load(&path);
    fs::remove_file(&path).ok();

    assert!(matches!(result, Err(RatingError::Serialization(_))));
    assert!(matches!(
        Database::load(temp_path("missing")),
        Err(RatingError::Io(_))
    ));
}

#[test]
fn test_load_rejects_ratings_of_unknown_system() {
    let mut db = Database::new(EngineConfig::default()).unwrap();
    db.record_game("A", "B", day(0), "1-0").unwrap();
    db.recompute("polyrating").unwrap();

    let mut snapshot = db.snapshot();
    snapshot.config.systems.clear();

    assert!(matches!(
        Database::from_snapshot(snapshot),
        Err(RatingError::UnknownSystem(_))
    ));
}

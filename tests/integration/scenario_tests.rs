use crate::common::{all_systems, init_test_env, polyrating_database};
use approx::assert_abs_diff_eq;
use polyrating::{
    model::polyrating::{
        advantage::{AdvantagePrior, AdvantageSpec, EntityMatcher},
        likelihood::LikelihoodKind,
        PolyratingConfig
    },
    utils::test_utils::day,
    Database, EngineConfig, NewContest, PeriodPolicy, RatingError
};
use strum::IntoEnumIterator;

#[test]
fn test_three_entities_single_period() {
    init_test_env();

    for kind in LikelihoodKind::iter() {
        let config = PolyratingConfig::default().with_likelihood(kind.with_defaults());
        let mut db = polyrating_database(PeriodPolicy::days(30), config);
        db.record_game("A", "B", day(0), "1-0").unwrap();
        db.record_game("A", "C", day(1), "1-0").unwrap();
        db.record_game("B", "C", day(2), "1/2-1/2").unwrap();

        let report = db.recompute("polyrating").unwrap();
        assert_eq!(report.periods_processed, 1);
        assert!(report.warnings.is_empty(), "{}: {:?}", kind, report.warnings);

        let rating = |name: &str| {
            db.current_rating("polyrating", db.entity_id(name).unwrap())
                .unwrap()
                .unwrap()
                .clone()
        };
        let (a, b, c) = (rating("A"), rating("B"), rating("C"));

        assert!(a.rating() > b.rating(), "{}", kind);
        assert!(a.rating() > c.rating(), "{}", kind);
        assert!(a.rating() > 1500.0, "{}", kind);
        assert!(b.rating() < 1500.0, "{}", kind);
        assert_abs_diff_eq!(b.rating(), c.rating(), epsilon = 1e-3);
        assert_abs_diff_eq!(b.deviation(), c.deviation(), epsilon = 1e-3);
        for snapshot in [&a, &b, &c] {
            assert!(snapshot.deviation() > 0.0 && snapshot.deviation() < 500.0, "{}", kind);
            assert_eq!(snapshot.period, 0);
        }
    }
}

#[test]
fn test_forfeits_do_not_affect_ratings() {
    init_test_env();

    for (name, kind) in all_systems() {
        let config = EngineConfig::default().with_system(&name, kind);
        let mut with_forfeit = Database::new(config.clone()).unwrap();
        let mut without = Database::new(config).unwrap();

        for db in [&mut with_forfeit, &mut without] {
            for entity in ["A", "B", "C", "D"] {
                db.add_entity(entity).unwrap();
            }
        }

        with_forfeit.record_game("A", "B", day(0), "1-0").unwrap();
        with_forfeit.record_game("A", "C", day(1), "1-0F").unwrap();
        with_forfeit.record_game("D", "A", day(2), "0-1F").unwrap();
        with_forfeit.record_game("B", "C", day(3), "2-1").unwrap();

        without.record_game("A", "B", day(0), "1-0").unwrap();
        without.record_game("B", "C", day(3), "2-1").unwrap();

        with_forfeit.recompute(&name).unwrap();
        without.recompute(&name).unwrap();

        for entity in ["A", "B", "C"] {
            let id = without.entity_id(entity).unwrap();
            let expected = without.current_rating(&name, id).unwrap().unwrap();
            let actual = with_forfeit.current_rating(&name, id).unwrap().unwrap();

            assert_abs_diff_eq!(actual.rating(), expected.rating(), epsilon = 1e-9);
            assert_abs_diff_eq!(actual.deviation(), expected.deviation(), epsilon = 1e-9);
        }

        // D only ever forfeited
        let d = with_forfeit.entity_id("D").unwrap();
        assert!(with_forfeit.rating_history(&name, d).unwrap().is_empty(), "{}", name);
    }
}

#[test]
fn test_shared_home_advantage() {
    init_test_env();

    let home = AdvantageSpec::shared(
        "home",
        AdvantagePrior {
            mean: 0.0,
            deviation: 50.0
        },
        EntityMatcher::Names(vec!["A".to_string()])
    );
    let mut db = polyrating_database(
        PeriodPolicy::days(30),
        PolyratingConfig::default().with_advantage(home)
    );
    let a = db.add_entity("A").unwrap();
    let b = db.add_entity("B").unwrap();

    db.add_contest(NewContest::new(a, b, day(0), "1-0".parse().unwrap()).with_home_advantage("home", 1.0))
        .unwrap();
    // B is not matched, so carrying the advantage has no effect
    db.add_contest(NewContest::new(b, a, day(1), "1/2-1/2".parse().unwrap()).with_home_advantage("home", 1.0))
        .unwrap();

    db.recompute("polyrating").unwrap();

    let a_rating = db.current_rating("polyrating", a).unwrap().unwrap();
    let b_rating = db.current_rating("polyrating", b).unwrap().unwrap();
    let a_home = a_rating.component("home").unwrap();

    assert!(a_home.mean > 0.0);
    assert!(a_home.deviation < 50.0);
    assert!(b_rating.component("home").is_none());
    assert_eq!(a_rating.components.len(), 2);

    let shared = db.tracker("polyrating").unwrap().shared_history("home");
    assert_eq!(shared.len(), 1);
    assert_abs_diff_eq!(shared[0].mean, a_home.mean, epsilon = 1e-9);
}

#[test]
fn test_individual_advantage_components() {
    init_test_env();

    let white = AdvantageSpec::individual("white", AdvantagePrior::default());
    let mut db = polyrating_database(
        PeriodPolicy::days(30),
        PolyratingConfig::default().with_advantage(white)
    );
    let a = db.add_entity("A").unwrap();
    let b = db.add_entity("B").unwrap();
    for i in 0..4 {
        db.add_contest(NewContest::new(a, b, day(i), "1-0".parse().unwrap()).with_home_advantage("white", 1.0))
            .unwrap();
    }

    db.recompute("polyrating").unwrap();

    let a_rating = db.current_rating("polyrating", a).unwrap().unwrap();
    let b_rating = db.current_rating("polyrating", b).unwrap().unwrap();

    // Only A ever played white
    assert!(a_rating.component("white").unwrap().mean > 0.0);
    assert!(b_rating.component("white").is_none());
    assert!(a_rating.rating() > b_rating.rating());
}

#[test]
fn test_unknown_matcher_entity() {
    init_test_env();

    let ghost = AdvantageSpec::shared(
        "home",
        AdvantagePrior::default(),
        EntityMatcher::Names(vec!["ghost".to_string()])
    );
    let mut db = polyrating_database(
        PeriodPolicy::days(30),
        PolyratingConfig::default().with_advantage(ghost)
    );
    db.record_game("A", "B", day(0), "1-0").unwrap();

    let result = db.recompute("polyrating");

    assert!(matches!(result, Err(RatingError::UnknownEntityName(name)) if name == "ghost"));
    assert!(db.tracker("polyrating").is_none());
}

#[test]
fn test_numerical_instability_keeps_previous_ratings() {
    init_test_env();

    let boost = AdvantageSpec::individual("boost", AdvantagePrior::default());
    let mut db = polyrating_database(
        PeriodPolicy::days(1),
        PolyratingConfig::default().with_advantage(boost)
    );
    db.record_game("A", "B", day(0), "1-0").unwrap();
    db.recompute("polyrating").unwrap();
    let before = db.tracker("polyrating").unwrap().clone();

    let a = db.entity_id("A").unwrap();
    let b = db.entity_id("B").unwrap();
    db.add_contest(NewContest::new(a, b, day(1), "1-0".parse().unwrap()).with_home_advantage("boost", 1e300))
        .unwrap();

    let result = db.recompute("polyrating");

    assert!(matches!(result, Err(RatingError::NumericalInstability { period: 1, .. })));
    assert_eq!(db.tracker("polyrating").unwrap(), &before);
}

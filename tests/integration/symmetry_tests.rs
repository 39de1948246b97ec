use crate::common::{all_systems, database_with, init_test_env};
use approx::assert_abs_diff_eq;
use polyrating::{utils::test_utils::day, Database, EntityId, GameResult, NewContest, PeriodPolicy};

/// (home, away, day, home points, away points)
const GAMES: [(usize, usize, i64, f64, f64); 8] = [
    (0, 1, 0, 1.0, 0.0),
    (1, 2, 1, 0.5, 0.5),
    (2, 3, 2, 3.0, 1.0),
    (3, 0, 3, 0.0, 1.0),
    (0, 2, 8, 2.0, 2.0),
    (1, 3, 9, 1.0, 0.0),
    (3, 2, 10, 1.0, 4.0),
    (0, 1, 11, 0.0, 1.0)
];

fn populate(db: &mut Database, swap: bool) -> Vec<EntityId> {
    let ids: Vec<EntityId> = ["A", "B", "C", "D"]
        .iter()
        .map(|name| db.add_entity(name).unwrap())
        .collect();

    for (home, away, when, home_points, away_points) in GAMES {
        let result = GameResult::new(home_points, away_points).unwrap();
        let contest = if swap {
            NewContest::new(ids[away], ids[home], day(when), result.swapped())
        } else {
            NewContest::new(ids[home], ids[away], day(when), result)
        };
        db.add_contest(contest).unwrap();
    }

    ids
}

#[test]
fn test_swapping_sides_leaves_ratings_unchanged() {
    init_test_env();

    for (name, kind) in all_systems() {
        let systems = vec![(name.clone(), kind)];
        let mut original = database_with(PeriodPolicy::days(7), systems.clone());
        let mut swapped = database_with(PeriodPolicy::days(7), systems);
        let ids = populate(&mut original, false);
        populate(&mut swapped, true);

        original.recompute(&name).unwrap();
        swapped.recompute(&name).unwrap();

        for id in ids {
            let expected = original.rating_history(&name, id).unwrap();
            let actual = swapped.rating_history(&name, id).unwrap();
            assert_eq!(expected.len(), actual.len(), "{}", name);

            for (e, a) in expected.iter().zip(actual) {
                assert_eq!(e.period, a.period);
                assert_abs_diff_eq!(e.rating(), a.rating(), epsilon = 1e-4);
                assert_abs_diff_eq!(e.deviation(), a.deviation(), epsilon = 1e-4);
            }
        }
    }
}

#[test]
fn test_symmetric_evidence_keeps_entities_level() {
    init_test_env();

    for (name, kind) in all_systems() {
        let mut db = database_with(PeriodPolicy::days(30), vec![(name.clone(), kind)]);
        db.record_game("A", "B", day(0), "1/2-1/2").unwrap();
        db.recompute(&name).unwrap();

        let a = db.current_rating(&name, db.entity_id("A").unwrap()).unwrap().unwrap();
        let b = db.current_rating(&name, db.entity_id("B").unwrap()).unwrap().unwrap();

        assert_abs_diff_eq!(a.rating(), 1500.0, epsilon = 1e-6);
        assert_abs_diff_eq!(b.rating(), 1500.0, epsilon = 1e-6);
        assert_abs_diff_eq!(a.deviation(), b.deviation(), epsilon = 1e-6);
    }
}

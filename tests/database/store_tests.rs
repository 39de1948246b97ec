use crate::common::{database_with, init_test_env};
use polyrating::{
    model::{elo::EloConfig, polyrating::PolyratingConfig},
    utils::test_utils::day,
    PeriodPolicy, RatingSystemKind
};

fn two_systems() -> Vec<(String, RatingSystemKind)> {
    vec![
        ("elo".to_string(), RatingSystemKind::Elo(EloConfig::default())),
        (
            "polyrating".to_string(),
            RatingSystemKind::Polyrating(PolyratingConfig::default())
        )
    ]
}

#[test]
fn test_history_is_kept_per_system() {
    init_test_env();

    let mut db = database_with(PeriodPolicy::days(1), two_systems());
    db.record_game("A", "B", day(0), "1-0").unwrap();
    db.record_game("A", "B", day(2), "1-0").unwrap();
    db.recompute("elo").unwrap();

    let a = db.entity_id("A").unwrap();
    let elo = db.rating_history("elo", a).unwrap();
    assert_eq!(elo.iter().map(|s| s.period).collect::<Vec<_>>(), vec![0, 2]);
    assert!(elo[1].rating() > elo[0].rating());
    assert!(db.rating_history("polyrating", a).unwrap().is_empty());

    db.recompute("polyrating").unwrap();
    let polyrating = db.rating_history("polyrating", a).unwrap();
    assert_eq!(polyrating.len(), 2);
    assert!(polyrating[1].rating() > 1500.0);
    // The empty day in between is still a period
    assert_eq!(db.tracker("polyrating").unwrap().periods().len(), 3);
}

#[test]
fn test_count_policy_periods() {
    init_test_env();

    let mut db = database_with(PeriodPolicy::contests(2), two_systems());
    for i in 0..5 {
        db.record_game("A", "B", day(i), "1-0").unwrap();
    }

    let reports = db.recompute_all().unwrap();

    assert!(reports.iter().all(|r| r.periods_processed == 3));
    let tracker = db.tracker("elo").unwrap();
    assert_eq!(
        tracker.periods().iter().map(|p| p.contests.len()).collect::<Vec<_>>(),
        vec![2, 2, 1]
    );
}

#[test]
fn test_removed_contests_leave_no_trace_after_recompute() {
    init_test_env();

    let mut db = database_with(PeriodPolicy::days(30), two_systems());
    db.record_game("A", "B", day(0), "1-0").unwrap();
    let upset = db.record_game("C", "A", day(1), "1-0").unwrap();
    db.recompute_all().unwrap();
    let c = db.entity_id("C").unwrap();
    assert!(db.current_rating("polyrating", c).unwrap().is_some());

    db.remove_contest(upset).unwrap();
    db.recompute_all().unwrap();

    assert!(db.current_rating("polyrating", c).unwrap().is_none());
    assert!(db.current_rating("elo", c).unwrap().is_none());
}

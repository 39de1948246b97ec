use crate::common::{all_systems, database_with, init_test_env, polyrating_database};
use approx::assert_abs_diff_eq;
use polyrating::{
    model::polyrating::{likelihood::LikelihoodKind, linearization::LinearizationWindow, PolyratingConfig},
    utils::test_utils::{day, generate_database},
    EngineConfig, PeriodPolicy, RatingError, RatingSystemKind
};

fn windowed(seed: u64, window: LinearizationWindow) -> polyrating::Database {
    windowed_with(seed, LikelihoodKind::CrossEntropy, window)
}

fn windowed_with(seed: u64, likelihood: LikelihoodKind, window: LinearizationWindow) -> polyrating::Database {
    let polyrating = PolyratingConfig::default()
        .with_likelihood(likelihood.with_defaults())
        .with_omega(400.0)
        .with_window(window);
    let config = EngineConfig::default()
        .with_period_policy(PeriodPolicy::days(10))
        .with_system("polyrating", RatingSystemKind::Polyrating(polyrating));
    let mut db = generate_database(seed, 12, 120, 60, config).unwrap();
    db.recompute("polyrating").unwrap();
    db
}

#[test]
fn test_idle_entity_keeps_its_rating() {
    init_test_env();

    let mut db = polyrating_database(PeriodPolicy::days(1), PolyratingConfig::default());
    db.record_game("A", "D", day(0), "1-0").unwrap();
    db.record_game("A", "B", day(0), "1-0").unwrap();
    db.record_game("B", "C", day(1), "1-0").unwrap();
    db.record_game("C", "B", day(2), "1/2-1/2").unwrap();

    let report = db.recompute("polyrating").unwrap();
    assert_eq!(report.periods_processed, 3);

    let d = db.entity_id("D").unwrap();
    let history = db.rating_history("polyrating", d).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].period, 0);

    // A played only in the first period as well
    let a = db.entity_id("A").unwrap();
    let first = db.current_rating("polyrating", a).unwrap().unwrap().clone();
    db.record_game("B", "C", day(3), "0-1").unwrap();
    db.recompute_incremental("polyrating").unwrap();
    assert_eq!(db.current_rating("polyrating", a).unwrap().unwrap(), &first);
}

#[test]
fn test_window_wider_than_history_matches_unbounded() {
    init_test_env();

    let unbounded = windowed(7, LinearizationWindow::Unbounded);
    let wide = windowed(7, LinearizationWindow::Periods(6));
    let wider = windowed(7, LinearizationWindow::Periods(50));
    assert_eq!(unbounded.tracker("polyrating").unwrap().periods().len(), 6);

    for id in unbounded.entities().keys() {
        let expected = unbounded.rating_history("polyrating", *id).unwrap();
        for other in [&wide, &wider] {
            let actual = other.rating_history("polyrating", *id).unwrap();
            assert_eq!(expected.len(), actual.len());
            for (e, a) in expected.iter().zip(actual) {
                assert_abs_diff_eq!(e.rating(), a.rating(), epsilon = 1e-9);
                assert_abs_diff_eq!(e.deviation(), a.deviation(), epsilon = 1e-9);
            }
        }
    }
}

/// Summed absolute rating difference over every snapshot, and the number of
/// snapshots compared.
fn distance(expected: &polyrating::Database, actual: &polyrating::Database) -> (f64, usize) {
    let mut total = 0.0;
    let mut count = 0;
    for id in expected.entities().keys() {
        let expected = expected.rating_history("polyrating", *id).unwrap();
        let actual = actual.rating_history("polyrating", *id).unwrap();
        assert_eq!(expected.len(), actual.len());
        for (e, a) in expected.iter().zip(actual) {
            total += (e.rating() - a.rating()).abs();
            count += 1;
        }
    }
    (total, count)
}

#[test]
fn test_wider_window_never_moves_away_from_joint_fit() {
    init_test_env();

    let unbounded = windowed_with(7, LikelihoodKind::Accuracy, LinearizationWindow::Unbounded);
    let distances: Vec<f64> = (1..=6)
        .map(|k| distance(&unbounded, &windowed_with(7, LikelihoodKind::Accuracy, LinearizationWindow::Periods(k))).0)
        .collect();

    for pair in distances.windows(2) {
        assert!(pair[1] <= pair[0] + 1e-6, "distances {:?}", distances);
    }
    // Gaussian likelihood: the carried joint posterior is exact at every k
    assert!(distances.iter().all(|d| *d < 1e-6), "distances {:?}", distances);
}

#[test]
fn test_bounded_window_stays_close_to_joint_fit() {
    init_test_env();

    let unbounded = windowed(7, LinearizationWindow::Unbounded);
    for k in 1..=5 {
        let (total, count) = distance(&unbounded, &windowed(7, LinearizationWindow::Periods(k)));
        assert!(count > 0);
        assert!(total / (count as f64) < 2.0, "k = {}: mean difference {}", k, total / count as f64);
    }
}

#[test]
fn test_filtering_window_rates_every_period() {
    init_test_env();

    let filtered = windowed(11, LinearizationWindow::Periods(1));
    let tracker = filtered.tracker("polyrating").unwrap();

    assert_eq!(tracker.periods().len(), 6);
    for id in tracker.entity_ids() {
        for snapshot in tracker.get_history(id) {
            assert!(snapshot.rating().is_finite());
            assert!(snapshot.deviation() > 0.0 && snapshot.deviation() < 500.0);
        }
    }
}

#[test]
fn test_iteration_cap_reports_warnings() {
    init_test_env();

    let mut config = PolyratingConfig::default();
    config.max_iterations = 1;
    config.tolerance = 1e-14;
    let mut db = polyrating_database(PeriodPolicy::days(1), config);
    for i in 0..3 {
        db.record_game("A", "B", day(i), "1-0").unwrap();
        db.record_game("A", "C", day(i), "1-0").unwrap();
    }

    let report = db.recompute("polyrating").unwrap();

    assert_eq!(report.periods_processed, 3);
    assert_eq!(report.warnings.len(), 3);
    assert!(report.warnings.iter().all(|w| w.iterations == 1 && w.system == "polyrating"));
    // The last iterate is still committed
    let a = db.entity_id("A").unwrap();
    assert_eq!(db.rating_history("polyrating", a).unwrap().len(), 3);
}

#[test]
fn test_incremental_matches_full_recompute() {
    init_test_env();

    for (name, kind) in all_systems() {
        let mut db = database_with(PeriodPolicy::days(1), vec![(name.clone(), kind)]);
        db.record_game("A", "B", day(0), "1-0").unwrap();
        db.record_game("B", "C", day(1), "1-0").unwrap();
        db.recompute(&name).unwrap();

        db.record_game("C", "A", day(2), "1-0").unwrap();
        db.record_game("A", "B", day(3), "1/2-1/2").unwrap();
        let report = db.recompute_incremental(&name).unwrap();
        assert_eq!(report.periods_processed, 2, "{}", name);
        let incremental = db.tracker(&name).unwrap().clone();

        db.recompute(&name).unwrap();
        let full = db.tracker(&name).unwrap();

        assert_eq!(incremental.periods(), full.periods());
        for id in full.entity_ids() {
            let expected = full.get_history(id);
            let actual = incremental.get_history(id);
            assert_eq!(expected.len(), actual.len(), "{}", name);
            for (e, a) in expected.iter().zip(actual) {
                assert_abs_diff_eq!(e.rating(), a.rating(), epsilon = 1e-9);
                assert_abs_diff_eq!(e.deviation(), a.deviation(), epsilon = 1e-9);
            }
        }
    }
}

#[test]
fn test_incremental_rejects_changes_in_finalized_periods() {
    init_test_env();

    let mut db = polyrating_database(PeriodPolicy::days(1), PolyratingConfig::default());
    db.record_game("A", "B", day(0), "1-0").unwrap();
    db.record_game("B", "C", day(1), "1-0").unwrap();
    db.record_game("C", "A", day(2), "1-0").unwrap();
    db.recompute("polyrating").unwrap();
    let before = db.tracker("polyrating").unwrap().clone();

    let late = db
        .record_game("A", "C", day(1) + chrono::Duration::hours(6), "0-1")
        .unwrap();
    let result = db.recompute_incremental("polyrating");

    assert!(matches!(
        result,
        Err(RatingError::InconsistentPeriodOrder { contest, period: 1 }) if contest == late
    ));
    assert_eq!(db.tracker("polyrating").unwrap(), &before);

    // A full recompute picks the contest up
    db.recompute("polyrating").unwrap();
    assert_eq!(db.tracker("polyrating").unwrap().periods()[1].contests.len(), 2);
}

#[test]
fn test_incremental_rejects_removed_contests() {
    init_test_env();

    let mut db = polyrating_database(PeriodPolicy::days(1), PolyratingConfig::default());
    db.record_game("A", "B", day(0), "1-0").unwrap();
    let removed = db.record_game("B", "C", day(0), "1-0").unwrap();
    db.record_game("C", "A", day(1), "1-0").unwrap();
    db.recompute("polyrating").unwrap();

    db.remove_contest(removed).unwrap();

    assert!(matches!(
        db.recompute_incremental("polyrating"),
        Err(RatingError::InconsistentPeriodOrder { contest, period: 0 }) if contest == removed
    ));
}

#[test]
fn test_recompute_all_runs_every_system() {
    init_test_env();

    let systems = all_systems();
    let mut config = EngineConfig::default().with_period_policy(PeriodPolicy::days(5));
    config.systems.clear();
    for (name, kind) in &systems {
        config = config.with_system(name, kind.clone());
    }
    let mut db = generate_database(3, 8, 60, 20, config).unwrap();

    let reports = db.recompute_all().unwrap();

    assert_eq!(reports.len(), systems.len());
    for ((name, _), report) in systems.iter().zip(&reports) {
        assert_eq!(&report.system, name);
        assert_eq!(report.periods_processed, 4);
    }

    // Parallel and sequential runs agree
    let parallel: Vec<_> = db.trackers().cloned().collect();
    for (name, _) in &systems {
        db.recompute(name).unwrap();
    }
    let sequential: Vec<_> = db.trackers().cloned().collect();
    assert_eq!(parallel, sequential);
}

#[test]
fn test_unknown_system() {
    init_test_env();

    let mut db = polyrating_database(PeriodPolicy::days(1), PolyratingConfig::default());
    db.record_game("A", "B", day(0), "1-0").unwrap();

    assert!(matches!(db.recompute("glicko"), Err(RatingError::UnknownSystem(_))));
    assert!(matches!(
        db.rating_history("glicko", db.entity_id("A").unwrap()),
        Err(RatingError::UnknownSystem(_))
    ));
}

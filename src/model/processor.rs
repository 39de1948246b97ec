use indexmap::IndexMap;
use itertools::Itertools;
use rayon::prelude::*;
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::{
    config::DefaultRating,
    database::{
        db::Database,
        db_structs::{Contest, ContestId, Entity, EntityId}
    },
    error::{NonConvergenceWarning, RatingError, Result},
    model::{
        period::{partition, RatingPeriod},
        rating_system::{PeriodInput, RatingSystem},
        rating_tracker::RatingTracker,
        structures::period_policy::PeriodPolicy
    },
    utils::progress_utils::progress_bar
};

/// Summary of one rating run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub system: String,
    pub periods_processed: usize,
    pub warnings: Vec<NonConvergenceWarning>
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub tracker: RatingTracker,
    pub report: RunReport
}

/// Drives rating systems over the contest history of a store.
///
/// Periods are rated strictly in order, each against the snapshots left by
/// the ones before. The processor only reads the store; results are
/// returned in a fresh tracker so a failed run never leaves partial output
/// behind.
pub struct RatingProcessor<'a> {
    contests: &'a IndexMap<ContestId, Contest>,
    entities: &'a IndexMap<EntityId, Entity>,
    policy: &'a PeriodPolicy,
    defaults: &'a DefaultRating
}

impl<'a> RatingProcessor<'a> {
    pub fn new(database: &'a Database) -> RatingProcessor<'a> {
        RatingProcessor {
            contests: database.contests(),
            entities: database.entities(),
            policy: &database.config().period_policy,
            defaults: &database.config().default_rating
        }
    }

    fn periods(&self) -> Result<Vec<RatingPeriod>> {
        Ok(partition(self.contests.values(), self.policy)?.collect_vec())
    }

    /// Rates the whole history from scratch.
    pub fn run(&self, system: &dyn RatingSystem) -> Result<RunOutcome> {
        let periods = self.periods()?;
        self.run_from(system, &periods, RatingTracker::new(system.name()))
    }

    /// Rates only the periods `previous` has not seen yet.
    ///
    /// Fails with [`RatingError::InconsistentPeriodOrder`] when the history
    /// changed inside a period `previous` already finalized.
    pub fn run_incremental(&self, system: &dyn RatingSystem, previous: &RatingTracker) -> Result<RunOutcome> {
        let periods = self.periods()?;

        for finalized in previous.periods() {
            let recorded: BTreeSet<ContestId> = finalized.contests.iter().copied().collect();
            let current: BTreeSet<ContestId> = periods
                .get(finalized.index)
                .map(|p| p.contests.iter().copied().collect())
                .unwrap_or_default();

            if let Some(contest) = current.symmetric_difference(&recorded).next() {
                return Err(RatingError::InconsistentPeriodOrder {
                    contest: *contest,
                    period: finalized.index
                });
            }
        }

        self.run_from(system, &periods, previous.clone())
    }

    fn run_from(
        &self,
        system: &dyn RatingSystem,
        periods: &[RatingPeriod],
        mut tracker: RatingTracker
    ) -> Result<RunOutcome> {
        let first = tracker.periods().len();
        let pending = periods.len().saturating_sub(first);
        info!(
            "{}: rating {} periods ({} already finalized)",
            system.name(),
            pending,
            first
        );

        let bar = progress_bar(pending as u64, format!("Rating periods ({})", system.name()));
        let mut warnings = Vec::new();

        for i in first..periods.len() {
            let Some(input) = PeriodInput::new(&periods[..=i], self.contests, self.entities, self.defaults) else {
                continue;
            };
            let update = system.rate_period(&input, &tracker)?;

            if let Some(convergence) = update.convergence {
                if !convergence.converged {
                    let warning = NonConvergenceWarning {
                        system: system.name().to_string(),
                        period: i,
                        iterations: convergence.iterations,
                        gradient_norm: convergence.gradient_norm
                    };
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }

            tracker.insert_period(periods[i].clone(), update.ratings, update.shared);
            if let Some(joint) = update.joint {
                tracker.push_joint(joint.posterior, joint.horizon);
            }

            if let Some(bar) = &bar {
                bar.inc(1);
            }
        }

        if let Some(bar) = bar {
            bar.finish_and_clear();
        }

        info!("{}: done, {} warnings", system.name(), warnings.len());

        Ok(RunOutcome {
            tracker,
            report: RunReport {
                system: system.name().to_string(),
                periods_processed: pending,
                warnings
            }
        })
    }

    /// Runs independent rating systems in parallel. Either every run
    /// succeeds or the first error is returned.
    pub fn run_all(&self, systems: &[Box<dyn RatingSystem>]) -> Result<Vec<RunOutcome>> {
        systems.par_iter().map(|system| self.run(system.as_ref())).collect()
    }
}

use crate::{
    database::db_structs::{Contest, ContestId},
    error::{RatingError, Result},
    model::structures::period_policy::PeriodPolicy
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A span of time over which latent ratings are treated as static.
///
/// `start` is inclusive and `end` exclusive. Periods produced by one
/// partitioning are contiguous and ordered, and `index` counts periods from
/// the first one, so index differences measure elapsed periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingPeriod {
    pub index: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub contests: Vec<ContestId>
}

impl RatingPeriod {
    pub fn is_empty(&self) -> bool {
        self.contests.is_empty()
    }
}

enum Cursor {
    Timedelta {
        length: Duration,
        origin: Option<DateTime<Utc>>,
        next_start: Option<DateTime<Utc>>
    },
    ContestCount {
        count: usize
    },
    Boundaries {
        boundaries: Vec<DateTime<Utc>>,
        next_start: Option<(DateTime<Utc>, usize)>
    }
}

/// Lazily yields the rating periods of a contest history.
pub struct PeriodIter<'a> {
    contests: Vec<&'a Contest>,
    position: usize,
    index: usize,
    cursor: Cursor
}

/// Partitions `contests` according to `policy`.
///
/// Contests are ordered by timestamp; contests sharing a timestamp keep the
/// order in which they were supplied.
pub fn partition<'a, I>(contests: I, policy: &PeriodPolicy) -> Result<PeriodIter<'a>>
where
    I: IntoIterator<Item = &'a Contest>
{
    policy.validate()?;

    let mut contests: Vec<&Contest> = contests.into_iter().collect();
    // Stable sort keeps insertion order for identical timestamps
    contests.sort_by_key(|c| c.timestamp);

    let cursor = match policy {
        PeriodPolicy::Timedelta { seconds, origin } => {
            let length = Duration::try_seconds(*seconds).ok_or_else(|| {
                RatingError::InvalidConfig(format!("period length of {} seconds is out of range", seconds))
            })?;
            let next_start = match (contests.first(), *origin) {
                // Contests before the configured origin share an initial period
                (Some(first), Some(origin)) if first.timestamp < origin => None,
                (Some(first), origin) => {
                    let origin = origin.unwrap_or(first.timestamp);
                    Some(aligned_start(origin, first.timestamp, length)?)
                }
                (None, _) => None
            };

            Cursor::Timedelta {
                length,
                origin: *origin,
                next_start
            }
        }
        PeriodPolicy::ContestCount { count } => Cursor::ContestCount { count: *count },
        PeriodPolicy::Boundaries { boundaries } => Cursor::Boundaries {
            boundaries: boundaries.clone(),
            next_start: None
        }
    };

    Ok(PeriodIter {
        contests,
        position: 0,
        index: 0,
        cursor
    })
}

/// Start of the bucket of `length` aligned at `origin` that contains `first`.
fn aligned_start(origin: DateTime<Utc>, first: DateTime<Utc>, length: Duration) -> Result<DateTime<Utc>> {
    let overflow = || RatingError::InvalidConfig(format!("Cannot align periods at {} with {}", origin, first));

    let seconds = length.num_seconds();
    let buckets = (first - origin).num_seconds() / seconds;
    let offset = buckets
        .checked_mul(seconds)
        .and_then(Duration::try_seconds)
        .ok_or_else(overflow)?;

    origin.checked_add_signed(offset).ok_or_else(overflow)
}

impl<'a> PeriodIter<'a> {
    fn remaining(&self) -> &[&'a Contest] {
        &self.contests[self.position..]
    }

    /// Start and (exclusive) end of the next period. `None` as end means the
    /// period is open and takes every remaining contest.
    fn next_bounds(&mut self, first: DateTime<Utc>) -> (DateTime<Utc>, Option<DateTime<Utc>>) {
        match &mut self.cursor {
            Cursor::Timedelta {
                length,
                origin,
                next_start
            } => {
                let start = match (*next_start, *origin) {
                    (Some(start), _) => start,
                    (None, Some(origin)) => {
                        // The initial period ends at the origin
                        *next_start = Some(origin);
                        return (first, Some(origin));
                    }
                    (None, None) => first
                };
                // Past the last representable instant the period stays open
                let end = start.checked_add_signed(*length);
                *next_start = end;

                (start, end)
            }
            Cursor::ContestCount { .. } => (first, None),
            Cursor::Boundaries {
                boundaries,
                next_start
            } => {
                let (start, next) = match *next_start {
                    Some(state) => state,
                    None => {
                        let passed = boundaries.partition_point(|b| *b <= first);
                        if passed == 0 {
                            (first, 0)
                        } else {
                            (boundaries[passed - 1], passed)
                        }
                    }
                };

                match boundaries.get(next) {
                    Some(end) => {
                        *next_start = Some((*end, next + 1));
                        (start, Some(*end))
                    }
                    None => (start, None)
                }
            }
        }
    }
}

impl<'a> Iterator for PeriodIter<'a> {
    type Item = RatingPeriod;

    fn next(&mut self) -> Option<RatingPeriod> {
        let first = self.remaining().first()?.timestamp;

        let (start, end, taken) = match self.cursor {
            Cursor::ContestCount { count } => {
                let taken = count.min(self.remaining().len());
                let end = match self.remaining().get(taken) {
                    Some(next) => next.timestamp,
                    None => self.remaining()[taken - 1].timestamp + Duration::nanoseconds(1)
                };
                (first, end, taken)
            }
            _ => {
                let (start, end) = self.next_bounds(first);
                match end {
                    Some(end) => {
                        let taken = self.remaining().iter().take_while(|c| c.timestamp < end).count();
                        (start, end, taken)
                    }
                    None => {
                        let taken = self.remaining().len();
                        let last = self.remaining()[taken - 1].timestamp;
                        (start, last + Duration::nanoseconds(1), taken)
                    }
                }
            }
        };

        let contests = self.contests[self.position..self.position + taken]
            .iter()
            .map(|c| c.id)
            .collect();
        self.position += taken;

        let period = RatingPeriod {
            index: self.index,
            start,
            end,
            contests
        };
        self.index += 1;

        Some(period)
    }
}

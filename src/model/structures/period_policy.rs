use crate::error::{RatingError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How a contest history is cut into rating periods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum PeriodPolicy {
    /// Fixed-length buckets aligned at `origin` (the earliest contest when absent)
    Timedelta {
        seconds: i64,
        #[serde(default)]
        origin: Option<DateTime<Utc>>
    },
    /// Every `count` contests form one period
    ContestCount { count: usize },
    /// Explicit, strictly increasing period boundaries
    Boundaries { boundaries: Vec<DateTime<Utc>> }
}

impl Default for PeriodPolicy {
    fn default() -> Self {
        PeriodPolicy::days(30)
    }
}

impl PeriodPolicy {
    pub fn days(days: i64) -> PeriodPolicy {
        PeriodPolicy::Timedelta {
            seconds: days * 24 * 60 * 60,
            origin: None
        }
    }

    pub fn contests(count: usize) -> PeriodPolicy {
        PeriodPolicy::ContestCount { count }
    }

    pub fn boundaries(boundaries: Vec<DateTime<Utc>>) -> PeriodPolicy {
        PeriodPolicy::Boundaries { boundaries }
    }

    /// Period length of a timedelta policy; `None` for other policies or a
    /// length chrono cannot represent.
    pub fn length(&self) -> Option<Duration> {
        match self {
            PeriodPolicy::Timedelta { seconds, .. } => Duration::try_seconds(*seconds),
            _ => None
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            PeriodPolicy::Timedelta { seconds, .. } if *seconds <= 0 => Err(RatingError::InvalidConfig(format!(
                "period length must be positive, got {} seconds",
                seconds
            ))),
            PeriodPolicy::Timedelta { seconds, .. } if Duration::try_seconds(*seconds).is_none() => Err(
                RatingError::InvalidConfig(format!("period length of {} seconds is out of range", seconds))
            ),
            PeriodPolicy::ContestCount { count: 0 } => Err(RatingError::InvalidConfig(
                "contests per period must be at least 1".to_string()
            )),
            PeriodPolicy::Boundaries { boundaries } if boundaries.windows(2).any(|w| w[0] >= w[1]) => Err(
                RatingError::InvalidConfig("period boundaries must be strictly increasing".to_string())
            ),
            _ => Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_validate() {
        assert!(PeriodPolicy::days(1).validate().is_ok());
        assert!(PeriodPolicy::days(0).validate().is_err());
        assert!(PeriodPolicy::contests(0).validate().is_err());

        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        assert!(PeriodPolicy::boundaries(vec![a, b]).validate().is_ok());
        assert!(PeriodPolicy::boundaries(vec![b, a]).validate().is_err());
        assert!(PeriodPolicy::boundaries(vec![a, a]).validate().is_err());
    }

    #[test]
    fn test_out_of_range_length() {
        let policy = PeriodPolicy::Timedelta {
            seconds: i64::MAX / 10,
            origin: None
        };

        assert!(matches!(policy.validate(), Err(RatingError::InvalidConfig(_))));
        assert!(policy.length().is_none());
        assert_eq!(PeriodPolicy::days(2).length(), Some(Duration::days(2)));
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_string(&PeriodPolicy::contests(10)).unwrap();
        assert_eq!(json, r#"{"policy":"contest_count","count":10}"#);

        let parsed: PeriodPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, PeriodPolicy::contests(10));
    }
}

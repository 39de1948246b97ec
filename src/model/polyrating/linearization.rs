use serde::{Deserialize, Serialize};

use crate::error::{RatingError, Result};

/// How many trailing periods are re-optimised jointly.
///
/// With `Periods(k)` the fit for period `t` spans `[t + 1 − k, t]`; older
/// periods are frozen and only enter through the joint Gaussian posterior
/// they left behind, correlations included. `Periods(1)` is pure filtering.
/// `Unbounded`, or any `k` larger than the history, is the exact joint fit.
/// With a Gaussian likelihood every `k` gives that fit; otherwise a wider
/// window relinearises more of the history and moves closer to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearizationWindow {
    #[default]
    Unbounded,
    Periods(usize)
}

impl LinearizationWindow {
    /// First period index re-optimised when rating period `current`.
    pub fn start(&self, current: usize) -> usize {
        match self {
            LinearizationWindow::Unbounded => 0,
            LinearizationWindow::Periods(k) => (current + 1).saturating_sub(*k)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let LinearizationWindow::Periods(0) = self {
            return Err(RatingError::InvalidConfig(
                "Linearization window must span at least one period".to_string()
            ));
        }

        Ok(())
    }
}

impl std::str::FromStr for LinearizationWindow {
    type Err = RatingError;

    /// `"unbounded"` or a positive period count.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") {
            return Ok(LinearizationWindow::Unbounded);
        }

        let window = s
            .parse::<usize>()
            .map(LinearizationWindow::Periods)
            .map_err(|_| RatingError::InvalidConfig(format!("Invalid linearization window '{}'", s)))?;
        window.validate()?;

        Ok(window)
    }
}

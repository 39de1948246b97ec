use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::{
    error::{RatingError, Result},
    model::constants::{ACCURACY_MARGIN_DEVIATION, ACCURACY_SCORE_CLAMP, DAVIDSON_NU, RAO_KUPPER_THETA}
};

/// Outcome model of a single contest given the strength difference `d`
/// (home minus away, natural logistic units).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Likelihood {
    /// Bradley-Terry on the home score share.
    CrossEntropy,
    /// Draws occupy a band of width `2 ln θ` around zero.
    RaoKupper { theta: f64 },
    /// Draw probability proportional to `ν`.
    Davidson { nu: f64 },
    /// Gaussian on the logit of the score share.
    Accuracy { margin_deviation: f64 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Display)]
pub enum LikelihoodKind {
    CrossEntropy,
    RaoKupper,
    Davidson,
    Accuracy
}

impl LikelihoodKind {
    pub fn with_defaults(self) -> Likelihood {
        match self {
            LikelihoodKind::CrossEntropy => Likelihood::CrossEntropy,
            LikelihoodKind::RaoKupper => Likelihood::RaoKupper {
                theta: RAO_KUPPER_THETA
            },
            LikelihoodKind::Davidson => Likelihood::Davidson { nu: DAVIDSON_NU },
            LikelihoodKind::Accuracy => Likelihood::Accuracy {
                margin_deviation: ACCURACY_MARGIN_DEVIATION
            }
        }
    }
}

impl Default for Likelihood {
    fn default() -> Self {
        Likelihood::CrossEntropy
    }
}

/// Value of a log-likelihood term and its first two derivatives in `d`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Derivatives {
    pub value: f64,
    pub first: f64,
    pub second: f64
}

impl std::ops::AddAssign for Derivatives {
    fn add_assign(&mut self, rhs: Derivatives) {
        self.value += rhs.value;
        self.first += rhs.first;
        self.second += rhs.second;
    }
}

impl std::ops::Mul<Derivatives> for f64 {
    type Output = Derivatives;

    fn mul(self, rhs: Derivatives) -> Derivatives {
        Derivatives {
            value: self * rhs.value,
            first: self * rhs.first,
            second: self * rhs.second
        }
    }
}

pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `ln σ(x)` without overflow for large `|x|`.
pub fn log_sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        -(-x).exp().ln_1p()
    } else {
        x - x.exp().ln_1p()
    }
}

/// `ln σ(x)` as a function of `d = sign · x_d + offset`.
fn log_sigmoid_term(x: f64, sign: f64) -> Derivatives {
    let s = sigmoid(x);
    Derivatives {
        value: log_sigmoid(x),
        first: sign * (1.0 - s),
        second: -s * (1.0 - s)
    }
}

/// Splits a graded home share into win/draw/loss weights summing to one.
pub fn outcome_weights(share: f64) -> (f64, f64, f64) {
    if share >= 0.5 {
        (2.0 * share - 1.0, 2.0 - 2.0 * share, 0.0)
    } else {
        (0.0, 2.0 * share, 1.0 - 2.0 * share)
    }
}

impl Likelihood {
    pub fn kind(&self) -> LikelihoodKind {
        match self {
            Likelihood::CrossEntropy => LikelihoodKind::CrossEntropy,
            Likelihood::RaoKupper { .. } => LikelihoodKind::RaoKupper,
            Likelihood::Davidson { .. } => LikelihoodKind::Davidson,
            Likelihood::Accuracy { .. } => LikelihoodKind::Accuracy
        }
    }

    pub fn validate(&self) -> Result<()> {
        let valid = match *self {
            Likelihood::CrossEntropy => true,
            Likelihood::RaoKupper { theta } => theta.is_finite() && theta > 1.0,
            Likelihood::Davidson { nu } => nu.is_finite() && nu > 0.0,
            Likelihood::Accuracy { margin_deviation } => margin_deviation.is_finite() && margin_deviation > 0.0
        };

        if !valid {
            return Err(RatingError::InvalidConfig(format!("Invalid likelihood parameters: {:?}", self)));
        }

        Ok(())
    }

    /// Log-likelihood of home share `share` at strength difference `d`.
    pub fn evaluate(&self, d: f64, share: f64) -> Derivatives {
        match *self {
            Likelihood::CrossEntropy => {
                let s = sigmoid(d);
                Derivatives {
                    value: share * log_sigmoid(d) + (1.0 - share) * log_sigmoid(-d),
                    first: share - s,
                    second: -s * (1.0 - s)
                }
            }
            Likelihood::RaoKupper { theta } => {
                let c = theta.ln();
                let (win, draw, loss) = outcome_weights(share);
                let mut total = Derivatives::default();

                if win > 0.0 {
                    total += win * log_sigmoid_term(d - c, 1.0);
                }
                if loss > 0.0 {
                    total += loss * log_sigmoid_term(-d - c, -1.0);
                }
                if draw > 0.0 {
                    // σ(c−d) − σ(−c−d) = σ(c−d) · σ(c+d) · (1 − e^{−2c})
                    let mut term = log_sigmoid_term(c - d, -1.0);
                    term += log_sigmoid_term(c + d, 1.0);
                    term.value += (-(-2.0 * c).exp()).ln_1p();
                    total += draw * term;
                }

                total
            }
            Likelihood::Davidson { nu } => {
                let (win, draw, loss) = outcome_weights(share);
                let half = d / 2.0;
                let z = 2.0 * half.cosh() + nu;
                let z1 = half.sinh() / z;
                let z2 = half.cosh() / (2.0 * z);
                let draw_value = if draw > 0.0 { draw * nu.ln() } else { 0.0 };

                Derivatives {
                    value: (win - loss) * half + draw_value - z.ln(),
                    first: (win - loss) / 2.0 - z1,
                    second: -(z2 - z1 * z1)
                }
            }
            Likelihood::Accuracy { margin_deviation } => {
                let clamped = share.clamp(ACCURACY_SCORE_CLAMP, 1.0 - ACCURACY_SCORE_CLAMP);
                let target = (clamped / (1.0 - clamped)).ln();
                let variance = margin_deviation * margin_deviation;
                let residual = target - d;

                Derivatives {
                    value: -residual * residual / (2.0 * variance),
                    first: residual / variance,
                    second: -1.0 / variance
                }
            }
        }
    }
}

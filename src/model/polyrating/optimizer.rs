use nalgebra::{linalg::Cholesky, DMatrix, DVector};
use nalgebra_sparse::{coo::CooMatrix, csc::CscMatrix, factorization::CscCholesky};
use tracing::trace;

use crate::{
    error::{RatingError, Result},
    model::{
        constants::{OPTIMIZER_MAX_ITERATIONS, OPTIMIZER_TOLERANCE},
        polyrating::likelihood::Likelihood
    }
};

const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 40;
const RIDGE_BASE: f64 = 1e-9;
const RIDGE_ATTEMPTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub tolerance: f64,
    pub max_iterations: usize
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            tolerance: OPTIMIZER_TOLERANCE,
            max_iterations: OPTIMIZER_MAX_ITERATIONS
        }
    }
}

/// Gaussian prior `N(mean, 1/precision)` on one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prior {
    pub param: usize,
    pub mean: f64,
    pub precision: f64
}

/// Multivariate Gaussian prior on a group of parameters, given by its
/// precision matrix (rows and columns in the order of `params`).
#[derive(Debug, Clone, PartialEq)]
pub struct JointPrior {
    pub params: Vec<usize>,
    pub mean: Vec<f64>,
    pub precision: DMatrix<f64>
}

impl JointPrior {
    fn residual(&self, x: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.params.len(),
            self.params.iter().zip(&self.mean).map(|(p, m)| x[*p] - m)
        )
    }
}

/// Gaussian random-walk step `x_b − x_a ~ N(0, 1/precision)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub a: usize,
    pub b: usize,
    pub precision: f64
}

/// One contest: `d = Σ coefficient · x[param]` and the observed home share.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub terms: Vec<(usize, f64)>,
    pub score: f64
}

impl Observation {
    fn difference(&self, x: &DVector<f64>) -> f64 {
        self.terms.iter().map(|(i, c)| c * x[*i]).sum()
    }
}

/// A log-posterior over a flat parameter vector.
#[derive(Debug, Clone)]
pub struct Problem {
    pub initial: Vec<f64>,
    pub priors: Vec<Prior>,
    pub joint_priors: Vec<JointPrior>,
    pub links: Vec<Link>,
    pub observations: Vec<Observation>,
    pub likelihood: Likelihood
}

#[derive(Debug, Clone)]
pub struct Fit {
    pub mean: Vec<f64>,
    pub deviation: Vec<f64>,
    /// Posterior covariance among the parameters requested from [`maximize`],
    /// in request order
    pub joint_covariance: DMatrix<f64>,
    pub iterations: usize,
    pub converged: bool,
    pub gradient_norm: f64
}

struct Evaluation {
    value: f64,
    gradient: DVector<f64>,
    /// Negative Hessian as unsorted triplets; duplicates add up
    curvature: CooMatrix<f64>
}

impl Problem {
    pub fn len(&self) -> usize {
        self.initial.len()
    }

    pub fn is_empty(&self) -> bool {
        self.initial.is_empty()
    }

    fn value(&self, x: &DVector<f64>) -> f64 {
        let mut value = 0.0;
        for prior in &self.priors {
            let r = x[prior.param] - prior.mean;
            value -= 0.5 * prior.precision * r * r;
        }
        for joint in &self.joint_priors {
            let r = joint.residual(x);
            value -= 0.5 * r.dot(&(&joint.precision * &r));
        }
        for link in &self.links {
            let r = x[link.b] - x[link.a];
            value -= 0.5 * link.precision * r * r;
        }
        for observation in &self.observations {
            value += self.likelihood.evaluate(observation.difference(x), observation.score).value;
        }

        value
    }

    fn evaluate(&self, x: &DVector<f64>) -> Evaluation {
        let n = self.len();
        let mut value = 0.0;
        let mut gradient = DVector::zeros(n);
        let mut curvature = CooMatrix::new(n, n);

        for prior in &self.priors {
            let r = x[prior.param] - prior.mean;
            value -= 0.5 * prior.precision * r * r;
            gradient[prior.param] -= prior.precision * r;
            curvature.push(prior.param, prior.param, prior.precision);
        }

        for joint in &self.joint_priors {
            let r = joint.residual(x);
            let pulled = &joint.precision * &r;
            value -= 0.5 * r.dot(&pulled);
            for (p, a) in joint.params.iter().enumerate() {
                gradient[*a] -= pulled[p];
                for (q, b) in joint.params.iter().enumerate() {
                    let entry = joint.precision[(p, q)];
                    if entry != 0.0 {
                        curvature.push(*a, *b, entry);
                    }
                }
            }
        }

        for link in &self.links {
            let r = x[link.b] - x[link.a];
            value -= 0.5 * link.precision * r * r;
            gradient[link.a] += link.precision * r;
            gradient[link.b] -= link.precision * r;
            curvature.push(link.a, link.a, link.precision);
            curvature.push(link.b, link.b, link.precision);
            curvature.push(link.a, link.b, -link.precision);
            curvature.push(link.b, link.a, -link.precision);
        }

        for observation in &self.observations {
            let term = self.likelihood.evaluate(observation.difference(x), observation.score);
            value += term.value;
            for (i, ci) in &observation.terms {
                gradient[*i] += ci * term.first;
                for (j, cj) in &observation.terms {
                    curvature.push(*i, *j, -ci * cj * term.second);
                }
            }
        }

        Evaluation {
            value,
            gradient,
            curvature
        }
    }
}

/// Factorises a sparse symmetric `matrix`, adding an escalating ridge to the
/// diagonal when it is not numerically positive definite.
fn factorize(matrix: &CooMatrix<f64>) -> Option<CscCholesky<f64>> {
    if let Ok(cholesky) = CscCholesky::factor(&CscMatrix::from(matrix)) {
        return Some(cholesky);
    }

    let n = matrix.nrows();
    let mut diagonal = vec![0.0; n];
    for (i, j, v) in matrix.triplet_iter() {
        if i == j {
            diagonal[i] += *v;
        }
    }
    let scale = diagonal.iter().fold(1.0_f64, |max, d| max.max(d.abs()));

    let mut ridge = RIDGE_BASE * scale;
    for _ in 0..RIDGE_ATTEMPTS {
        let mut regularized = matrix.clone();
        for i in 0..n {
            regularized.push(i, i, ridge);
        }
        if let Ok(cholesky) = CscCholesky::factor(&CscMatrix::from(&regularized)) {
            return Some(cholesky);
        }
        ridge *= 10.0;
    }

    None
}

fn solve(cholesky: &CscCholesky<f64>, rhs: &DVector<f64>) -> DVector<f64> {
    let rhs = DMatrix::from_column_slice(rhs.len(), 1, rhs.as_slice());
    cholesky.solve(&rhs).column(0).into_owned()
}

/// Inverse of a dense covariance matrix, if it is positive definite.
pub fn precision_of(covariance: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    Cholesky::new(covariance.clone()).map(|c| c.inverse())
}

fn is_finite(evaluation: &Evaluation) -> bool {
    evaluation.value.is_finite()
        && evaluation.gradient.iter().all(|g| g.is_finite())
        && evaluation.curvature.values().iter().all(|h| h.is_finite())
}

/// Stationary when either the gradient or the full (undamped) Newton step is
/// below the tolerance. A step shortened by the line search says nothing
/// about stationarity.
fn is_stationary(gradient: &DVector<f64>, newton_step: &DVector<f64>, tolerance: f64) -> bool {
    gradient.amax() < tolerance || newton_step.amax() < tolerance
}

/// # Maximum a posteriori fit
///
/// Damped Newton ascent on the log-posterior. Each step solves
/// `(−H) s = g` with a sparse Cholesky factorisation and is shortened by
/// backtracking until the Armijo condition holds. Iteration stops once the
/// gradient or the full Newton step falls below the tolerance in max-norm.
///
/// Deviations are the square roots of the diagonal of `(−H)⁻¹` at the
/// final iterate (Laplace approximation). The covariance block among
/// `joint` is returned as well.
///
/// `period` is only used to label errors.
pub fn maximize(problem: &Problem, settings: &Settings, period: usize, joint: &[usize]) -> Result<Fit> {
    let unstable = |reason: &str| RatingError::NumericalInstability {
        period,
        reason: reason.to_string()
    };

    if problem.is_empty() {
        return Ok(Fit {
            mean: Vec::new(),
            deviation: Vec::new(),
            joint_covariance: DMatrix::zeros(0, 0),
            iterations: 0,
            converged: true,
            gradient_norm: 0.0
        });
    }

    let mut x = DVector::from_vec(problem.initial.clone());
    let mut current = problem.evaluate(&x);
    if !is_finite(&current) {
        return Err(unstable("non-finite log-posterior at the initial point"));
    }

    let mut iterations = 0;
    let mut converged = false;
    while iterations < settings.max_iterations {
        if current.gradient.amax() < settings.tolerance {
            converged = true;
            break;
        }

        let cholesky = factorize(&current.curvature).ok_or_else(|| unstable("curvature is singular"))?;
        let step = solve(&cholesky, &current.gradient);
        let slope = current.gradient.dot(&step);

        let mut alpha = 1.0;
        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let trial = &x + &step * alpha;
            let value = problem.value(&trial);
            if value.is_finite() && value >= current.value + ARMIJO * alpha * slope {
                accepted = Some(trial);
                break;
            }
            alpha *= 0.5;
        }

        let Some(trial) = accepted else {
            trace!("Line search stalled after {} iterations", iterations);
            break;
        };

        x = trial;
        current = problem.evaluate(&x);
        if !is_finite(&current) {
            return Err(unstable("non-finite log-posterior during the line search"));
        }
        iterations += 1;

        trace!(
            "Newton iteration {}: value {:.6}, |g| {:e}, alpha {}",
            iterations,
            current.value,
            current.gradient.amax(),
            alpha
        );

        if is_stationary(&current.gradient, &step, settings.tolerance) {
            converged = true;
            break;
        }
    }

    let gradient_norm = current.gradient.amax();
    converged = converged || gradient_norm < settings.tolerance;

    let cholesky =
        factorize(&current.curvature).ok_or_else(|| unstable("curvature at the optimum is singular"))?;
    let n = problem.len();
    let position: std::collections::HashMap<usize, usize> =
        joint.iter().enumerate().map(|(position, param)| (*param, position)).collect();
    let mut deviation = Vec::with_capacity(n);
    let mut joint_covariance = DMatrix::zeros(joint.len(), joint.len());
    let mut unit = DVector::zeros(n);

    for i in 0..n {
        unit[i] = 1.0;
        let column = solve(&cholesky, &unit);
        unit[i] = 0.0;

        deviation.push(column[i].max(0.0).sqrt());
        if let Some(q) = position.get(&i) {
            for (p, param) in joint.iter().enumerate() {
                joint_covariance[(p, *q)] = column[*param];
            }
        }
    }
    if deviation.iter().any(|d| !d.is_finite()) || joint_covariance.iter().any(|c| !c.is_finite()) {
        return Err(unstable("non-finite posterior deviation"));
    }

    Ok(Fit {
        mean: x.iter().copied().collect(),
        deviation,
        joint_covariance,
        iterations,
        converged,
        gradient_norm
    })
}

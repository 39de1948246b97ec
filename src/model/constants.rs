// Default prior
pub const DEFAULT_MEAN: f64 = 1500.0;
pub const DEFAULT_DEVIATION: f64 = 500.0;
/// Rating points per natural-logit unit: a 400 point gap is 10:1 odds
pub const LOGISTIC_SCALE: f64 = 400.0 / std::f64::consts::LN_10;
pub const RATING_COMPONENT: &str = "rating";
// Elo
pub const ELO_K_FACTOR: f64 = 32.0;
// Glicko: RD climbs from 50 back to 350 after 100 idle periods
pub const GLICKO_C: f64 = 34.6;
// Glicko-2
pub const GLICKO2_TAU: f64 = 0.5;
pub const GLICKO2_VOLATILITY: f64 = 0.06;
pub const GLICKO2_CONVERGENCE: f64 = 0.000001;
pub const GLICKO2_MAX_ITERATIONS: usize = 100;
// TrueSkill, performance and dynamics scale with the default deviation
pub const TRUESKILL_BETA_RATIO: f64 = 1.0 / 2.0;
pub const TRUESKILL_TAU_RATIO: f64 = 1.0 / 100.0;
pub const TRUESKILL_DRAW_PROBABILITY: f64 = 0.1;
// Polyrating
pub const OPTIMIZER_TOLERANCE: f64 = 0.000001;
pub const OPTIMIZER_MAX_ITERATIONS: usize = 100;
pub const RAO_KUPPER_THETA: f64 = 1.5;
pub const DAVIDSON_NU: f64 = 1.0;
pub const ACCURACY_MARGIN_DEVIATION: f64 = 1.0;
pub const ACCURACY_SCORE_CLAMP: f64 = 0.01;

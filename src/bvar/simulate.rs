//! Monte Carlo conditional forecasts.
//!
//! The driving variable is pinned to an imposed path; every other variable
//! draws its residual from the Gaussian conditional on the driving residual:
//!
//! ```text
//! e_f       = imposed_k - mean_f
//! e_o | e_f ~ N( Σ_of / Σ_ff · e_f,  Σ_oo - Σ_of Σ_fo / Σ_ff )
//! ```
//!
//! Each draw runs on its own `StdRng` seeded from the caller's generator, so
//! the output depends only on that generator's state, never on how rayon
//! schedules the draws.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bvar::model::BvarModel;
use crate::domain::{ExtendPolicy, ForecastDistribution};
use crate::error::ForecastError;
use crate::math::linalg::psd_sqrt;
use crate::math::stats;

/// Longest horizon an unstable model may be simulated for.
pub const UNSTABLE_HORIZON_LIMIT: usize = 3;

/// Driving variances below this are treated as zero.
const MIN_DRIVING_VARIANCE: f64 = 1e-12;

/// What to simulate.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalForecastSpec {
    /// Index of the variable whose path is imposed.
    pub driving: usize,
    /// Imposed values for periods `1..=path.len()` (length <= `horizon`).
    pub path: Vec<f64>,
    pub horizon: usize,
    /// How to fill periods beyond `path`.
    pub extend_policy: ExtendPolicy,
    pub draws: usize,
}

/// Per-horizon summaries for one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableForecast {
    pub variable: String,
    /// Period-`h` value (a monthly change), index `h-1`.
    pub per_period: Vec<ForecastDistribution>,
    /// Sum of periods `1..=h`, index `h-1`.
    pub cumulative: Vec<ForecastDistribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalForecast {
    pub horizon: usize,
    pub draws: usize,
    /// Driving-variable values actually imposed (extended to `horizon`).
    pub imposed: Vec<f64>,
    pub variables: Vec<VariableForecast>,
    /// Identification or estimation needed a numerical fallback.
    pub degraded: bool,
}

impl ConditionalForecast {
    pub fn variable(&self, index: usize) -> Option<&VariableForecast> {
        self.variables.get(index)
    }
}

/// Extend `path` to `horizon` periods.
pub fn imposed_path(path: &[f64], horizon: usize, policy: ExtendPolicy) -> Result<Vec<f64>, ForecastError> {
    if path.len() > horizon {
        return Err(ForecastError::Validation(format!(
            "imposed path has {} periods but the horizon is {horizon}",
            path.len()
        )));
    }
    if let Some(v) = path.iter().find(|v| !v.is_finite()) {
        return Err(ForecastError::Validation(format!("imposed path contains {v}")));
    }
    let fill = match policy {
        ExtendPolicy::HoldLastValue => path.last().copied().unwrap_or(0.0),
        ExtendPolicy::Zero => 0.0,
    };
    let mut out = path.to_vec();
    out.resize(horizon, fill);
    Ok(out)
}

/// Residual structure of the non-driving variables given the driving one.
struct ConditionalShock {
    driving: usize,
    others: Vec<usize>,
    gain: DVector<f64>,
    root: DMatrix<f64>,
}

impl ConditionalShock {
    fn new(sigma: &DMatrix<f64>, driving: usize) -> (Self, bool) {
        let n = sigma.nrows();
        let others: Vec<usize> = (0..n).filter(|&j| j != driving).collect();
        let m = others.len();
        let s_ff = sigma[(driving, driving)];
        let degenerate = !(s_ff > MIN_DRIVING_VARIANCE);

        let s_of = DVector::from_fn(m, |i, _| sigma[(others[i], driving)]);
        let s_oo = DMatrix::from_fn(m, m, |i, j| sigma[(others[i], others[j])]);

        let (gain, cond) = if degenerate {
            (DVector::zeros(m), s_oo)
        } else {
            let gain = &s_of / s_ff;
            let cond = &s_oo - &s_of * s_of.transpose() / s_ff;
            (gain, cond)
        };

        let shock = Self {
            driving,
            others,
            gain,
            root: psd_sqrt(&cond),
        };
        (shock, degenerate)
    }

    fn draw(&self, driving_residual: f64, rng: &mut StdRng) -> DVector<f64> {
        let m = self.others.len();
        let z = DVector::from_fn(m, |_, _| rng.sample::<f64, _>(StandardNormal));
        let e_o = &self.gain * driving_residual + &self.root * z;

        let mut e = DVector::zeros(m + 1);
        e[self.driving] = driving_residual;
        for (k, &j) in self.others.iter().enumerate() {
            e[j] = e_o[k];
        }
        e
    }
}

fn check_request(model: &BvarModel, spec: &ConditionalForecastSpec) -> Result<Vec<f64>, ForecastError> {
    if spec.driving >= model.n_vars() {
        return Err(ForecastError::dimension(
            "driving variable index",
            format!("< {}", model.n_vars()),
            spec.driving,
        ));
    }
    if spec.horizon == 0 {
        return Err(ForecastError::Validation("forecast horizon must be >= 1".into()));
    }
    if !model.is_stable() && spec.horizon > UNSTABLE_HORIZON_LIMIT {
        return Err(ForecastError::UnstableModel {
            max_modulus: model.max_modulus(),
            horizon: spec.horizon,
            limit: UNSTABLE_HORIZON_LIMIT,
        });
    }
    imposed_path(&spec.path, spec.horizon, spec.extend_policy)
}

fn shift_state(state: &mut DVector<f64>, y: &DVector<f64>) {
    let n = y.len();
    let len = state.len();
    for k in (n..len).rev() {
        state[k] = state[k - n];
    }
    state.rows_mut(0, n).copy_from(y);
}

/// One simulated path (`H × n`, monthly values).
fn simulate_path(
    model: &BvarModel,
    shock: &ConditionalShock,
    imposed: &[f64],
    rng: &mut StdRng,
) -> DMatrix<f64> {
    let n = model.n_vars();
    let mut state = model.initial_state();
    let mut out = DMatrix::zeros(imposed.len(), n);

    for (k, &target) in imposed.iter().enumerate() {
        let mean = model.one_step_mean(&state);
        let e = shock.draw(target - mean[shock.driving], rng);
        let mut y = mean + e;
        y[shock.driving] = target;
        for j in 0..n {
            out[(k, j)] = y[j];
        }
        shift_state(&mut state, &y);
    }
    out
}

/// Expected path given the imposed driving values (all free shocks at their
/// conditional mean). This is the limit of the Monte Carlo mean.
pub fn conditional_mean_path(model: &BvarModel, spec: &ConditionalForecastSpec) -> Result<DMatrix<f64>, ForecastError> {
    let imposed = check_request(model, spec)?;
    let (shock, _) = ConditionalShock::new(model.sigma(), spec.driving);
    let n = model.n_vars();
    let mut state = model.initial_state();
    let mut out = DMatrix::zeros(imposed.len(), n);

    for (k, &target) in imposed.iter().enumerate() {
        let mean = model.one_step_mean(&state);
        let e_f = target - mean[spec.driving];
        let mut y = mean;
        for (i, &j) in shock.others.iter().enumerate() {
            y[j] += shock.gain[i] * e_f;
        }
        y[spec.driving] = target;
        for j in 0..n {
            out[(k, j)] = y[j];
        }
        shift_state(&mut state, &y);
    }
    Ok(out)
}

/// Run a conditional forecast with the caller's generator.
pub fn simulate_conditional<R: RngCore + ?Sized>(
    model: &BvarModel,
    spec: &ConditionalForecastSpec,
    rng: &mut R,
) -> Result<ConditionalForecast, ForecastError> {
    let imposed = check_request(model, spec)?;
    if spec.draws == 0 {
        return Err(ForecastError::Validation("number of draws must be >= 1".into()));
    }
    let (shock, shock_degenerate) = ConditionalShock::new(model.sigma(), spec.driving);
    if shock_degenerate {
        warn!(driving = spec.driving, "driving residual variance is zero; other shocks drawn unconditionally");
    }

    let seeds: Vec<u64> = (0..spec.draws).map(|_| rng.next_u64()).collect();
    let paths: Vec<DMatrix<f64>> = seeds
        .par_iter()
        .map(|&seed| {
            let mut draw_rng = StdRng::seed_from_u64(seed);
            simulate_path(model, &shock, &imposed, &mut draw_rng)
        })
        .collect();

    let n = model.n_vars();
    let h = imposed.len();
    let mut variables = Vec::with_capacity(n);
    for j in 0..n {
        let mut per_period = Vec::with_capacity(h);
        let mut cumulative = Vec::with_capacity(h);
        let mut running = vec![0.0; paths.len()];
        for k in 0..h {
            let values: Vec<f64> = paths.iter().map(|p| p[(k, j)]).collect();
            for (acc, v) in running.iter_mut().zip(&values) {
                *acc += v;
            }
            per_period.push(summarize(values)?);
            cumulative.push(summarize(running.clone())?);
        }
        variables.push(VariableForecast {
            variable: model.variables()[j].clone(),
            per_period,
            cumulative,
        });
    }

    debug!(horizon = h, draws = spec.draws, "conditional forecast simulated");
    Ok(ConditionalForecast {
        horizon: h,
        draws: spec.draws,
        imposed,
        variables,
        degraded: shock_degenerate || !model.is_stable() || model.diagnostics().degraded(),
    })
}

/// Same as [`simulate_conditional`] with a fresh generator from `seed`.
pub fn simulate_conditional_seeded(
    model: &BvarModel,
    spec: &ConditionalForecastSpec,
    seed: u64,
) -> Result<ConditionalForecast, ForecastError> {
    let mut rng = StdRng::seed_from_u64(seed);
    simulate_conditional(model, spec, &mut rng)
}

/// Empirical mean, std and 2.5/97.5 percentiles.
fn summarize(mut values: Vec<f64>) -> Result<ForecastDistribution, ForecastError> {
    let mean = stats::mean(&values);
    let std = stats::sample_std(&values);
    stats::sort_values(&mut values);
    let lower = stats::quantile_sorted(&values, 0.025);
    let upper = stats::quantile_sorted(&values, 0.975);
    ForecastDistribution::new(mean, std, lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvar::model::tests::var1;

    fn spec(path: Vec<f64>, horizon: usize, draws: usize) -> ConditionalForecastSpec {
        ConditionalForecastSpec {
            driving: 0,
            path,
            horizon,
            extend_policy: ExtendPolicy::Zero,
            draws,
        }
    }

    #[test]
    fn extend_policies() {
        assert_eq!(imposed_path(&[25.0], 3, ExtendPolicy::Zero).unwrap(), vec![25.0, 0.0, 0.0]);
        assert_eq!(
            imposed_path(&[25.0, 10.0], 3, ExtendPolicy::HoldLastValue).unwrap(),
            vec![25.0, 10.0, 10.0]
        );
        assert!(imposed_path(&[1.0, 2.0], 1, ExtendPolicy::Zero).is_err());
    }

    #[test]
    fn driving_variable_is_pinned() {
        let m = var1([0.5, 0.0, 0.3, 0.4], [4.0, 1.0, 1.0, 2.0]);
        let out = simulate_conditional_seeded(&m, &spec(vec![25.0], 4, 50), 1).unwrap();
        let foreign = out.variable(0).unwrap();
        assert_eq!(out.imposed, vec![25.0, 0.0, 0.0, 0.0]);
        assert!((foreign.per_period[0].mean - 25.0).abs() < 1e-12);
        assert_eq!(foreign.per_period[0].std, 0.0);
        assert!((foreign.cumulative[3].mean - 25.0).abs() < 1e-12);
    }

    #[test]
    fn same_seed_is_bit_identical() {
        let m = var1([0.5, 0.0, 0.3, 0.4], [4.0, 1.0, 1.0, 2.0]);
        let a = simulate_conditional_seeded(&m, &spec(vec![25.0], 6, 200), 42).unwrap();
        let b = simulate_conditional_seeded(&m, &spec(vec![25.0], 6, 200), 42).unwrap();
        assert_eq!(a, b);
        let c = simulate_conditional_seeded(&m, &spec(vec![25.0], 6, 200), 43).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn mean_converges_to_conditional_expectation() {
        let m = var1([0.5, 0.0, 0.3, 0.4], [4.0, 1.0, 1.0, 2.0]);
        let s = spec(vec![25.0], 3, 20_000);
        let expected = conditional_mean_path(&m, &s).unwrap();
        let out = simulate_conditional_seeded(&m, &s, 9).unwrap();
        let domestic = out.variable(1).unwrap();
        // Impact: 25 · Σ_10/Σ_00 = 6.25.
        assert!((expected[(0, 1)] - 6.25).abs() < 1e-12);
        for k in 0..3 {
            assert!((domestic.per_period[k].mean - expected[(k, 1)]).abs() < 0.1);
        }
    }

    #[test]
    fn unstable_model_refuses_long_horizon() {
        let m = var1([1.1, 0.0, 0.3, 0.4], [1.0, 0.0, 0.0, 1.0]);
        let err = simulate_conditional_seeded(&m, &spec(vec![25.0], 12, 10), 1).unwrap_err();
        match err {
            ForecastError::UnstableModel { max_modulus, horizon, limit } => {
                assert!(max_modulus > 1.0);
                assert_eq!(horizon, 12);
                assert_eq!(limit, UNSTABLE_HORIZON_LIMIT);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(simulate_conditional_seeded(&m, &spec(vec![25.0], 3, 10), 1).is_ok());
    }

    #[test]
    fn intervals_contain_mean() {
        let m = var1([0.5, 0.0, 0.3, 0.4], [4.0, 1.0, 1.0, 2.0]);
        let out = simulate_conditional_seeded(&m, &spec(vec![-25.0], 5, 500), 3).unwrap();
        for v in &out.variables {
            for f in v.per_period.iter().chain(&v.cumulative) {
                assert!(f.lower_ci <= f.mean && f.mean <= f.upper_ci);
            }
        }
    }
}

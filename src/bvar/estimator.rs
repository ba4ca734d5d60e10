//! Posterior-mean BVAR estimation (Theil mixed estimation).
//!
//! For each equation `i`, with stacked lag regressors `X` (`T_eff × (1+n·p)`),
//! prior mean `b_i` and prior variances `V_i` (diagonal):
//!
//! ```text
//! (X'X / σ_i² + V_i⁻¹) β_i = X'y_i / σ_i² + V_i⁻¹ b_i
//! ```
//!
//! Equations are independent given the prior, so they are solved in parallel.
//! The residual covariance is `E'E / T_eff`, symmetrized and floored to PSD.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::bvar::model::{BvarDiagnostics, BvarModel};
use crate::bvar::prior::ShrinkagePrior;
use crate::domain::TimeSeriesPanel;
use crate::error::ForecastError;
use crate::math::linalg::{floor_eigenvalues, solve_spd_adaptive};

/// Observations required beyond the lag count.
pub const MIN_EXTRA_OBS: usize = 5;

/// Stacked regression data for a VAR(p).
#[derive(Debug, Clone)]
pub struct VarData {
    /// `T_eff × (1 + n·p)`: intercept then lags 1..p, each lag block `n` wide.
    pub x: DMatrix<f64>,
    /// `T_eff × n`.
    pub y: DMatrix<f64>,
}

/// Build the lagged regressors from a panel (rows `p..T`).
pub fn build_var_data(panel: &TimeSeriesPanel, p: usize) -> Result<VarData, ForecastError> {
    let n = panel.n_vars();
    let t = panel.n_obs();
    if t < p + MIN_EXTRA_OBS {
        return Err(ForecastError::Validation(format!(
            "need at least {} observations for a VAR({p}), got {t}",
            p + MIN_EXTRA_OBS
        )));
    }
    let rows = t - p;
    let k = 1 + n * p;
    let values = panel.values();

    let x = DMatrix::from_fn(rows, k, |r, c| {
        if c == 0 {
            return 1.0;
        }
        let lag = (c - 1) / n + 1;
        let var = (c - 1) % n;
        values[(p + r - lag, var)]
    });
    let y = DMatrix::from_fn(rows, n, |r, j| values[(p + r, j)]);
    Ok(VarData { x, y })
}

struct EquationFit {
    beta: DVector<f64>,
    jitter: f64,
}

/// Estimate the posterior-mean BVAR.
///
/// `ordering` is the recursive identification order (first = shocked variable).
pub fn estimate_bvar(
    panel: &TimeSeriesPanel,
    prior: &ShrinkagePrior,
    ordering: Vec<usize>,
) -> Result<BvarModel, ForecastError> {
    let n = prior.n_vars();
    let p = prior.lags();
    if panel.n_vars() != n {
        return Err(ForecastError::dimension("panel width vs prior", n, panel.n_vars()));
    }

    let data = build_var_data(panel, p)?;
    let t_eff = data.x.nrows();
    let xtx = data.x.tr_mul(&data.x);

    let fits: Vec<Result<EquationFit, ForecastError>> = (0..n)
        .into_par_iter()
        .map(|i| fit_equation(&data, &xtx, prior, i))
        .collect();
    let fits = fits.into_iter().collect::<Result<Vec<_>, _>>()?;

    let mut beta = DMatrix::zeros(n, 1 + n * p);
    let mut ridge_jitter = Vec::with_capacity(n);
    for (i, fit) in fits.iter().enumerate() {
        beta.set_row(i, &fit.beta.transpose());
        ridge_jitter.push(fit.jitter);
    }

    let residuals = &data.y - &data.x * beta.transpose();
    let raw_sigma = residuals.tr_mul(&residuals) / t_eff as f64;
    let (sigma, sigma_floored) = floor_eigenvalues(&raw_sigma, 0.0);
    if sigma_floored {
        warn!("residual covariance was not PSD; eigenvalues floored at zero");
    }

    let values = panel.values();
    let history = values.rows(panel.n_obs() - p, p).into_owned();

    let diagnostics = BvarDiagnostics {
        n_obs: t_eff,
        ridge_jitter,
        sigma_floored,
    };
    let model = BvarModel::from_parts(
        panel.variables().to_vec(),
        p,
        beta,
        sigma,
        history,
        ordering,
        diagnostics,
    )?;

    info!(
        n,
        p,
        t_eff,
        max_modulus = model.max_modulus(),
        stable = model.is_stable(),
        degraded = model.diagnostics().degraded(),
        "estimated BVAR"
    );
    if !model.is_stable() {
        warn!(max_modulus = model.max_modulus(), "BVAR is not stable");
    }
    Ok(model)
}

fn fit_equation(
    data: &VarData,
    xtx: &DMatrix<f64>,
    prior: &ShrinkagePrior,
    i: usize,
) -> Result<EquationFit, ForecastError> {
    let sigma2 = prior.residual_variance(i);
    let prior_mean = prior.mean_row(i);
    let prior_var = prior.variance_row(i);
    let k = prior_var.len();

    let y = data.y.column(i);
    let mut a = xtx / sigma2;
    let mut b = data.x.tr_mul(&y) / sigma2;
    for j in 0..k {
        let precision = 1.0 / prior_var[j];
        a[(j, j)] += precision;
        b[j] += precision * prior_mean[j];
    }

    let b = DMatrix::from_column_slice(k, 1, b.as_slice());
    let solve = solve_spd_adaptive(&a, &b).ok_or_else(|| {
        ForecastError::Validation(format!(
            "posterior system for equation {i} could not be solved even with ridge jitter"
        ))
    })?;
    if solve.jitter > 0.0 {
        warn!(equation = i, jitter = solve.jitter, "ill-conditioned posterior; ridge jitter applied");
    } else {
        debug!(equation = i, "posterior solved without jitter");
    }

    Ok(EquationFit {
        beta: solve.solution.column(0).into_owned(),
        jitter: solve.jitter,
    })
}

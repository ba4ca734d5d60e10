//! Minnesota-style shrinkage prior.
//!
//! Coefficient layout (shared with `BvarModel::beta`): for equation `i`,
//! column 0 is the intercept and column `1 + (l-1)·n + j` is the coefficient
//! on variable `j` at lag `l`.
//!
//! Prior standard deviations:
//!
//! ```text
//! own lag      (i == j):  λ1 / l^λ3
//! cross lag    (i != j):  λ1 · λ2 · σ_i / (σ_j · l^λ3)
//! intercept:              INTERCEPT_PRIOR_SCALE · σ_i
//! ```
//!
//! `σ_i` are residual standard deviations of univariate AR fits, so the cross
//! terms are unit-free. With `λ2 <= 1` and `λ3 > 0`, own lag-1 coefficients get
//! the loosest prior and every coefficient tightens with its lag.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::TimeSeriesPanel;
use crate::error::ForecastError;
use crate::math::{solve_least_squares, stats};

/// Intercept prior std as a multiple of the equation's residual std.
pub const INTERCEPT_PRIOR_SCALE: f64 = 100.0;

/// Residual variances below this are floored (constant series).
const VARIANCE_FLOOR: f64 = 1e-8;

/// The three Minnesota hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShrinkageHyperparameters {
    /// `λ1`: overall prior tightness.
    pub overall_tightness: f64,
    /// `λ2`: extra tightness on other variables' lags (in `(0, 1]`).
    pub cross_equation_tightness: f64,
    /// `λ3`: how fast the prior tightens with the lag.
    pub lag_decay: f64,
}

impl Default for ShrinkageHyperparameters {
    fn default() -> Self {
        Self {
            overall_tightness: 0.2,
            cross_equation_tightness: 0.5,
            lag_decay: 1.0,
        }
    }
}

impl ShrinkageHyperparameters {
    pub fn validate(&self) -> Result<(), ForecastError> {
        let fields = [
            ("overall_tightness", self.overall_tightness),
            ("cross_equation_tightness", self.cross_equation_tightness),
            ("lag_decay", self.lag_decay),
        ];
        for (name, value) in fields {
            if !(value.is_finite() && value > 0.0) {
                return Err(ForecastError::InvalidPrior(format!(
                    "{name} must be finite and > 0, got {value}"
                )));
            }
        }
        if self.cross_equation_tightness > 1.0 {
            return Err(ForecastError::InvalidPrior(format!(
                "cross_equation_tightness must be <= 1, got {}",
                self.cross_equation_tightness
            )));
        }
        Ok(())
    }
}

/// Fully specified prior for an `n`-variable, `p`-lag VAR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShrinkagePrior {
    n: usize,
    p: usize,
    hyper: ShrinkageHyperparameters,
    /// Prior mean of each variable's own first-lag coefficient.
    prior_mean: Vec<f64>,
    /// Residual std `σ_i` per variable.
    scale: Vec<f64>,
}

impl ShrinkagePrior {
    /// Build the prior from empirical residual variances.
    pub fn build(
        n: usize,
        p: usize,
        hyper: ShrinkageHyperparameters,
        residual_variances: &[f64],
        prior_mean: &[f64],
    ) -> Result<Self, ForecastError> {
        hyper.validate()?;
        if n == 0 || p == 0 {
            return Err(ForecastError::InvalidPrior(format!(
                "need n >= 1 and p >= 1, got n={n}, p={p}"
            )));
        }
        if residual_variances.len() != n {
            return Err(ForecastError::dimension(
                "prior residual variances",
                n,
                residual_variances.len(),
            ));
        }
        if prior_mean.len() != n {
            return Err(ForecastError::dimension("prior means", n, prior_mean.len()));
        }
        if let Some((j, v)) = residual_variances
            .iter()
            .enumerate()
            .find(|(_, v)| !(v.is_finite() && **v > 0.0))
        {
            return Err(ForecastError::InvalidPrior(format!(
                "residual variance of variable {j} must be finite and > 0, got {v}"
            )));
        }
        if let Some((j, m)) = prior_mean.iter().enumerate().find(|(_, m)| !m.is_finite()) {
            return Err(ForecastError::InvalidPrior(format!(
                "prior mean of variable {j} must be finite, got {m}"
            )));
        }

        Ok(Self {
            n,
            p,
            hyper,
            prior_mean: prior_mean.to_vec(),
            scale: residual_variances.iter().map(|v| v.sqrt()).collect(),
        })
    }

    pub fn n_vars(&self) -> usize {
        self.n
    }

    pub fn lags(&self) -> usize {
        self.p
    }

    /// `1 + n·p`.
    pub fn n_coefficients(&self) -> usize {
        1 + self.n * self.p
    }

    pub fn hyperparameters(&self) -> ShrinkageHyperparameters {
        self.hyper
    }

    pub fn scales(&self) -> &[f64] {
        &self.scale
    }

    pub fn residual_variance(&self, equation: usize) -> f64 {
        self.scale[equation] * self.scale[equation]
    }

    /// Prior std of the coefficient on `variable` at `lag` (1-based) in `equation`.
    pub fn coefficient_std(&self, equation: usize, variable: usize, lag: usize) -> f64 {
        let decay = (lag as f64).powf(self.hyper.lag_decay);
        if equation == variable {
            self.hyper.overall_tightness / decay
        } else {
            self.hyper.overall_tightness * self.hyper.cross_equation_tightness * self.scale[equation]
                / (self.scale[variable] * decay)
        }
    }

    pub fn intercept_std(&self, equation: usize) -> f64 {
        INTERCEPT_PRIOR_SCALE * self.scale[equation]
    }

    /// Prior mean vector of one equation (length `1 + n·p`).
    pub fn mean_row(&self, equation: usize) -> DVector<f64> {
        let mut out = DVector::zeros(self.n_coefficients());
        out[1 + equation] = self.prior_mean[equation];
        out
    }

    /// Prior variance vector of one equation (length `1 + n·p`).
    pub fn variance_row(&self, equation: usize) -> DVector<f64> {
        let mut out = DVector::zeros(self.n_coefficients());
        out[0] = self.intercept_std(equation).powi(2);
        for lag in 1..=self.p {
            for var in 0..self.n {
                out[1 + (lag - 1) * self.n + var] = self.coefficient_std(equation, var, lag).powi(2);
            }
        }
        out
    }

    /// Prior mean matrix (`n × (1 + n·p)`), same layout as `Beta`.
    pub fn mean_matrix(&self) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(self.n, self.n_coefficients());
        for i in 0..self.n {
            out.set_row(i, &self.mean_row(i).transpose());
        }
        out
    }
}

/// Residual variances of univariate AR(`p`) fits, one per panel variable.
///
/// Falls back to the sample variance when the AR regression cannot be solved,
/// and floors constant series at a tiny positive variance.
pub fn ar_residual_variances(panel: &TimeSeriesPanel, p: usize) -> Result<Vec<f64>, ForecastError> {
    let t = panel.n_obs();
    if p == 0 || t < p + 3 {
        return Err(ForecastError::Validation(format!(
            "need at least {} observations for AR({p}) scale estimates, got {t}",
            p + 3
        )));
    }
    let rows = t - p;
    let k = p + 1;

    let mut out = Vec::with_capacity(panel.n_vars());
    for var in 0..panel.n_vars() {
        let series = panel.column(var);
        let x = DMatrix::from_fn(rows, k, |r, c| if c == 0 { 1.0 } else { series[p + r - c] });
        let y = DVector::from_fn(rows, |r, _| series[p + r]);

        let variance = match solve_least_squares(&x, &y) {
            Some(beta) => {
                let sse = crate::math::sum_squared_residuals(&x, &y, &beta);
                sse / (rows.saturating_sub(k)).max(1) as f64
            }
            None => stats::sample_variance(&series),
        };

        if !(variance.is_finite() && variance > VARIANCE_FLOOR) {
            warn!(
                variable = %panel.variables()[var],
                variance,
                "residual variance at floor; prior scale for this variable is degenerate"
            );
            out.push(VARIANCE_FLOOR);
        } else {
            out.push(variance);
        }
    }
    Ok(out)
}

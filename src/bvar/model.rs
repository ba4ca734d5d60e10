//! Fitted BVAR and its stored representation.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::bvar::companion::{companion_eigenvalues, is_stable, max_modulus, Eigenvalue};
use crate::error::ForecastError;
use crate::math::linalg::{eigen_range, SINGULAR_TOLERANCE};

/// Recursive identification scheme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    /// Variable indices in causal order; the first one is the shocked variable.
    pub ordering: Vec<usize>,
    /// Impact of a one-std structural shock on the first-ordered variable.
    ///
    /// Impulse responses are divided by this so the impact is exactly 1.
    pub shock_scale: f64,
}

/// Numerical recoveries applied during estimation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BvarDiagnostics {
    /// Effective observations used in the regression.
    pub n_obs: usize,
    /// Ridge jitter added to each equation's posterior system.
    pub ridge_jitter: Vec<f64>,
    /// Some eigenvalue of the residual covariance was floored at zero.
    pub sigma_floored: bool,
}

impl BvarDiagnostics {
    pub fn degraded(&self) -> bool {
        self.sigma_floored || self.ridge_jitter.iter().any(|j| *j > 0.0)
    }
}

/// Posterior-mean VAR(p) in monthly changes.
///
/// `beta` is `n × (1 + n·p)`: column 0 is the intercept, column
/// `1 + (l-1)·n + j` the coefficient on variable `j` at lag `l`.
/// `history` is the last `p` observations (`p × n`, oldest row first) and is
/// the starting state for forecasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BvarModel {
    variables: Vec<String>,
    n: usize,
    p: usize,
    beta: DMatrix<f64>,
    sigma: DMatrix<f64>,
    eigenvalues: Vec<Eigenvalue>,
    stable: bool,
    identification: Identification,
    history: DMatrix<f64>,
    diagnostics: BvarDiagnostics,
}

impl BvarModel {
    /// Assemble a model, deriving the eigenvalues, stability flag and shock
    /// scale from the coefficients.
    pub fn from_parts(
        variables: Vec<String>,
        p: usize,
        beta: DMatrix<f64>,
        sigma: DMatrix<f64>,
        history: DMatrix<f64>,
        ordering: Vec<usize>,
        diagnostics: BvarDiagnostics,
    ) -> Result<Self, ForecastError> {
        let n = variables.len();
        if n == 0 || p == 0 {
            return Err(ForecastError::Validation(format!(
                "model needs n >= 1 and p >= 1, got n={n}, p={p}"
            )));
        }
        if beta.shape() != (n, 1 + n * p) {
            return Err(ForecastError::dimension(
                "Beta",
                format!("{n}x{}", 1 + n * p),
                format!("{}x{}", beta.nrows(), beta.ncols()),
            ));
        }
        if sigma.shape() != (n, n) {
            return Err(ForecastError::dimension(
                "Sigma",
                format!("{n}x{n}"),
                format!("{}x{}", sigma.nrows(), sigma.ncols()),
            ));
        }
        if history.shape() != (p, n) {
            return Err(ForecastError::dimension(
                "history",
                format!("{p}x{n}"),
                format!("{}x{}", history.nrows(), history.ncols()),
            ));
        }
        if beta.iter().chain(sigma.iter()).chain(history.iter()).any(|v| !v.is_finite()) {
            return Err(ForecastError::Validation("model contains non-finite values".into()));
        }
        validate_ordering(&ordering, n)?;
        validate_covariance(&sigma)?;

        let eigenvalues = companion_eigenvalues(&beta, n, p);
        let stable = is_stable(&eigenvalues);
        let first = ordering[0];
        let shock_scale = sigma[(first, first)].max(0.0).sqrt();

        Ok(Self {
            variables,
            n,
            p,
            beta,
            sigma,
            eigenvalues,
            stable,
            identification: Identification { ordering, shock_scale },
            history,
            diagnostics,
        })
    }

    /// Re-check a model that came from outside (e.g. deserialized), recomputing
    /// every derived field rather than trusting the stored ones.
    pub fn validate(self) -> Result<Self, ForecastError> {
        let stored_stable = self.stable;
        let rebuilt = Self::from_parts(
            self.variables,
            self.p,
            self.beta,
            self.sigma,
            self.history,
            self.identification.ordering,
            self.diagnostics,
        )?;
        if rebuilt.n != self.n {
            return Err(ForecastError::dimension("stored n", rebuilt.n, self.n));
        }
        if rebuilt.stable != stored_stable {
            warn!(
                stored = stored_stable,
                recomputed = rebuilt.stable,
                max_modulus = rebuilt.max_modulus(),
                "stored stability flag disagrees with coefficients; using recomputed value"
            );
        }
        Ok(rebuilt)
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn n_vars(&self) -> usize {
        self.n
    }

    pub fn lags(&self) -> usize {
        self.p
    }

    pub fn beta(&self) -> &DMatrix<f64> {
        &self.beta
    }

    pub fn sigma(&self) -> &DMatrix<f64> {
        &self.sigma
    }

    pub fn eigenvalues(&self) -> &[Eigenvalue] {
        &self.eigenvalues
    }

    pub fn max_modulus(&self) -> f64 {
        max_modulus(&self.eigenvalues)
    }

    pub fn is_stable(&self) -> bool {
        self.stable
    }

    pub fn identification(&self) -> &Identification {
        &self.identification
    }

    pub fn history(&self) -> &DMatrix<f64> {
        &self.history
    }

    pub fn diagnostics(&self) -> &BvarDiagnostics {
        &self.diagnostics
    }

    pub fn intercept(&self) -> DVector<f64> {
        self.beta.column(0).into_owned()
    }

    /// `A_lag` (`n × n`), `lag` is 1-based.
    pub fn lag_matrix(&self, lag: usize) -> DMatrix<f64> {
        let start = 1 + (lag - 1) * self.n;
        self.beta.columns(start, self.n).into_owned()
    }

    /// One-step conditional mean `c + Σ A_l y_{t-l}`.
    ///
    /// `state` is the stacked lag vector `[y_{t-1}, ..., y_{t-p}]`
    /// (length `n·p`, most recent first).
    pub fn one_step_mean(&self, state: &DVector<f64>) -> DVector<f64> {
        let lags = self.beta.columns(1, self.n * self.p);
        self.intercept() + lags * state
    }

    /// Starting state built from `history` (most recent observation first).
    pub fn initial_state(&self) -> DVector<f64> {
        let mut state = DVector::zeros(self.n * self.p);
        for lag in 0..self.p {
            let row = self.p - 1 - lag;
            for j in 0..self.n {
                state[lag * self.n + j] = self.history[(row, j)];
            }
        }
        state
    }
}

fn validate_ordering(ordering: &[usize], n: usize) -> Result<(), ForecastError> {
    if ordering.len() != n {
        return Err(ForecastError::dimension("identification ordering", n, ordering.len()));
    }
    let mut seen = vec![false; n];
    for &idx in ordering {
        if idx >= n || seen[idx] {
            return Err(ForecastError::Validation(format!(
                "identification ordering {ordering:?} is not a permutation of 0..{n}"
            )));
        }
        seen[idx] = true;
    }
    Ok(())
}

fn validate_covariance(sigma: &DMatrix<f64>) -> Result<(), ForecastError> {
    let asym = (sigma - sigma.transpose()).abs().max();
    let scale = sigma.abs().max().max(1.0);
    if asym > 1e-9 * scale {
        return Err(ForecastError::Validation(format!(
            "Sigma is not symmetric (max asymmetry {asym:e})"
        )));
    }
    let (min, max) = eigen_range(sigma);
    if min < -1e-9 * max.abs().max(SINGULAR_TOLERANCE) {
        return Err(ForecastError::Validation(format!(
            "Sigma is not positive semi-definite (min eigenvalue {min:e})"
        )));
    }
    Ok(())
}

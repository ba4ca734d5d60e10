//! Recursive (Cholesky) identification and impulse responses.
//!
//! With the causal ordering as a permutation `P`, factor `P Σ P' = L L'`.
//! The structural impact of the first-ordered shock is the first column of
//! `P' L`, rescaled so that the first-ordered variable moves by exactly 1.
//! Responses propagate through the companion matrix; row `h-1` of the output
//! is horizon `h` (row 0 is the impact period).

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::bvar::companion::companion_matrix;
use crate::bvar::model::BvarModel;
use crate::error::ForecastError;
use crate::math::linalg::is_singular;

/// Unit-normalized structural impact vector.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuralImpact {
    /// Length `n`, in panel variable order.
    pub impact: DVector<f64>,
    /// The covariance was singular and a diagonal factorization was used.
    pub degraded: bool,
}

/// Impulse response to a unit shock in the first-ordered variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpulseResponse {
    pub variables: Vec<String>,
    pub shock_variable: String,
    /// `H × n`: row `h-1` is the response at horizon `h`.
    pub responses: DMatrix<f64>,
    pub degraded: bool,
}

impl ImpulseResponse {
    pub fn horizons(&self) -> usize {
        self.responses.nrows()
    }

    /// Response of `variable` at horizon `h` (1-based).
    pub fn at(&self, h: usize, variable: usize) -> f64 {
        self.responses[(h - 1, variable)]
    }

    /// Running sums over horizons (level response when the model is in
    /// changes).
    pub fn cumulative(&self) -> DMatrix<f64> {
        let mut out = self.responses.clone();
        for j in 0..out.ncols() {
            for h in 1..out.nrows() {
                out[(h, j)] += out[(h - 1, j)];
            }
        }
        out
    }
}

/// Cholesky factor of `sigma` under `ordering`, mapped back to panel order.
///
/// Falls back to `diag(sqrt(σ_ii))` when `sigma` is singular.
pub fn structural_factor(sigma: &DMatrix<f64>, ordering: &[usize]) -> (DMatrix<f64>, bool) {
    let n = sigma.nrows();
    let permuted = DMatrix::from_fn(n, n, |i, j| sigma[(ordering[i], ordering[j])]);

    let lower = if is_singular(&permuted) {
        None
    } else {
        permuted.cholesky().map(|c| c.l())
    };

    match lower {
        Some(l) => {
            let mut out = DMatrix::zeros(n, n);
            for (i, &row) in ordering.iter().enumerate() {
                for k in 0..n {
                    out[(row, k)] = l[(i, k)];
                }
            }
            (out, false)
        }
        None => {
            let mut out = DMatrix::zeros(n, n);
            for (k, &var) in ordering.iter().enumerate() {
                out[(var, k)] = sigma[(var, var)].max(0.0).sqrt();
            }
            (out, true)
        }
    }
}

/// Impact of the first-ordered shock, normalized to a unit move.
pub fn unit_impact(model: &BvarModel, ordering: &[usize]) -> Result<StructuralImpact, ForecastError> {
    let n = model.n_vars();
    if ordering.len() != n || ordering.iter().any(|&i| i >= n) {
        return Err(ForecastError::dimension("ordering", n, ordering.len()));
    }
    let (factor, degraded) = structural_factor(model.sigma(), ordering);
    let first = ordering[0];
    let scale = factor[(first, 0)];

    let impact = if scale > 0.0 && scale.is_finite() {
        factor.column(0) / scale
    } else {
        let mut e = DVector::zeros(n);
        e[first] = 1.0;
        e
    };
    if degraded {
        warn!("residual covariance singular; using diagonal identification");
    }
    Ok(StructuralImpact { impact, degraded })
}

/// Responses to a unit shock in `ordering[0]` for `horizons` periods.
pub fn impulse_response(
    model: &BvarModel,
    ordering: &[usize],
    horizons: usize,
) -> Result<ImpulseResponse, ForecastError> {
    if horizons == 0 {
        return Err(ForecastError::Validation("impulse response needs at least one horizon".into()));
    }
    let n = model.n_vars();
    let p = model.lags();
    let StructuralImpact { impact, degraded } = unit_impact(model, ordering)?;

    let companion = companion_matrix(model.beta(), n, p);
    let mut state = DVector::zeros(n * p);
    state.rows_mut(0, n).copy_from(&impact);

    let mut responses = DMatrix::zeros(horizons, n);
    for h in 0..horizons {
        if h > 0 {
            state = &companion * &state;
        }
        for j in 0..n {
            responses[(h, j)] = state[j];
        }
    }

    Ok(ImpulseResponse {
        variables: model.variables().to_vec(),
        shock_variable: model.variables()[ordering[0]].clone(),
        responses,
        degraded: degraded || model.diagnostics().degraded(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvar::model::tests::var1;

    #[test]
    fn unit_impact_on_shocked_variable() {
        let m = var1([0.5, 0.0, 0.3, 0.4], [4.0, 1.0, 1.0, 2.0]);
        let irf = impulse_response(&m, &[0, 1], 6).unwrap();
        assert_eq!(irf.horizons(), 6);
        assert!((irf.at(1, 0) - 1.0).abs() < 1e-12);
        // Impact on domestic is Σ_10 / Σ_00.
        assert!((irf.at(1, 1) - 0.25).abs() < 1e-12);
        assert!(!irf.degraded);
    }

    #[test]
    fn propagates_through_lags() {
        let m = var1([0.5, 0.0, 0.3, 0.4], [1.0, 0.0, 0.0, 1.0]);
        let irf = impulse_response(&m, &[0, 1], 3).unwrap();
        // h=2: A · [1, 0] = [0.5, 0.3]
        assert!((irf.at(2, 0) - 0.5).abs() < 1e-12);
        assert!((irf.at(2, 1) - 0.3).abs() < 1e-12);
        // h=3: A · [0.5, 0.3] = [0.25, 0.27]
        assert!((irf.at(3, 1) - 0.27).abs() < 1e-12);
        let cum = irf.cumulative();
        assert!((cum[(2, 1)] - 0.57).abs() < 1e-12);
    }

    #[test]
    fn reversed_ordering_shocks_the_other_variable() {
        let m = var1([0.5, 0.0, 0.3, 0.4], [4.0, 1.0, 1.0, 2.0]);
        let irf = impulse_response(&m, &[1, 0], 1).unwrap();
        assert!((irf.at(1, 1) - 1.0).abs() < 1e-12);
        assert!((irf.at(1, 0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn singular_sigma_falls_back_to_diagonal() {
        let m = var1([0.5, 0.0, 0.3, 0.4], [1.0, 1.0, 1.0, 1.0]);
        let irf = impulse_response(&m, &[0, 1], 2).unwrap();
        assert!(irf.degraded);
        assert!((irf.at(1, 0) - 1.0).abs() < 1e-12);
        assert_eq!(irf.at(1, 1), 0.0);
    }

    #[test]
    fn deterministic() {
        let m = var1([0.5, 0.1, 0.3, 0.4], [2.0, 0.5, 0.5, 1.0]);
        let a = impulse_response(&m, &[0, 1], 12).unwrap();
        let b = impulse_response(&m, &[0, 1], 12).unwrap();
        assert_eq!(a, b);
    }
}

//! Least squares and ridge solvers.
//!
//! Two kinds of small regressions show up in this crate:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2                  (plain least squares)
//! minimize Σ (y_i - x_i^T β)^2 + Σ_j p_j β_j^2  (ridge, per-column penalty)
//! ```
//!
//! Implementation choices:
//! - Plain least squares goes through SVD so tall, nearly collinear designs
//!   still solve (used for the univariate AR fits that scale the BVAR prior).
//! - Ridge goes through the normal equations and a Cholesky factorization. The
//!   penalty makes `X'X + P` positive definite whenever every column is
//!   penalized or the unpenalized columns are independent.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Ridge solution together with its effective degrees of freedom.
#[derive(Debug, Clone)]
pub struct RidgeFit {
    pub beta: DVector<f64>,
    /// `tr(X (X'X + P)^-1 X')`, used by information criteria.
    pub effective_dof: f64,
}

/// Solve a ridge problem with a diagonal penalty `P = diag(penalty)`.
///
/// Returns `None` when `X'X + P` is not positive definite.
pub fn solve_ridge(x: &DMatrix<f64>, y: &DVector<f64>, penalty: &DVector<f64>) -> Option<RidgeFit> {
    if x.ncols() != penalty.len() || x.nrows() != y.len() {
        return None;
    }

    let xtx = x.tr_mul(x);
    let xty = x.tr_mul(y);

    let mut a = xtx.clone();
    for (j, &p) in penalty.iter().enumerate() {
        a[(j, j)] += p;
    }

    let chol = a.cholesky()?;
    let beta = chol.solve(&xty);
    if !beta.iter().all(|v| v.is_finite()) {
        return None;
    }

    let effective_dof = chol.solve(&xtx).trace();
    Some(RidgeFit { beta, effective_dof })
}

/// Sum of squared residuals of `y - X β`.
pub fn sum_squared_residuals(x: &DMatrix<f64>, y: &DVector<f64>, beta: &DVector<f64>) -> f64 {
    let fitted = x * beta;
    y.iter()
        .zip(fitted.iter())
        .map(|(yi, fi)| (yi - fi) * (yi - fi))
        .sum()
}
